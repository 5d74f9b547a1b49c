use colored::*;
use migration::Migrator;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::time::Instant;

pub async fn run_all_migrations(url: &str) {
    let db = Database::connect(url)
        .await
        .expect("Failed to connect to database");

    let pending = Migrator::get_pending_migrations(&db)
        .await
        .expect("Failed to read pending migrations");

    if pending.is_empty() {
        println!("{}", "Nothing to apply: schema is up to date".green());
        return;
    }

    println!(
        "{} {} {}",
        "Applying".cyan().bold(),
        pending.len().to_string().yellow(),
        "migration(s)...".cyan().bold()
    );

    for migration in pending {
        let name = migration.name().to_owned();
        print!("  {} {}... ", "->".blue(), name);

        let started = Instant::now();
        Migrator::up(&db, Some(1))
            .await
            .unwrap_or_else(|e| panic!("Migration {} failed: {}", name, e));

        println!(
            "{} {}",
            "done".green(),
            format!("({:.2?})", started.elapsed()).dimmed()
        );
    }

    println!("{}", "All migrations applied".green().bold());
}

use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202603010011_create_risk_analyses"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Alias::new("risk_analyses"))
                    .if_not_exists()
                    .col(ColumnDef::new(Alias::new("id")).integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Alias::new("submission_id")).integer().not_null().unique_key())
                    .col(ColumnDef::new(Alias::new("status")).string().not_null())
                    .col(ColumnDef::new(Alias::new("risk_score")).integer())
                    .col(ColumnDef::new(Alias::new("risk_level")).string())
                    .col(ColumnDef::new(Alias::new("diagnosis")).text())
                    .col(ColumnDef::new(Alias::new("evidence")).text())
                    .col(ColumnDef::new(Alias::new("teacher_advice")).text())
                    .col(ColumnDef::new(Alias::new("positive_aspects")).text())
                    .col(ColumnDef::new(Alias::new("error_message")).text())
                    .col(ColumnDef::new(Alias::new("analyzed_at")).timestamp())
                    .col(ColumnDef::new(Alias::new("created_at")).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Alias::new("updated_at")).timestamp().not_null().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Alias::new("risk_analyses"), Alias::new("submission_id"))
                            .to(Alias::new("submissions"), Alias::new("id"))
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Alias::new("risk_analyses")).to_owned())
            .await
    }
}

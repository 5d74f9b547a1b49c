//! Application state container shared across Axum route handlers and tasks.
//!
//! Holds the database connection, the model stack and the background-task
//! registry. Cloning is cheap; every clone shares the same underlying pool,
//! model clients and registry.

use ai::AiStack;
use sea_orm::DatabaseConnection;

use crate::tasks::TaskRegistry;

/// Central application state shared across the server.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    ai: AiStack,
    tasks: TaskRegistry,
}

impl AppState {
    /// Creates a new `AppState` from a database connection and a model stack.
    pub fn new(db: DatabaseConnection, ai: AiStack) -> Self {
        Self {
            db,
            ai,
            tasks: TaskRegistry::default(),
        }
    }

    /// Returns a shared reference to the internal `DatabaseConnection`.
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Returns a cloned copy of the database connection.
    ///
    /// Useful for spawning tasks that require ownership.
    pub fn db_clone(&self) -> DatabaseConnection {
        self.db.clone()
    }

    /// Returns a shared reference to the model stack.
    pub fn ai(&self) -> &AiStack {
        &self.ai
    }

    /// Returns a shared reference to the background-task registry.
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }
}

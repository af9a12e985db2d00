//! SQLite database layer for the sopforge backend.
//!
//! Uses rusqlite with WAL mode for concurrent read performance.
//! All database operations are executed via `tokio::task::spawn_blocking`
//! to avoid blocking the async runtime.

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::ServerError;

/// Thread-safe handle to the SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(db_path: &str) -> Result<Self, ServerError> {
        let path = Path::new(db_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let conn = Connection::open(db_path)
            .map_err(|e| ServerError::Database(format!("Failed to open database: {}", e)))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| ServerError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;

        tracing::info!("SQLite database opened at: {}", db_path);
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, ServerError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ServerError::Database(format!("Failed to open in-memory db: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| ServerError::Database(format!("Failed to set pragmas: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_tables()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    /// Automatically handles locking and error conversion.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ServerError::Database(format!("Lock poisoned: {}", e)))?;
        f(&conn).map_err(|e| ServerError::Database(e.to_string()))
    }

    /// Execute a closure with access to the database connection (async-friendly).
    pub async fn with_conn_async<F, T>(&self, f: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || db.with_conn(f))
            .await
            .map_err(|e| ServerError::Database(format!("Task join error: {}", e)))?
    }

    /// Create all tables if they don't exist.
    fn initialize_tables(&self) -> Result<(), ServerError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS workflows (
                    id              TEXT PRIMARY KEY,
                    name            TEXT NOT NULL,
                    description     TEXT,
                    cover_image_url TEXT,
                    status          TEXT NOT NULL DEFAULT 'draft',
                    is_template     INTEGER NOT NULL DEFAULT 0,
                    template_id     TEXT REFERENCES workflows(id),
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id              TEXT PRIMARY KEY,
                    workflow_id     TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                    name            TEXT NOT NULL,
                    task_order      INTEGER NOT NULL,
                    description     TEXT,
                    status          TEXT NOT NULL DEFAULT 'pending',
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL,
                    UNIQUE (workflow_id, task_order)
                );
                CREATE INDEX IF NOT EXISTS idx_tasks_workflow ON tasks(workflow_id);

                CREATE TABLE IF NOT EXISTS workflow_steps (
                    id                          TEXT PRIMARY KEY,
                    workflow_id                 TEXT NOT NULL REFERENCES workflows(id) ON DELETE CASCADE,
                    task_id                     TEXT REFERENCES tasks(id) ON DELETE CASCADE,
                    name                        TEXT NOT NULL,
                    step_order                  INTEGER NOT NULL,
                    status                      TEXT NOT NULL DEFAULT 'pending',
                    context_type                TEXT,
                    context_image_url           TEXT,
                    context_text_content        TEXT,
                    context_voice_transcript    TEXT,
                    context_description         TEXT,
                    extraction_keywords         TEXT NOT NULL DEFAULT '[]',
                    extraction_voice_transcript TEXT,
                    logic_strategy              TEXT,
                    logic_rule_expression       TEXT,
                    logic_evaluation_prompt     TEXT,
                    routing_default_next        TEXT,
                    expert_notes                TEXT,
                    created_at                  INTEGER NOT NULL,
                    updated_at                  INTEGER NOT NULL,
                    UNIQUE (workflow_id, step_order)
                );
                CREATE INDEX IF NOT EXISTS idx_steps_workflow ON workflow_steps(workflow_id);
                CREATE INDEX IF NOT EXISTS idx_steps_task ON workflow_steps(task_id);

                CREATE TABLE IF NOT EXISTS examples (
                    id              TEXT PRIMARY KEY,
                    step_id         TEXT NOT NULL REFERENCES workflow_steps(id) ON DELETE CASCADE,
                    content         TEXT NOT NULL,
                    content_type    TEXT,
                    label           TEXT NOT NULL,
                    description     TEXT,
                    created_at      INTEGER NOT NULL,
                    updated_at      INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_examples_step ON examples(step_id);

                CREATE TABLE IF NOT EXISTS routing_branches (
                    id               TEXT PRIMARY KEY,
                    step_id          TEXT NOT NULL REFERENCES workflow_steps(id) ON DELETE CASCADE,
                    condition_result TEXT NOT NULL,
                    action_type      TEXT NOT NULL,
                    next_step_id     TEXT NOT NULL,
                    created_at       INTEGER NOT NULL,
                    updated_at       INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_branches_step ON routing_branches(step_id);

                CREATE TABLE IF NOT EXISTS step_notes (
                    id               TEXT PRIMARY KEY,
                    step_id          TEXT NOT NULL REFERENCES workflow_steps(id) ON DELETE CASCADE,
                    content_type     TEXT NOT NULL,
                    content          TEXT NOT NULL,
                    voice_transcript TEXT,
                    created_by       TEXT NOT NULL DEFAULT 'worker',
                    created_at       INTEGER NOT NULL,
                    updated_at       INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_notes_step ON step_notes(step_id);
                ",
            )
        })
    }
}

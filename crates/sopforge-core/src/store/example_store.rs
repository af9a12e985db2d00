use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::example::{Example, ExampleLabel};
use crate::store::step_store::row_to_example;

pub struct ExampleStore {
    db: Database,
}

impl ExampleStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, example: &Example) -> Result<(), ServerError> {
        let e = example.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO examples (id, step_id, content, content_type, label, description,
                     created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                       content = excluded.content,
                       content_type = excluded.content_type,
                       label = excluded.label,
                       description = excluded.description,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        e.id,
                        e.step_id,
                        e.content,
                        e.content_type.map(|t| t.as_str()),
                        e.label.as_str(),
                        e.description,
                        e.created_at.timestamp_millis(),
                        e.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Example>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, step_id, content, content_type, label, description, created_at, updated_at
                     FROM examples WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_example(row)))
                    .optional()
            })
            .await
    }

    /// Examples of a step, optionally filtered by PASS/FAIL label,
    /// insertion order preserved.
    pub async fn list_by_step(
        &self,
        step_id: &str,
        label: Option<ExampleLabel>,
    ) -> Result<Vec<Example>, ServerError> {
        let step_id = step_id.to_string();
        let label = label.map(|l| l.as_str().to_string());
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, step_id, content, content_type, label, description, created_at, updated_at
                     FROM examples WHERE step_id = ?1 AND (?2 IS NULL OR label = ?2)
                     ORDER BY created_at, rowid",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![step_id, label], |row| {
                        Ok(row_to_example(row))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let changed =
                    conn.execute("DELETE FROM examples WHERE id = ?1", rusqlite::params![id])?;
                Ok(changed > 0)
            })
            .await
    }
}

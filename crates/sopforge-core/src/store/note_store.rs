use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::error::ServerError;
use crate::models::note::StepNote;
use crate::store::step_store::row_to_note;

pub struct NoteStore {
    db: Database,
}

impl NoteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, note: &StepNote) -> Result<(), ServerError> {
        let n = note.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO step_notes (id, step_id, content_type, content, voice_transcript,
                     created_by, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                       content = excluded.content,
                       voice_transcript = excluded.voice_transcript,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        n.id,
                        n.step_id,
                        n.content_type.as_str(),
                        n.content,
                        n.voice_transcript,
                        n.created_by.as_str(),
                        n.created_at.timestamp_millis(),
                        n.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<StepNote>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, step_id, content_type, content, voice_transcript, created_by,
                     created_at, updated_at
                     FROM step_notes WHERE id = ?1",
                )?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_note(row)))
                    .optional()
            })
            .await
    }

    pub async fn list_by_step(&self, step_id: &str) -> Result<Vec<StepNote>, ServerError> {
        let step_id = step_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, step_id, content_type, content, voice_transcript, created_by,
                     created_at, updated_at
                     FROM step_notes WHERE step_id = ?1 ORDER BY created_at, rowid",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![step_id], |row| Ok(row_to_note(row)))?
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
                    conn.execute("DELETE FROM step_notes WHERE id = ?1", rusqlite::params![id])?;
                Ok(changed > 0)
            })
            .await
    }
}

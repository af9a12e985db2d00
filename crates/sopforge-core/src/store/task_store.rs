use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::task::{Task, TaskStatus};
use crate::store::step_store::{populate_step_children, row_to_step};
use crate::store::workflow_store::timestamp;

const TASK_COLUMNS: &str =
    "id, workflow_id, name, task_order, description, status, created_at, updated_at";

pub struct TaskStore {
    db: Database,
}

impl TaskStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, task: &Task) -> Result<(), ServerError> {
        let t = task.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (id, workflow_id, name, task_order, description, status,
                     created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                       name = excluded.name,
                       task_order = excluded.task_order,
                       description = excluded.description,
                       status = excluded.status,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        t.id,
                        t.workflow_id,
                        t.name,
                        t.task_order,
                        t.description,
                        t.status.as_str(),
                        t.created_at.timestamp_millis(),
                        t.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Task>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks WHERE id = ?1",
                    TASK_COLUMNS
                ))?;
                let task = stmt
                    .query_row(rusqlite::params![id], |row| Ok(row_to_task(row)))
                    .optional()?;
                let Some(mut task) = task else {
                    return Ok(None);
                };
                populate_task_steps(conn, &mut task)?;
                Ok(Some(task))
            })
            .await
    }

    /// Ordered tasks of a workflow, each with its ordered steps.
    pub async fn list_by_workflow(&self, workflow_id: &str) -> Result<Vec<Task>, ServerError> {
        let wf_id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM tasks WHERE workflow_id = ?1 ORDER BY task_order",
                    TASK_COLUMNS
                ))?;
                let mut tasks = stmt
                    .query_map(rusqlite::params![wf_id], |row| Ok(row_to_task(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                for task in &mut tasks {
                    populate_task_steps(conn, task)?;
                }
                Ok(tasks)
            })
            .await
    }

    /// Next free task_order for a workflow (append position).
    pub async fn next_order(&self, workflow_id: &str) -> Result<i64, ServerError> {
        let wf_id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT COALESCE(MAX(task_order), 0) + 1 FROM tasks WHERE workflow_id = ?1",
                    rusqlite::params![wf_id],
                    |row| row.get(0),
                )
            })
            .await
    }

    /// Delete a task; SQLite cascades to its steps. Returns whether a row
    /// was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let changed =
                    conn.execute("DELETE FROM tasks WHERE id = ?1", rusqlite::params![id])?;
                Ok(changed > 0)
            })
            .await
    }

    /// Renumber a workflow's tasks to 1..n following the given id order.
    /// Ids not belonging to the workflow are ignored.
    pub async fn reorder(
        &self,
        workflow_id: &str,
        task_ids: Vec<String>,
    ) -> Result<(), ServerError> {
        let wf_id = workflow_id.to_string();
        let now = chrono::Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                // Park every order on a negative value first so the unique
                // (workflow_id, task_order) index never sees a duplicate.
                conn.execute(
                    "UPDATE tasks SET task_order = -task_order WHERE workflow_id = ?1",
                    rusqlite::params![wf_id],
                )?;
                for (i, task_id) in task_ids.iter().enumerate() {
                    conn.execute(
                        "UPDATE tasks SET task_order = ?1, updated_at = ?2
                         WHERE id = ?3 AND workflow_id = ?4",
                        rusqlite::params![(i + 1) as i64, now, task_id, wf_id],
                    )?;
                }
                // Any task left out keeps its old position, shifted past the end.
                conn.execute(
                    "UPDATE tasks SET task_order = -task_order + ?1
                     WHERE workflow_id = ?2 AND task_order < 0",
                    rusqlite::params![task_ids.len() as i64, wf_id],
                )?;
                Ok(())
            })
            .await
    }
}

/// Column order: id(0), workflow_id(1), name(2), task_order(3),
/// description(4), status(5), created_at(6), updated_at(7)
pub(crate) fn row_to_task(row: &Row<'_>) -> Task {
    Task {
        id: row.get(0).unwrap_or_default(),
        workflow_id: row.get(1).unwrap_or_default(),
        name: row.get(2).unwrap_or_default(),
        task_order: row.get(3).unwrap_or(0),
        description: row.get(4).unwrap_or(None),
        status: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| TaskStatus::from_str(&s))
            .unwrap_or(TaskStatus::Pending),
        steps: Vec::new(),
        created_at: timestamp(row, 6),
        updated_at: timestamp(row, 7),
    }
}

fn populate_task_steps(conn: &Connection, task: &mut Task) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, workflow_id, task_id, name, step_order, status,
         context_type, context_image_url, context_text_content,
         context_voice_transcript, context_description,
         extraction_keywords, extraction_voice_transcript,
         logic_strategy, logic_rule_expression, logic_evaluation_prompt,
         routing_default_next, expert_notes, created_at, updated_at
         FROM workflow_steps WHERE task_id = ?1 ORDER BY step_order",
    )?;
    task.steps = stmt
        .query_map(rusqlite::params![task.id], |row| Ok(row_to_step(row)))?
        .collect::<Result<Vec<_>, _>>()?;
    for step in &mut task.steps {
        populate_step_children(conn, step)?;
    }
    Ok(())
}

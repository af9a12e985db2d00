use chrono::Utc;
use rusqlite::{OptionalExtension, Row};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::workflow::{Workflow, WorkflowStatus, WorkflowSummary};
use crate::store::step_store::{populate_step_children, row_to_step};
use crate::store::task_store::row_to_task;

const WORKFLOW_COLUMNS: &str =
    "id, name, description, cover_image_url, status, is_template, template_id, created_at, updated_at";

pub struct WorkflowStore {
    db: Database,
}

impl WorkflowStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, workflow: &Workflow) -> Result<(), ServerError> {
        let wf = workflow.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflows (id, name, description, cover_image_url, status,
                     is_template, template_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT(id) DO UPDATE SET
                       name = excluded.name,
                       description = excluded.description,
                       cover_image_url = excluded.cover_image_url,
                       status = excluded.status,
                       is_template = excluded.is_template,
                       template_id = excluded.template_id,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        wf.id,
                        wf.name,
                        wf.description,
                        wf.cover_image_url,
                        wf.status.as_str(),
                        wf.is_template as i64,
                        wf.template_id,
                        wf.created_at.timestamp_millis(),
                        wf.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Flat row lookup — no children.
    pub async fn get(&self, id: &str) -> Result<Option<Workflow>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM workflows WHERE id = ?1",
                    WORKFLOW_COLUMNS
                ))?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_workflow(row)))
                    .optional()
            })
            .await
    }

    /// Load the full aggregate: tasks (with their steps) plus the legacy
    /// flat step list, each step with examples/branches/notes.
    pub async fn get_aggregate(&self, id: &str) -> Result<Option<Workflow>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM workflows WHERE id = ?1",
                    WORKFLOW_COLUMNS
                ))?;
                let workflow = stmt
                    .query_row(rusqlite::params![id.clone()], |row| Ok(row_to_workflow(row)))
                    .optional()?;
                let Some(mut workflow) = workflow else {
                    return Ok(None);
                };

                let mut stmt = conn.prepare(
                    "SELECT id, workflow_id, task_id, name, step_order, status,
                     context_type, context_image_url, context_text_content,
                     context_voice_transcript, context_description,
                     extraction_keywords, extraction_voice_transcript,
                     logic_strategy, logic_rule_expression, logic_evaluation_prompt,
                     routing_default_next, expert_notes, created_at, updated_at
                     FROM workflow_steps WHERE workflow_id = ?1 ORDER BY step_order",
                )?;
                let mut steps = stmt
                    .query_map(rusqlite::params![id.clone()], |row| Ok(row_to_step(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                for step in &mut steps {
                    populate_step_children(conn, step)?;
                }

                let mut stmt = conn.prepare(
                    "SELECT id, workflow_id, name, task_order, description, status, created_at, updated_at
                     FROM tasks WHERE workflow_id = ?1 ORDER BY task_order",
                )?;
                let mut tasks = stmt
                    .query_map(rusqlite::params![id], |row| Ok(row_to_task(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                for task in &mut tasks {
                    task.steps = steps
                        .iter()
                        .filter(|s| s.task_id.as_deref() == Some(task.id.as_str()))
                        .cloned()
                        .collect();
                }

                workflow.steps = steps;
                workflow.tasks = tasks;
                Ok(Some(workflow))
            })
            .await
    }

    /// Paginated listing, newest first. `page` is 1-based.
    pub async fn list(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<WorkflowSummary>, ServerError> {
        let offset = (page.saturating_sub(1) as i64) * page_size as i64;
        let limit = page_size as i64;
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM workflows ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
                    WORKFLOW_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![limit, offset], |row| {
                        Ok(row_to_summary(row))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn count(&self) -> Result<i64, ServerError> {
        self.db
            .with_conn_async(move |conn| {
                conn.query_row("SELECT COUNT(*) FROM workflows", [], |row| row.get(0))
            })
            .await
    }

    /// Persist a status change and bump the updated timestamp.
    pub async fn update_status(
        &self,
        id: &str,
        status: WorkflowStatus,
    ) -> Result<(), ServerError> {
        let id = id.to_string();
        let now = Utc::now().timestamp_millis();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "UPDATE workflows SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    rusqlite::params![status.as_str(), now, id],
                )?;
                Ok(())
            })
            .await
    }

    /// Delete a workflow; SQLite cascades to tasks, steps and their
    /// children. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let changed =
                    conn.execute("DELETE FROM workflows WHERE id = ?1", rusqlite::params![id])?;
                Ok(changed > 0)
            })
            .await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM workflows WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get::<_, i64>(0),
                )
                .map(|count| count > 0)
            })
            .await
    }
}

/// Column order: id(0), name(1), description(2), cover_image_url(3),
/// status(4), is_template(5), template_id(6), created_at(7), updated_at(8)
pub(crate) fn row_to_workflow(row: &Row<'_>) -> Workflow {
    Workflow {
        id: row.get(0).unwrap_or_default(),
        name: row.get(1).unwrap_or_default(),
        description: row.get(2).unwrap_or(None),
        cover_image_url: row.get(3).unwrap_or(None),
        status: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| WorkflowStatus::from_str(&s))
            .unwrap_or(WorkflowStatus::Draft),
        is_template: row.get::<_, i64>(5).unwrap_or(0) != 0,
        template_id: row.get(6).unwrap_or(None),
        tasks: Vec::new(),
        steps: Vec::new(),
        created_at: timestamp(row, 7),
        updated_at: timestamp(row, 8),
    }
}

fn row_to_summary(row: &Row<'_>) -> WorkflowSummary {
    let workflow = row_to_workflow(row);
    WorkflowSummary {
        id: workflow.id,
        name: workflow.name,
        description: workflow.description,
        cover_image_url: workflow.cover_image_url,
        status: workflow.status,
        is_template: workflow.is_template,
        created_at: workflow.created_at,
        updated_at: workflow.updated_at,
    }
}

pub(crate) fn timestamp(row: &Row<'_>, idx: usize) -> chrono::DateTime<Utc> {
    let ms: i64 = row.get(idx).unwrap_or(0);
    chrono::DateTime::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
}

use rusqlite::{Connection, OptionalExtension, Row};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::example::{Example, ExampleContentType, ExampleLabel};
use crate::models::note::{NoteAuthor, NoteContentType, StepNote};
use crate::models::step::{ContextType, LogicStrategy, RoutingBranch, StepStatus, WorkflowStep};
use crate::store::workflow_store::timestamp;

const STEP_COLUMNS: &str = "id, workflow_id, task_id, name, step_order, status,
     context_type, context_image_url, context_text_content,
     context_voice_transcript, context_description,
     extraction_keywords, extraction_voice_transcript,
     logic_strategy, logic_rule_expression, logic_evaluation_prompt,
     routing_default_next, expert_notes, created_at, updated_at";

pub struct StepStore {
    db: Database,
}

impl StepStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn save(&self, step: &WorkflowStep) -> Result<(), ServerError> {
        let s = step.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO workflow_steps (id, workflow_id, task_id, name, step_order, status,
                     context_type, context_image_url, context_text_content, context_voice_transcript,
                     context_description, extraction_keywords, extraction_voice_transcript,
                     logic_strategy, logic_rule_expression, logic_evaluation_prompt,
                     routing_default_next, expert_notes, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
                     ON CONFLICT(id) DO UPDATE SET
                       task_id = excluded.task_id,
                       name = excluded.name,
                       step_order = excluded.step_order,
                       status = excluded.status,
                       context_type = excluded.context_type,
                       context_image_url = excluded.context_image_url,
                       context_text_content = excluded.context_text_content,
                       context_voice_transcript = excluded.context_voice_transcript,
                       context_description = excluded.context_description,
                       extraction_keywords = excluded.extraction_keywords,
                       extraction_voice_transcript = excluded.extraction_voice_transcript,
                       logic_strategy = excluded.logic_strategy,
                       logic_rule_expression = excluded.logic_rule_expression,
                       logic_evaluation_prompt = excluded.logic_evaluation_prompt,
                       routing_default_next = excluded.routing_default_next,
                       expert_notes = excluded.expert_notes,
                       updated_at = excluded.updated_at",
                    rusqlite::params![
                        s.id,
                        s.workflow_id,
                        s.task_id,
                        s.name,
                        s.step_order,
                        s.status.as_str(),
                        s.context_type.map(|t| t.as_str()),
                        s.context_image_url,
                        s.context_text_content,
                        s.context_voice_transcript,
                        s.context_description,
                        serde_json::to_string(&s.extraction_keywords).unwrap_or_default(),
                        s.extraction_voice_transcript,
                        s.logic_strategy.map(|t| t.as_str()),
                        s.logic_rule_expression,
                        s.logic_evaluation_prompt,
                        s.routing_default_next,
                        s.expert_notes,
                        s.created_at.timestamp_millis(),
                        s.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    /// Flat row lookup — no children.
    pub async fn get(&self, id: &str) -> Result<Option<WorkflowStep>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM workflow_steps WHERE id = ?1",
                    STEP_COLUMNS
                ))?;
                stmt.query_row(rusqlite::params![id], |row| Ok(row_to_step(row)))
                    .optional()
            })
            .await
    }

    pub async fn get_with_children(&self, id: &str) -> Result<Option<WorkflowStep>, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM workflow_steps WHERE id = ?1",
                    STEP_COLUMNS
                ))?;
                let step = stmt
                    .query_row(rusqlite::params![id], |row| Ok(row_to_step(row)))
                    .optional()?;
                let Some(mut step) = step else {
                    return Ok(None);
                };
                populate_step_children(conn, &mut step)?;
                Ok(Some(step))
            })
            .await
    }

    /// Ordered steps of a workflow, children included.
    pub async fn list_by_workflow(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<WorkflowStep>, ServerError> {
        let wf_id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM workflow_steps WHERE workflow_id = ?1 ORDER BY step_order",
                    STEP_COLUMNS
                ))?;
                let mut steps = stmt
                    .query_map(rusqlite::params![wf_id], |row| Ok(row_to_step(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                for step in &mut steps {
                    populate_step_children(conn, step)?;
                }
                Ok(steps)
            })
            .await
    }

    /// Highest step_order in a workflow (0 when it has no steps).
    pub async fn max_order(&self, workflow_id: &str) -> Result<i64, ServerError> {
        let wf_id = workflow_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT COALESCE(MAX(step_order), 0) FROM workflow_steps WHERE workflow_id = ?1",
                    rusqlite::params![wf_id],
                    |row| row.get(0),
                )
            })
            .await
    }

    /// Whether `step_order` is already taken in the workflow, excluding
    /// the step being updated (if any).
    pub async fn order_exists(
        &self,
        workflow_id: &str,
        step_order: i64,
        exclude_step: Option<&str>,
    ) -> Result<bool, ServerError> {
        let wf_id = workflow_id.to_string();
        let exclude = exclude_step.map(str::to_string);
        self.db
            .with_conn_async(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM workflow_steps
                     WHERE workflow_id = ?1 AND step_order = ?2 AND (?3 IS NULL OR id != ?3)",
                    rusqlite::params![wf_id, step_order, exclude],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
    }

    /// Delete a step and renumber the remaining siblings so the order
    /// sequence has no gap. Returns whether a step was removed.
    pub async fn delete_and_renumber(&self, id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let target: Option<(String, i64)> = conn
                    .query_row(
                        "SELECT workflow_id, step_order FROM workflow_steps WHERE id = ?1",
                        rusqlite::params![id],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()?;
                let Some((workflow_id, deleted_order)) = target else {
                    return Ok(false);
                };

                conn.execute(
                    "DELETE FROM workflow_steps WHERE id = ?1",
                    rusqlite::params![id],
                )?;
                // Two passes so the unique (workflow_id, step_order) index
                // never sees a transient duplicate.
                conn.execute(
                    "UPDATE workflow_steps SET step_order = -step_order
                     WHERE workflow_id = ?1 AND step_order > ?2",
                    rusqlite::params![workflow_id, deleted_order],
                )?;
                conn.execute(
                    "UPDATE workflow_steps SET step_order = -step_order - 1
                     WHERE workflow_id = ?1 AND step_order < 0",
                    rusqlite::params![workflow_id],
                )?;
                Ok(true)
            })
            .await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, ServerError> {
        let id = id.to_string();
        self.db
            .with_conn_async(move |conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM workflow_steps WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get::<_, i64>(0),
                )
                .map(|count| count > 0)
            })
            .await
    }

    pub async fn add_branch(&self, branch: &RoutingBranch) -> Result<(), ServerError> {
        let b = branch.clone();
        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO routing_branches (id, step_id, condition_result, action_type,
                     next_step_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        b.id,
                        b.step_id,
                        b.condition_result,
                        b.action_type,
                        b.next_step_id,
                        b.created_at.timestamp_millis(),
                        b.updated_at.timestamp_millis(),
                    ],
                )?;
                Ok(())
            })
            .await
    }

    pub async fn remove_branch(&self, step_id: &str, branch_id: &str) -> Result<bool, ServerError> {
        let step_id = step_id.to_string();
        let branch_id = branch_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let changed = conn.execute(
                    "DELETE FROM routing_branches WHERE id = ?1 AND step_id = ?2",
                    rusqlite::params![branch_id, step_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }
}

/// Column order: id(0), workflow_id(1), task_id(2), name(3), step_order(4),
/// status(5), context_type(6), context_image_url(7), context_text_content(8),
/// context_voice_transcript(9), context_description(10),
/// extraction_keywords(11), extraction_voice_transcript(12),
/// logic_strategy(13), logic_rule_expression(14), logic_evaluation_prompt(15),
/// routing_default_next(16), expert_notes(17), created_at(18), updated_at(19)
pub(crate) fn row_to_step(row: &Row<'_>) -> WorkflowStep {
    let keywords: Vec<String> = row
        .get::<_, String>(11)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default();

    WorkflowStep {
        id: row.get(0).unwrap_or_default(),
        workflow_id: row.get(1).unwrap_or_default(),
        task_id: row.get(2).unwrap_or(None),
        name: row.get(3).unwrap_or_default(),
        step_order: row.get(4).unwrap_or(0),
        status: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| StepStatus::from_str(&s))
            .unwrap_or(StepStatus::Pending),
        context_type: row
            .get::<_, Option<String>>(6)
            .unwrap_or(None)
            .and_then(|s| ContextType::from_str(&s)),
        context_image_url: row.get(7).unwrap_or(None),
        context_text_content: row.get(8).unwrap_or(None),
        context_voice_transcript: row.get(9).unwrap_or(None),
        context_description: row.get(10).unwrap_or(None),
        extraction_keywords: keywords,
        extraction_voice_transcript: row.get(12).unwrap_or(None),
        logic_strategy: row
            .get::<_, Option<String>>(13)
            .unwrap_or(None)
            .and_then(|s| LogicStrategy::from_str(&s)),
        logic_rule_expression: row.get(14).unwrap_or(None),
        logic_evaluation_prompt: row.get(15).unwrap_or(None),
        routing_default_next: row.get(16).unwrap_or(None),
        expert_notes: row.get(17).unwrap_or(None),
        examples: Vec::new(),
        routing_branches: Vec::new(),
        notes: Vec::new(),
        created_at: timestamp(row, 18),
        updated_at: timestamp(row, 19),
    }
}

/// Load a step's examples, routing branches and notes.
pub(crate) fn populate_step_children(
    conn: &Connection,
    step: &mut WorkflowStep,
) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, step_id, content, content_type, label, description, created_at, updated_at
         FROM examples WHERE step_id = ?1 ORDER BY created_at, rowid",
    )?;
    step.examples = stmt
        .query_map(rusqlite::params![step.id], |row| Ok(row_to_example(row)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, step_id, condition_result, action_type, next_step_id, created_at, updated_at
         FROM routing_branches WHERE step_id = ?1 ORDER BY created_at, rowid",
    )?;
    step.routing_branches = stmt
        .query_map(rusqlite::params![step.id], |row| Ok(row_to_branch(row)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, step_id, content_type, content, voice_transcript, created_by, created_at, updated_at
         FROM step_notes WHERE step_id = ?1 ORDER BY created_at, rowid",
    )?;
    step.notes = stmt
        .query_map(rusqlite::params![step.id], |row| Ok(row_to_note(row)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(())
}

pub(crate) fn row_to_example(row: &Row<'_>) -> Example {
    Example {
        id: row.get(0).unwrap_or_default(),
        step_id: row.get(1).unwrap_or_default(),
        content: row.get(2).unwrap_or_default(),
        content_type: row
            .get::<_, Option<String>>(3)
            .unwrap_or(None)
            .and_then(|s| ExampleContentType::from_str(&s)),
        label: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| ExampleLabel::from_str(&s))
            .unwrap_or(ExampleLabel::Pass),
        description: row.get(5).unwrap_or(None),
        created_at: timestamp(row, 6),
        updated_at: timestamp(row, 7),
    }
}

pub(crate) fn row_to_branch(row: &Row<'_>) -> RoutingBranch {
    RoutingBranch {
        id: row.get(0).unwrap_or_default(),
        step_id: row.get(1).unwrap_or_default(),
        condition_result: row.get(2).unwrap_or_default(),
        action_type: row.get(3).unwrap_or_default(),
        next_step_id: row.get(4).unwrap_or_default(),
        created_at: timestamp(row, 5),
        updated_at: timestamp(row, 6),
    }
}

pub(crate) fn row_to_note(row: &Row<'_>) -> StepNote {
    StepNote {
        id: row.get(0).unwrap_or_default(),
        step_id: row.get(1).unwrap_or_default(),
        content_type: row
            .get::<_, String>(2)
            .ok()
            .and_then(|s| NoteContentType::from_str(&s))
            .unwrap_or(NoteContentType::Text),
        content: row.get(3).unwrap_or_default(),
        voice_transcript: row.get(4).unwrap_or(None),
        created_by: row
            .get::<_, String>(5)
            .ok()
            .and_then(|s| NoteAuthor::from_str(&s))
            .unwrap_or(NoteAuthor::Worker),
        created_at: timestamp(row, 6),
        updated_at: timestamp(row, 7),
    }
}

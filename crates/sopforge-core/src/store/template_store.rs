use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use crate::db::Database;
use crate::error::ServerError;
use crate::models::workflow::Workflow;
use crate::store::step_store::row_to_step;
use crate::store::task_store::row_to_task;
use crate::store::workflow_store::row_to_workflow;

/// Preset template seed data: (name, description, tasks), each task
/// being (name, description, steps of (name, context_description)).
type PresetTask = (&'static str, &'static str, &'static [(&'static str, &'static str)]);

const PRESET_TEMPLATES: &[(&str, &str, &[PresetTask])] = &[
    (
        "Routine inspection",
        "For equipment patrols, safety checks and similar rounds",
        &[
            (
                "On-site recording",
                "Photograph the site conditions",
                &[
                    ("Capture overview", "Take a wide photo of the whole site"),
                    ("Capture details", "Photograph the spots that need close inspection"),
                ],
            ),
            (
                "Data collection",
                "Read instrument values",
                &[
                    ("Read the meter", "Read the value shown on the instrument"),
                    ("Record anomalies", "Note any abnormal condition found"),
                ],
            ),
            (
                "Result reporting",
                "Fill in the inspection results",
                &[
                    ("Fill the form", "Enter the collected data into the checklist"),
                    ("Sign off", "Sign to confirm the inspection is complete"),
                ],
            ),
        ],
    ),
    (
        "Quality check",
        "For product QA, incoming goods inspection and similar checks",
        &[
            (
                "Visual inspection",
                "Check the product appearance",
                &[
                    ("Overall appearance", "Check that the product looks intact overall"),
                    ("Surface defects", "Look for scratches, stains or other surface flaws"),
                ],
            ),
            (
                "Dimension measurement",
                "Measure the product dimensions",
                &[
                    ("Measure with tools", "Measure dimensions with calipers or gauges"),
                    ("Record readings", "Write down the measured values"),
                ],
            ),
            (
                "Function test",
                "Test the product functions",
                &[
                    ("Power-on test", "Connect power and verify the product works"),
                    ("Performance test", "Test the performance indicators"),
                ],
            ),
        ],
    ),
    (
        "Support ticket",
        "For customer inquiries, complaint handling and similar cases",
        &[
            (
                "Information intake",
                "Collect customer details and the problem description",
                &[
                    ("Customer details", "Record the customer's name and contact info"),
                    ("Problem description", "Record the problem the customer reports"),
                ],
            ),
            (
                "Problem analysis",
                "Analyze the root cause",
                &[
                    ("Initial triage", "Classify the problem type from the description"),
                    ("Search history", "Check for similar past cases"),
                ],
            ),
            (
                "Resolution",
                "Resolve and follow up",
                &[
                    ("Provide a solution", "Offer the customer a solution"),
                    ("Confirm resolution", "Follow up to confirm the problem is solved"),
                ],
            ),
        ],
    ),
];

/// Store for workflow templates: listing, cloning into fresh workflows
/// and seeding the preset library.
pub struct TemplateStore {
    db: Database,
}

impl TemplateStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All template workflows with their tasks (steps omitted), oldest first.
    pub async fn list(&self) -> Result<Vec<Workflow>, ServerError> {
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, cover_image_url, status, is_template,
                     template_id, created_at, updated_at
                     FROM workflows WHERE is_template = 1 ORDER BY created_at",
                )?;
                let mut templates = stmt
                    .query_map([], |row| Ok(row_to_workflow(row)))?
                    .collect::<Result<Vec<_>, _>>()?;
                for template in &mut templates {
                    load_tasks(conn, template, false)?;
                }
                Ok(templates)
            })
            .await
    }

    /// A single template with its tasks and their steps.
    pub async fn get(&self, template_id: &str) -> Result<Option<Workflow>, ServerError> {
        let id = template_id.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, cover_image_url, status, is_template,
                     template_id, created_at, updated_at
                     FROM workflows WHERE id = ?1 AND is_template = 1",
                )?;
                let template = stmt
                    .query_row(rusqlite::params![id], |row| Ok(row_to_workflow(row)))
                    .optional()?;
                let Some(mut template) = template else {
                    return Ok(None);
                };
                load_tasks(conn, &mut template, true)?;
                Ok(Some(template))
            })
            .await
    }

    /// Clone a template into a fresh draft workflow. Copies tasks and step
    /// names/descriptions, renumbers steps 1..n across tasks and records
    /// the template id as provenance. Returns the new workflow id, or
    /// `None` when the template does not exist.
    pub async fn create_workflow_from(
        &self,
        template_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<Option<String>, ServerError> {
        let tid = template_id.to_string();
        let name = name.to_string();
        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, cover_image_url, status, is_template,
                     template_id, created_at, updated_at
                     FROM workflows WHERE id = ?1 AND is_template = 1",
                )?;
                let template = stmt
                    .query_row(rusqlite::params![tid.clone()], |row| Ok(row_to_workflow(row)))
                    .optional()?;
                let Some(mut template) = template else {
                    return Ok(None);
                };
                load_tasks(conn, &mut template, true)?;

                let now = Utc::now().timestamp_millis();
                let workflow_id = uuid::Uuid::new_v4().to_string();
                conn.execute(
                    "INSERT INTO workflows (id, name, description, cover_image_url, status,
                     is_template, template_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 'draft', 0, ?5, ?6, ?6)",
                    rusqlite::params![
                        workflow_id,
                        name,
                        description.or(template.description),
                        template.cover_image_url,
                        tid,
                        now,
                    ],
                )?;

                let mut step_order: i64 = 1;
                for task in &template.tasks {
                    let task_id = uuid::Uuid::new_v4().to_string();
                    conn.execute(
                        "INSERT INTO tasks (id, workflow_id, name, task_order, description,
                         status, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)",
                        rusqlite::params![
                            task_id,
                            workflow_id,
                            task.name,
                            task.task_order,
                            task.description,
                            now,
                        ],
                    )?;
                    for step in &task.steps {
                        insert_bare_step(
                            conn,
                            &workflow_id,
                            Some(&task_id),
                            &step.name,
                            step_order,
                            step.context_description.as_deref(),
                            now,
                        )?;
                        step_order += 1;
                    }
                }

                Ok(Some(workflow_id))
            })
            .await
    }

    /// Seed the preset templates when the template library is empty.
    /// Returns the number of templates created (0 when already seeded).
    pub async fn init_presets(&self) -> Result<usize, ServerError> {
        self.db
            .with_conn_async(move |conn| {
                let existing: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM workflows WHERE is_template = 1",
                    [],
                    |row| row.get(0),
                )?;
                if existing > 0 {
                    return Ok(0);
                }

                let now = Utc::now().timestamp_millis();
                for (name, description, tasks) in PRESET_TEMPLATES {
                    let workflow_id = uuid::Uuid::new_v4().to_string();
                    conn.execute(
                        "INSERT INTO workflows (id, name, description, cover_image_url, status,
                         is_template, template_id, created_at, updated_at)
                         VALUES (?1, ?2, ?3, NULL, 'draft', 1, NULL, ?4, ?4)",
                        rusqlite::params![workflow_id, name, description, now],
                    )?;

                    let mut step_order: i64 = 1;
                    for (task_order, (task_name, task_description, steps)) in
                        tasks.iter().enumerate()
                    {
                        let task_id = uuid::Uuid::new_v4().to_string();
                        conn.execute(
                            "INSERT INTO tasks (id, workflow_id, name, task_order, description,
                             status, created_at, updated_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)",
                            rusqlite::params![
                                task_id,
                                workflow_id,
                                task_name,
                                (task_order + 1) as i64,
                                task_description,
                                now,
                            ],
                        )?;
                        for (step_name, context_description) in *steps {
                            insert_bare_step(
                                conn,
                                &workflow_id,
                                Some(&task_id),
                                step_name,
                                step_order,
                                Some(context_description),
                                now,
                            )?;
                            step_order += 1;
                        }
                    }
                }

                tracing::info!("Seeded {} preset templates", PRESET_TEMPLATES.len());
                Ok(PRESET_TEMPLATES.len())
            })
            .await
    }
}

fn load_tasks(
    conn: &Connection,
    workflow: &mut Workflow,
    with_steps: bool,
) -> Result<(), rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT id, workflow_id, name, task_order, description, status, created_at, updated_at
         FROM tasks WHERE workflow_id = ?1 ORDER BY task_order",
    )?;
    workflow.tasks = stmt
        .query_map(rusqlite::params![workflow.id], |row| Ok(row_to_task(row)))?
        .collect::<Result<Vec<_>, _>>()?;

    if with_steps {
        for task in &mut workflow.tasks {
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
        }
    }
    Ok(())
}

/// Insert a skeleton step carrying only a name and context description.
fn insert_bare_step(
    conn: &Connection,
    workflow_id: &str,
    task_id: Option<&str>,
    name: &str,
    step_order: i64,
    context_description: Option<&str>,
    now: i64,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO workflow_steps (id, workflow_id, task_id, name, step_order, status,
         context_description, extraction_keywords, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, '[]', ?7, ?7)",
        rusqlite::params![
            uuid::Uuid::new_v4().to_string(),
            workflow_id,
            task_id,
            name,
            step_order,
            context_description,
            now,
        ],
    )?;
    Ok(())
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::step::WorkflowStep;
use crate::models::task::Task;

/// Lifecycle status of a workflow.
///
/// The intended order of progress is
/// `draft → worker_done → expert_done → analyzed → confirmed → delivered`;
/// the allowed transitions live in [`crate::status`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Draft,
    WorkerDone,
    ExpertDone,
    Analyzed,
    Confirmed,
    Delivered,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::WorkerDone => "worker_done",
            Self::ExpertDone => "expert_done",
            Self::Analyzed => "analyzed",
            Self::Confirmed => "confirmed",
            Self::Delivered => "delivered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "worker_done" => Some(Self::WorkerDone),
            "expert_done" => Some(Self::ExpertDone),
            "analyzed" => Some(Self::Analyzed),
            "confirmed" => Some(Self::Confirmed),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

/// A complete SOP workflow: the top-level aggregate root.
///
/// `tasks` and `steps` are populated by the aggregate loader
/// (`WorkflowStore::get_aggregate`); flat row lookups leave them empty.
/// `steps` is the legacy flat ordering kept for the protocol projector
/// and older clients; `tasks` group the same steps for the current UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub is_template: bool,
    /// Template this workflow was cloned from. Provenance only — never a
    /// live ownership edge, so no cascade semantics apply.
    pub template_id: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: String, description: Option<String>, cover_image_url: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description,
            cover_image_url,
            status: WorkflowStatus::Draft,
            is_template: false,
            template_id: None,
            tasks: Vec::new(),
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Flat listing shape for paginated workflow indexes (no children).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub status: WorkflowStatus,
    pub is_template: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

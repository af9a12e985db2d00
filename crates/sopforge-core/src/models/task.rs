use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::step::WorkflowStep;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A named group of steps within a workflow (second hierarchy level).
///
/// `task_order` is unique per workflow. `steps` is populated by the
/// task loader; flat row lookups leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub workflow_id: String,
    pub name: String,
    pub task_order: i64,
    pub description: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        workflow_id: String,
        name: String,
        task_order: i64,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id,
            name,
            task_order,
            description,
            status: TaskStatus::Pending,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

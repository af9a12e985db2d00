use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::example::Example;
use crate::models::note::StepNote;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Completed,
}

impl StepStatus {
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

/// Kind of material captured for a step's context block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Image,
    Text,
    Voice,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
            Self::Voice => "voice",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "text" => Some(Self::Text),
            "voice" => Some(Self::Voice),
            _ => None,
        }
    }
}

/// How a step's evaluation logic is defined: a rule expression, or
/// PASS/FAIL examples used as few-shot samples.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogicStrategy {
    RuleBased,
    FewShot,
}

impl LogicStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RuleBased => "rule_based",
            Self::FewShot => "few_shot",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rule_based" => Some(Self::RuleBased),
            "few_shot" => Some(Self::FewShot),
            _ => None,
        }
    }
}

/// Atomic unit of work in a workflow, with four grouped data blocks:
/// context (what the worker captured), extraction (what to pull out of it),
/// logic (how to judge it) and routing (where to go next).
///
/// `step_order` is unique per workflow, even for steps grouped under
/// different tasks. Children are populated by the step loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub workflow_id: String,
    pub task_id: Option<String>,
    pub name: String,
    pub step_order: i64,
    pub status: StepStatus,

    // Context block — captured by the worker
    pub context_type: Option<ContextType>,
    pub context_image_url: Option<String>,
    pub context_text_content: Option<String>,
    pub context_voice_transcript: Option<String>,
    pub context_description: Option<String>,

    // Extraction block
    #[serde(default)]
    pub extraction_keywords: Vec<String>,
    pub extraction_voice_transcript: Option<String>,

    // Logic block
    pub logic_strategy: Option<LogicStrategy>,
    pub logic_rule_expression: Option<String>,
    pub logic_evaluation_prompt: Option<String>,

    // Routing block
    pub routing_default_next: Option<String>,

    /// Free-form cleanup notes added by the expert pass.
    pub expert_notes: Option<String>,

    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub routing_branches: Vec<RoutingBranch>,
    #[serde(default)]
    pub notes: Vec<StepNote>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowStep {
    pub fn new(workflow_id: String, task_id: Option<String>, name: String, step_order: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id,
            task_id,
            name,
            step_order,
            status: StepStatus::Pending,
            context_type: None,
            context_image_url: None,
            context_text_content: None,
            context_voice_transcript: None,
            context_description: None,
            extraction_keywords: Vec::new(),
            extraction_voice_transcript: None,
            logic_strategy: None,
            logic_rule_expression: None,
            logic_evaluation_prompt: None,
            routing_default_next: None,
            expert_notes: None,
            examples: Vec::new(),
            routing_branches: Vec::new(),
            notes: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Conditional routing edge attached to a step.
///
/// `condition_result`, `action_type` and `next_step_id` are free-form
/// identifiers agreed with the downstream engine; they are not validated
/// against the actual step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingBranch {
    pub id: String,
    pub step_id: String,
    pub condition_result: String,
    pub action_type: String,
    pub next_step_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoutingBranch {
    pub fn new(
        step_id: String,
        condition_result: String,
        action_type: String,
        next_step_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            step_id,
            condition_result,
            action_type,
            next_step_id,
            created_at: now,
            updated_at: now,
        }
    }
}

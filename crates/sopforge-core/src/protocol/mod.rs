//! Protocol JSON projection.
//!
//! Converts a loaded workflow aggregate into the wire format consumed by
//! the downstream automation engine. The projection is a pure, total,
//! deterministic function of the aggregate; it never touches the database.
//!
//! The field names here are a bit-exact contract with external engines —
//! do not rename them.

use serde::{Deserialize, Serialize};

use crate::models::example::ExampleLabel;
use crate::models::step::{LogicStrategy, WorkflowStep};
use crate::models::workflow::Workflow;

/// Wire-side logic strategy. The internal `few_shot` strategy ships as
/// `SEMANTIC_SIMILARITY` — the engine's name for example-driven matching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtocolLogicStrategy {
    RuleBased,
    SemanticSimilarity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolInputSpec {
    pub data_source: String,
    pub target_section: String,
    pub context_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolFewShotExample {
    pub content: String,
    pub label: ExampleLabel,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolLogicConfig {
    pub logic_strategy: ProtocolLogicStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_expression: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub few_shot_examples: Option<Vec<ProtocolFewShotExample>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_prompt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolRoutingBranch {
    pub condition_result: String,
    pub action_type: String,
    pub next_step_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolRoutingMap {
    pub default_next: String,
    #[serde(default)]
    pub branches: Vec<ProtocolRoutingBranch>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolOutputField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolOutputSchema {
    #[serde(default)]
    pub fields: Vec<ProtocolOutputField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolStep {
    pub step_id: String,
    pub step_name: String,
    pub business_domain: String,
    pub input_spec: ProtocolInputSpec,
    pub logic_config: ProtocolLogicConfig,
    pub routing_map: ProtocolRoutingMap,
    pub output_schema: ProtocolOutputSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolWorkflow {
    pub workflow_id: String,
    pub workflow_name: String,
    #[serde(default)]
    pub steps: Vec<ProtocolStep>,
}

/// Map the internal logic strategy to its wire value. An unset strategy
/// defaults to `RULE_BASED`.
pub fn strategy_to_protocol(internal: Option<LogicStrategy>) -> ProtocolLogicStrategy {
    match internal {
        Some(LogicStrategy::FewShot) => ProtocolLogicStrategy::SemanticSimilarity,
        Some(LogicStrategy::RuleBased) | None => ProtocolLogicStrategy::RuleBased,
    }
}

/// Inverse mapping, used when ingesting protocol-format data back into
/// internal storage. Unmapped wire values lower-case themselves.
pub fn strategy_from_protocol(wire: &str) -> String {
    match wire {
        "RULE_BASED" => "rule_based".to_string(),
        "SEMANTIC_SIMILARITY" => "few_shot".to_string(),
        other => other.to_lowercase(),
    }
}

/// Project a loaded workflow aggregate into Protocol JSON.
pub fn project_workflow(workflow: &Workflow) -> ProtocolWorkflow {
    let mut steps: Vec<&WorkflowStep> = workflow.steps.iter().collect();
    steps.sort_by_key(|s| s.step_order);

    ProtocolWorkflow {
        workflow_id: workflow.id.clone(),
        workflow_name: workflow.name.clone(),
        steps: steps
            .into_iter()
            .map(|step| project_step(workflow, step))
            .collect(),
    }
}

fn project_step(workflow: &Workflow, step: &WorkflowStep) -> ProtocolStep {
    ProtocolStep {
        step_id: step.id.clone(),
        step_name: step.name.clone(),
        business_domain: business_domain(workflow, step),
        input_spec: input_spec(step),
        logic_config: logic_config(step),
        routing_map: routing_map(step),
        output_schema: output_schema(step),
    }
}

/// Business domain: the step's own description (truncated), else the
/// workflow name, else the literal "general".
fn business_domain(workflow: &Workflow, step: &WorkflowStep) -> String {
    if let Some(desc) = non_empty(&step.context_description) {
        return truncate_chars(desc, 100);
    }
    if !workflow.name.is_empty() {
        return workflow.name.clone();
    }
    "general".to_string()
}

fn input_spec(step: &WorkflowStep) -> ProtocolInputSpec {
    let data_source = step
        .context_type
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // Target section: first non-empty of image URL, text content, transcript.
    let target_section = if let Some(url) = non_empty(&step.context_image_url) {
        url.to_string()
    } else if let Some(text) = non_empty(&step.context_text_content) {
        truncate_chars(text, 200)
    } else if let Some(voice) = non_empty(&step.context_voice_transcript) {
        truncate_chars(voice, 200)
    } else {
        String::new()
    };

    let mut context_description = step.context_description.clone().unwrap_or_default();
    if !step.extraction_keywords.is_empty() {
        let keywords = step.extraction_keywords.join(", ");
        context_description = format!("{} [Keywords: {}]", context_description, keywords)
            .trim()
            .to_string();
    }

    ProtocolInputSpec {
        data_source,
        target_section,
        context_description,
    }
}

fn logic_config(step: &WorkflowStep) -> ProtocolLogicConfig {
    // Few-shot examples ship only when the strategy is few_shot AND at
    // least one example exists; never an empty list.
    let few_shot_examples = match step.logic_strategy {
        Some(LogicStrategy::FewShot) if !step.examples.is_empty() => Some(
            step.examples
                .iter()
                .map(|example| ProtocolFewShotExample {
                    content: example.content.clone(),
                    label: example.label,
                    description: example.description.clone().unwrap_or_default(),
                })
                .collect(),
        ),
        _ => None,
    };

    ProtocolLogicConfig {
        logic_strategy: strategy_to_protocol(step.logic_strategy),
        rule_expression: step.logic_rule_expression.clone(),
        few_shot_examples,
        evaluation_prompt: step.logic_evaluation_prompt.clone(),
    }
}

fn routing_map(step: &WorkflowStep) -> ProtocolRoutingMap {
    ProtocolRoutingMap {
        default_next: step
            .routing_default_next
            .clone()
            .unwrap_or_else(|| "next".to_string()),
        branches: step
            .routing_branches
            .iter()
            .map(|branch| ProtocolRoutingBranch {
                condition_result: branch.condition_result.clone(),
                action_type: branch.action_type.clone(),
                next_step_id: branch.next_step_id.clone(),
            })
            .collect(),
    }
}

/// One string field per extraction keyword, plus the synthetic trailing
/// `judgment_result` field the engine always expects.
fn output_schema(step: &WorkflowStep) -> ProtocolOutputSchema {
    let mut fields: Vec<ProtocolOutputField> = step
        .extraction_keywords
        .iter()
        .map(|keyword| ProtocolOutputField {
            name: keyword.clone(),
            field_type: "string".to_string(),
        })
        .collect();

    fields.push(ProtocolOutputField {
        name: "judgment_result".to_string(),
        field_type: "string".to_string(),
    });

    ProtocolOutputSchema { fields }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

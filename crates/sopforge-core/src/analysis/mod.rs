//! AI analysis: draft a data contract for a step.
//!
//! Takes a step's description and collected materials, asks the LLM to
//! translate them into a Data Flow Specification — which inputs the step
//! needs and which outputs it must produce — and parses the response into
//! a typed contract. Downstream implementors build against the contract
//! without being told how to satisfy it.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::llm::{LlmClient, LlmError};
use crate::models::note::NoteContentType;
use crate::models::step::WorkflowStep;

/// One field of a step's input or output contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub description: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub example: Option<String>,
}

fn default_required() -> bool {
    true
}

/// The data contract for a single step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepContract {
    pub step_id: i64,
    pub step_name: String,
    pub business_intent: String,
    pub inputs: Vec<DataField>,
    pub outputs: Vec<DataField>,
    pub acceptance_criteria: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub contract: StepContract,
    pub confidence_score: f64,
}

/// API response shape for the analysis endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub step_id: String,
    pub step_name: String,
    pub result: AnalysisResult,
    pub llm_model: String,
    pub has_materials: bool,
}

/// An output variable produced by an earlier step, passed in so the
/// drafted contract reuses the same variable names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviousOutput {
    pub name: String,
    #[serde(rename = "type", default = "default_field_type")]
    pub field_type: String,
    #[serde(default)]
    pub description: String,
}

fn default_field_type() -> String {
    "string".to_string()
}

/// System prompt: the model acts as a contract definer, never an
/// implementor. Output format is pinned to a JSON contract object.
pub const ANALYSIS_PROMPT: &str = r#"You are a data-contract definer. You translate business requirements into a Data Flow Specification: what each step takes as input and what it must return as output.

Roles:
- Upstream (business staff) only describe what they need in natural language.
- You define the contract: what the inputs are and what the outputs are.
- Downstream (developers) choose any implementation that satisfies the contract.

Core principle: define WHAT is required, never HOW to achieve it.
- Wrong: "use YOLOv8 to count people"
- Right: "Input: one image; Output: person_count (int), the number of people"

Field types: string, int, float, bool, image (URL or base64), file, list[string], dict.

Respond with exactly this JSON structure:
```json
{
  "contract": {
    "step_id": 1,
    "step_name": "short step name",
    "business_intent": "one sentence describing what this step does",
    "inputs": [
      {"name": "input_field_name", "type": "string", "description": "what it is", "required": true, "example": "sample value"}
    ],
    "outputs": [
      {"name": "output_field_name", "type": "string", "description": "what it is", "required": true, "example": "sample value"}
    ],
    "acceptance_criteria": "optional: what counts as done well",
    "notes": "optional remarks"
  },
  "confidence_score": 0.9
}
```

Example. User input: "count how many people are in the photo". Output:
```json
{
  "contract": {
    "step_id": 1,
    "step_name": "Count people",
    "business_intent": "Count the number of people in the captured photo",
    "inputs": [
      {"name": "office_image", "type": "image", "description": "photo captured by the previous step", "required": true, "example": null}
    ],
    "outputs": [
      {"name": "person_count", "type": "int", "description": "number of people detected", "required": true, "example": "5"}
    ],
    "acceptance_criteria": "count is off by at most one person",
    "notes": "implementors may use CV, a vision model, or manual labeling"
  },
  "confidence_score": 0.95
}
```

Rules:
1. Define only the contract; never mention concrete models, libraries or languages.
2. Field names use English snake_case.
3. When upstream variables are provided, reuse their exact names for matching inputs.
4. State the business intent in one clear sentence."#;

/// Whether a step carries anything worth analyzing, and what kind.
struct StepMaterials {
    has_description: bool,
    has_materials: bool,
    has_expert_notes: bool,
}

fn inspect(step: &WorkflowStep) -> StepMaterials {
    let has_old_materials = step.context_image_url.is_some()
        || step.context_text_content.is_some()
        || step.context_voice_transcript.is_some();
    StepMaterials {
        has_description: step.context_description.is_some()
            || step.logic_evaluation_prompt.is_some(),
        has_materials: has_old_materials || !step.notes.is_empty(),
        has_expert_notes: step.expert_notes.is_some(),
    }
}

/// Analyze a loaded step and draft its data contract.
///
/// A step with nothing filled in returns an "unconfigured" contract with
/// zero confidence and skips the LLM round-trip entirely.
pub async fn analyze_step(
    step: &WorkflowStep,
    previous_outputs: &[PreviousOutput],
    llm: &LlmClient,
) -> Result<AnalysisResponse, LlmError> {
    let materials = inspect(step);

    if !materials.has_description && !materials.has_materials && !materials.has_expert_notes {
        return Ok(AnalysisResponse {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            result: AnalysisResult {
                contract: StepContract {
                    step_id: 0,
                    step_name: "unconfigured".to_string(),
                    business_intent: "step description is empty".to_string(),
                    inputs: Vec::new(),
                    outputs: Vec::new(),
                    acceptance_criteria: None,
                    notes: Some("fill in the step description first".to_string()),
                },
                confidence_score: 0.0,
            },
            llm_model: llm.model().to_string(),
            has_materials: false,
        });
    }

    let input = build_step_input(step, previous_outputs);
    let raw = llm.analyze_text(ANALYSIS_PROMPT, &input).await?;
    let result = parse_analysis_result(&raw);

    Ok(AnalysisResponse {
        step_id: step.id.clone(),
        step_name: step.name.clone(),
        result,
        llm_model: llm.model().to_string(),
        has_materials: materials.has_materials,
    })
}

/// Assemble the user-turn text for the LLM from the step's data.
pub fn build_step_input(step: &WorkflowStep, previous_outputs: &[PreviousOutput]) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !previous_outputs.is_empty() {
        let mut lines = vec![
            "## Context: output variables of previous steps".to_string(),
            "Reuse these variable names when this step's inputs come from an earlier step:"
                .to_string(),
        ];
        for output in previous_outputs {
            lines.push(format!(
                "- `{}` ({}): {}",
                output.name, output.field_type, output.description
            ));
        }
        parts.push(lines.join("\n"));
    }

    if !step.name.is_empty() {
        parts.push(format!("## Step name\n{}", step.name));
    }

    if let Some(description) = step
        .context_description
        .as_deref()
        .or(step.logic_evaluation_prompt.as_deref())
    {
        parts.push(format!("## Step description\n{}", description));
    }

    if let Some(expert_notes) = &step.expert_notes {
        parts.push(format!("## Expert notes\n{}", expert_notes));
    }

    let mut collected: Vec<String> = Vec::new();
    for note in &step.notes {
        match note.content_type {
            NoteContentType::Image => collected.push(format!("- image material: {}", note.content)),
            NoteContentType::Voice => {
                let transcript = note
                    .voice_transcript
                    .as_deref()
                    .unwrap_or("(voice not transcribed)");
                collected.push(format!("- voice transcript: {}", transcript));
            }
            NoteContentType::Text => {
                collected.push(format!("- text material:\n{}", clip(&note.content)))
            }
            NoteContentType::Video => collected.push(format!("- video material: {}", note.content)),
        }
    }
    if !collected.is_empty() {
        parts.push(format!("## Collected materials\n{}", collected.join("\n")));
    }

    // Legacy context fields kept for older workflows.
    let mut legacy: Vec<String> = Vec::new();
    if let Some(url) = &step.context_image_url {
        legacy.push(format!("- image material: {}", url));
    }
    if let Some(text) = &step.context_text_content {
        legacy.push(format!("- text material:\n{}", clip(text)));
    }
    if let Some(voice) = &step.context_voice_transcript {
        legacy.push(format!("- voice transcript:\n{}", clip(voice)));
    }
    if !legacy.is_empty() {
        parts.push(format!("## Reference materials\n{}", legacy.join("\n")));
    }

    parts.join("\n\n")
}

fn clip(text: &str) -> String {
    if text.chars().count() > 500 {
        let head: String = text.chars().take(500).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Parse an LLM response into an [`AnalysisResult`].
///
/// Tolerates fenced code blocks and a couple of recurring model mistakes
/// (non-string `example` values). Unparseable responses yield a fallback
/// contract carrying a snippet of the raw response, never an error.
pub fn parse_analysis_result(raw: &str) -> AnalysisResult {
    let json_str = extract_json_block(raw);

    let data: Option<serde_json::Value> = serde_json::from_str(&json_str).ok().or_else(|| {
        // Models sometimes emit `"example": {...}` or bare numbers where a
        // string belongs; null them out and retry.
        let re = Regex::new(
            r#""example"\s*:\s*(?:"?\{[^}]+\}[^,\n]*|"?\[[^\]]+\][^,\n]*|\d+(?:\.\d+)?|true|false)"#,
        )
        .ok()?;
        let fixed = re.replace_all(&json_str, r#""example": null"#);
        match serde_json::from_str(&fixed) {
            Ok(value) => {
                tracing::info!("Fixed malformed JSON by removing problematic example values");
                Some(value)
            }
            Err(_) => None,
        }
    });

    let Some(data) = data else {
        tracing::warn!("Failed to parse LLM response as JSON");
        return fallback_result(raw);
    };

    let contract_data = &data["contract"];
    let contract = StepContract {
        step_id: contract_data["step_id"].as_i64().unwrap_or(1),
        step_name: contract_data["step_name"]
            .as_str()
            .unwrap_or("unnamed step")
            .to_string(),
        business_intent: contract_data["business_intent"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        inputs: parse_fields(&contract_data["inputs"]),
        outputs: parse_fields(&contract_data["outputs"]),
        acceptance_criteria: contract_data["acceptance_criteria"]
            .as_str()
            .map(str::to_string),
        notes: contract_data["notes"].as_str().map(str::to_string),
    };

    AnalysisResult {
        contract,
        confidence_score: data["confidence_score"].as_f64().unwrap_or(0.5),
    }
}

fn extract_json_block(raw: &str) -> String {
    if let Some(start) = raw.find("```json") {
        let rest = &raw[start + 7..];
        let end = rest.find("```").unwrap_or(rest.len());
        return rest[..end].trim().to_string();
    }
    if let Some(start) = raw.find("```") {
        let rest = &raw[start + 3..];
        let end = rest.find("```").unwrap_or(rest.len());
        return rest[..end].trim().to_string();
    }
    raw.trim().to_string()
}

fn parse_fields(value: &serde_json::Value) -> Vec<DataField> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .map(|field| DataField {
            name: field["name"].as_str().unwrap_or("unknown").to_string(),
            field_type: field["type"].as_str().unwrap_or("string").to_string(),
            description: field["description"].as_str().unwrap_or_default().to_string(),
            required: field["required"].as_bool().unwrap_or(true),
            example: stringify_example(&field["example"]),
        })
        .collect()
}

/// `example` must end up a string; lists, numbers and booleans become
/// their JSON rendering.
fn stringify_example(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn fallback_result(raw: &str) -> AnalysisResult {
    let snippet: String = raw.chars().take(200).collect();
    AnalysisResult {
        contract: StepContract {
            step_id: 0,
            step_name: "parse error".to_string(),
            business_intent: "failed to parse the LLM response".to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            acceptance_criteria: None,
            notes: Some(format!(
                "raw response: {}",
                if snippet.is_empty() { "(empty)" } else { &snippet }
            )),
        },
        confidence_score: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::note::{NoteAuthor, StepNote};

    fn step() -> WorkflowStep {
        WorkflowStep::new("wf".to_string(), None, "Count people".to_string(), 1)
    }

    #[test]
    fn parses_a_fenced_contract() {
        let raw = r#"Here is the contract:
```json
{
  "contract": {
    "step_id": 2,
    "step_name": "Count people",
    "business_intent": "Count people in the photo",
    "inputs": [{"name": "office_image", "type": "image", "description": "the photo", "required": true, "example": null}],
    "outputs": [{"name": "person_count", "type": "int", "description": "people found", "required": true, "example": "5"}],
    "acceptance_criteria": "off by at most one",
    "notes": null
  },
  "confidence_score": 0.95
}
```"#;
        let result = parse_analysis_result(raw);
        assert_eq!(result.contract.step_id, 2);
        assert_eq!(result.contract.inputs.len(), 1);
        assert_eq!(result.contract.inputs[0].field_type, "image");
        assert_eq!(result.contract.outputs[0].example.as_deref(), Some("5"));
        assert_eq!(result.contract.notes, None);
        assert!((result.confidence_score - 0.95).abs() < f64::EPSILON);
    }

    #[test]
    fn stringifies_non_string_examples() {
        let raw = r#"{"contract": {"step_id": 1, "step_name": "s", "business_intent": "i",
            "inputs": [], "outputs": [{"name": "n", "type": "int", "description": "", "required": true, "example": 5}]},
            "confidence_score": 0.8}"#;
        let result = parse_analysis_result(raw);
        assert_eq!(result.contract.outputs[0].example.as_deref(), Some("5"));
    }

    #[test]
    fn unparseable_response_yields_fallback_contract() {
        let result = parse_analysis_result("sorry, I cannot help with that");
        assert_eq!(result.contract.step_id, 0);
        assert_eq!(result.confidence_score, 0.0);
        assert!(result.contract.notes.as_deref().unwrap().contains("sorry"));
    }

    #[test]
    fn step_input_includes_previous_outputs_and_notes() {
        let mut s = step();
        s.context_description = Some("Count heads in the photo".to_string());
        s.notes.push(StepNote::new(
            s.id.clone(),
            NoteContentType::Voice,
            "/uploads/v.ogg".to_string(),
            NoteAuthor::Worker,
            Some("about five people".to_string()),
        ));
        let previous = [PreviousOutput {
            name: "office_image".to_string(),
            field_type: "image".to_string(),
            description: "photo from step 1".to_string(),
        }];

        let input = build_step_input(&s, &previous);
        assert!(input.contains("`office_image` (image)"));
        assert!(input.contains("## Step description\nCount heads in the photo"));
        assert!(input.contains("voice transcript: about five people"));
    }

    #[tokio::test]
    async fn empty_step_short_circuits_without_llm() {
        let llm = LlmClient::new(crate::llm::LlmConfig::default());
        let response = analyze_step(&step(), &[], &llm).await.unwrap();
        assert_eq!(response.result.confidence_score, 0.0);
        assert_eq!(response.result.contract.step_name, "unconfigured");
        assert!(!response.has_materials);
    }
}

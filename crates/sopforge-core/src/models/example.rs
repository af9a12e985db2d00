use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// PASS/FAIL label on a few-shot sample. The label decides which upload
/// zone the sample came from and how the downstream engine weighs it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExampleLabel {
    Pass,
    Fail,
}

impl ExampleLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PASS" => Some(Self::Pass),
            "FAIL" => Some(Self::Fail),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExampleContentType {
    Image,
    Text,
}

impl ExampleContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Few-shot training sample attached to a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub id: String,
    pub step_id: String,
    pub content: String,
    pub content_type: Option<ExampleContentType>,
    pub label: ExampleLabel,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Example {
    pub fn new(
        step_id: String,
        content: String,
        content_type: Option<ExampleContentType>,
        label: ExampleLabel,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            step_id,
            content,
            content_type,
            label,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

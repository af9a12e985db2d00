use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteContentType {
    Image,
    Voice,
    Video,
    Text,
}

impl NoteContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Video => "video",
            Self::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "voice" => Some(Self::Voice),
            "video" => Some(Self::Video),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoteAuthor {
    Worker,
    Expert,
}

impl NoteAuthor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Expert => "expert",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "worker" => Some(Self::Worker),
            "expert" => Some(Self::Expert),
            _ => None,
        }
    }
}

/// Media attachment or annotation on a step (third hierarchy level).
/// `content` holds a URL for image/voice/video notes and the text itself
/// for text notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepNote {
    pub id: String,
    pub step_id: String,
    pub content_type: NoteContentType,
    pub content: String,
    pub voice_transcript: Option<String>,
    pub created_by: NoteAuthor,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StepNote {
    pub fn new(
        step_id: String,
        content_type: NoteContentType,
        content: String,
        created_by: NoteAuthor,
        voice_transcript: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            step_id,
            content_type,
            content,
            voice_transcript,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

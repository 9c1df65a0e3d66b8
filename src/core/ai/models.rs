use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: String,
}

impl AiMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Response from an AI provider, containing the main content and optional thinking.
#[derive(Debug, Clone, Default)]
pub struct AiProviderResponse {
    pub content: String,

    /// Reasoning text, for providers that return it separately.
    pub thinking: Option<String>,
}

/// What to write and to whom.
#[derive(Debug, Clone)]
pub struct EmailDraftRequest {
    pub recipient_name: String,
    pub recipient_email: String,
    pub sender_name: String,
    pub purpose: String,
    pub subject_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComposedEmail {
    pub subject: String,
    pub body: String,
}

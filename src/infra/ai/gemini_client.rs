// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements `AiProvider` against the Gemini generateContent endpoint.
//
// **Differences from OpenRouter:**
// - Request format: `contents[]` with nested `parts`; the system prompt goes in
//   the top-level `systemInstruction` field instead of a "system" message.
// - Response format: text is at `candidates[0].content.parts[*].text`.
//
// **Environment Variables:**
// - `GEMINI_API_KEY` - API key from https://aistudio.google.com/apikey
// - `GEMINI_MODEL` - defaults to `gemini-2.5-flash`

use crate::core::ai::{AiConfig, AiMessage, AiProvider, AiProviderResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    /// Set on parts that carry the model's reasoning rather than its answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    /// "user" or "model" (Gemini says "model" where others say "assistant")
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,

    /// Asks for a bare JSON body, which is what email drafting expects.
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,

    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }

    fn text_part(text: String) -> Part {
        Part {
            text: Some(text),
            thought: None,
        }
    }

    fn convert_message(msg: &AiMessage) -> Content {
        let role = match msg.role.as_str() {
            "assistant" => "model".to_string(),
            other => other.to_string(),
        };

        Content {
            role,
            parts: vec![Self::text_part(msg.content.clone())],
        }
    }

    fn build_request(messages: &[AiMessage], config: &AiConfig) -> GenerateContentRequest {
        let system_instruction = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| Content {
                role: "user".to_string(),
                parts: vec![Self::text_part(m.content.clone())],
            });

        let contents = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(Self::convert_message)
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: Some(config.temperature),
                max_output_tokens: config.max_tokens,
                response_mime_type: Some("application/json".to_string()),
            }),
        }
    }

    /// Splits candidate parts into (answer, thinking).
    fn extract_text(parts: &[Part]) -> (String, Option<String>) {
        let mut answer = Vec::new();
        let mut thinking = Vec::new();
        for part in parts {
            if let Some(text) = part.text.as_deref() {
                if part.thought == Some(true) {
                    thinking.push(text);
                } else {
                    answer.push(text);
                }
            }
        }
        let thinking = if thinking.is_empty() {
            None
        } else {
            Some(thinking.join("\n\n"))
        };
        (answer.join(""), thinking)
    }
}

#[async_trait]
impl AiProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, config.model);
        let request = Self::build_request(messages, config);

        tracing::debug!(
            "Gemini request to model {}: {} messages",
            config.model,
            messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(format!(
                    "Gemini API error ({}): {}",
                    status, error_response.error.message
                )
                .into());
            }

            return Err(format!("Gemini API error: {} - {}", status, error_text).into());
        }

        let response_json: GenerateContentResponse = response.json().await?;

        let parts = response_json
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .ok_or("No content in Gemini response - the model may have been blocked by safety filters")?;

        let (content, thinking) = Self::extract_text(parts);
        if content.trim().is_empty() {
            return Err("Gemini returned an empty response".into());
        }

        tracing::debug!(
            "Gemini response received: {} chars content, {} chars thinking",
            content.len(),
            thinking.as_ref().map(|t| t.len()).unwrap_or(0)
        );

        Ok(AiProviderResponse { content, thinking })
    }
}

use super::models::{AiConfig, AiMessage, AiProviderResponse, ComposedEmail, EmailDraftRequest};
use crate::core::api_logs::{ApiLogBook, LogChannel};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Sends a chat completion request to the AI provider.
    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>>;
}

// Lets AiService hold a provider picked at startup from configuration.
#[async_trait]
impl AiProvider for Box<dyn AiProvider> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn chat_complete(
        &self,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        (**self).chat_complete(messages, config).await
    }
}

pub const EMAIL_SYSTEM_PROMPT: &str = "You write short, clear, friendly workplace emails. \
Expand keywords or bullet points into natural prose. Never use placeholders such as \
[Your Name] or [Company]. Only use the details provided. Reply with a JSON object with \
the keys \"subject\" and \"body\" and nothing else.";

pub struct AiService<P: AiProvider> {
    provider: Option<P>,
    system_prompt: String,
    config: AiConfig,
    log_book: Arc<ApiLogBook>,
}

impl<P: AiProvider> AiService<P> {
    /// `provider` is `None` when no AI backend is configured; composition then
    /// falls back to a plain template.
    pub fn new(
        provider: Option<P>,
        system_prompt: String,
        config: AiConfig,
        log_book: Arc<ApiLogBook>,
    ) -> Self {
        Self {
            provider,
            system_prompt,
            config,
            log_book,
        }
    }

    pub fn provider_name(&self) -> Option<&'static str> {
        self.provider.as_ref().map(|p| p.name())
    }

    pub async fn chat(
        &self,
        context_messages: &[AiMessage],
    ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
        let provider = self
            .provider
            .as_ref()
            .ok_or("No AI provider configured")?;

        let mut messages = Vec::with_capacity(context_messages.len() + 1);
        messages.push(AiMessage {
            role: "system".to_string(),
            content: self.system_prompt.clone(),
        });
        messages.extend(context_messages.iter().cloned());

        match provider.chat_complete(&messages, &self.config).await {
            Ok(response) => {
                self.log_book.record(
                    LogChannel::Ai,
                    format!("{} ({}): {} chars", provider.name(), self.config.model, response.content.len()),
                );
                Ok(response)
            }
            Err(e) => {
                self.log_book
                    .record(LogChannel::Ai, format!("{}: error: {}", provider.name(), e));
                Err(e)
            }
        }
    }

    /// Drafts a personalized email. Never fails: provider errors and
    /// unparseable replies fall back to a plain message built from the purpose.
    pub async fn compose_email(&self, request: &EmailDraftRequest) -> ComposedEmail {
        let fallback = || ComposedEmail {
            subject: request
                .subject_hint
                .clone()
                .unwrap_or_else(|| format!("Message for {}", request.recipient_name)),
            body: format!(
                "Hi {},\n\n{}\n\nBest regards,\n{}\n",
                request.recipient_name, request.purpose, request.sender_name
            ),
        };

        if self.provider.is_none() {
            return fallback();
        }

        let mut prompt = format!(
            "Write a personalized email to {} (email: {}) from {}. The purpose of the email is: {}.",
            request.recipient_name, request.recipient_email, request.sender_name, request.purpose
        );
        if let Some(subject) = &request.subject_hint {
            prompt.push_str(&format!(" Use the subject \"{}\".", subject));
        }

        match self.chat(&[AiMessage::user(prompt)]).await {
            Ok(response) => match parse_composed_email(&response.content) {
                Some(mut email) => {
                    if let Some(subject) = &request.subject_hint {
                        email.subject = subject.clone();
                    }
                    email
                }
                None => {
                    tracing::warn!("AI reply was not a JSON email, using it as the body");
                    ComposedEmail {
                        body: response.content.trim().to_string(),
                        ..fallback()
                    }
                }
            },
            Err(e) => {
                tracing::warn!("Email composition failed, using template: {}", e);
                fallback()
            }
        }
    }
}

/// Accepts a bare JSON object or one wrapped in a markdown code fence.
fn parse_composed_email(content: &str) -> Option<ComposedEmail> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    let email: ComposedEmail = serde_json::from_str(unfenced).ok()?;
    if email.body.trim().is_empty() {
        return None;
    }
    Some(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedProvider {
        reply: Result<String, String>,
    }

    #[async_trait]
    impl AiProvider for CannedProvider {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn chat_complete(
            &self,
            messages: &[AiMessage],
            _config: &AiConfig,
        ) -> Result<AiProviderResponse, Box<dyn Error + Send + Sync>> {
            assert_eq!(messages[0].role, "system");
            match &self.reply {
                Ok(content) => Ok(AiProviderResponse {
                    content: content.clone(),
                    thinking: None,
                }),
                Err(e) => Err(e.clone().into()),
            }
        }
    }

    fn config() -> AiConfig {
        AiConfig {
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: Some(1000),
        }
    }

    fn request() -> EmailDraftRequest {
        EmailDraftRequest {
            recipient_name: "Nidhi".to_string(),
            recipient_email: "nidhi@example.com".to_string(),
            sender_name: "Priyansh".to_string(),
            purpose: "the launch moved to Friday".to_string(),
            subject_hint: None,
        }
    }

    #[test]
    fn test_parse_fenced_json() {
        let parsed = parse_composed_email("```json\n{\"subject\": \"Hi\", \"body\": \"Hello there\"}\n```");
        assert_eq!(
            parsed,
            Some(ComposedEmail {
                subject: "Hi".to_string(),
                body: "Hello there".to_string()
            })
        );
        assert!(parse_composed_email("not json").is_none());
    }

    #[tokio::test]
    async fn test_compose_uses_model_reply() {
        let service = AiService::new(
            Some(CannedProvider {
                reply: Ok("{\"subject\": \"Launch update\", \"body\": \"Hi Nidhi, the launch is on Friday.\"}".to_string()),
            }),
            EMAIL_SYSTEM_PROMPT.to_string(),
            config(),
            Arc::new(ApiLogBook::new()),
        );

        let email = service.compose_email(&request()).await;
        assert_eq!(email.subject, "Launch update");
        assert!(email.body.contains("Friday"));
    }

    #[tokio::test]
    async fn test_compose_falls_back_on_error() {
        let log_book = Arc::new(ApiLogBook::new());
        let service = AiService::new(
            Some(CannedProvider {
                reply: Err("quota exceeded".to_string()),
            }),
            EMAIL_SYSTEM_PROMPT.to_string(),
            config(),
            log_book.clone(),
        );

        let email = service.compose_email(&request()).await;
        assert_eq!(email.subject, "Message for Nidhi");
        assert!(email.body.contains("the launch moved to Friday"));
        assert!(log_book.lines(LogChannel::Ai)[0].contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_compose_without_provider() {
        let service: AiService<Box<dyn AiProvider>> = AiService::new(
            None,
            EMAIL_SYSTEM_PROMPT.to_string(),
            config(),
            Arc::new(ApiLogBook::new()),
        );
        assert!(service.provider_name().is_none());
        let email = service.compose_email(&request()).await;
        assert!(email.body.starts_with("Hi Nidhi,"));
    }
}

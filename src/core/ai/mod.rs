pub mod ai_service;
pub mod models;

pub use ai_service::{AiProvider, AiService, EMAIL_SYSTEM_PROMPT};
pub use models::{AiConfig, AiMessage, AiProviderResponse, ComposedEmail, EmailDraftRequest};

use crate::core::email::{EmailError, EmailMessage, EmailSender};
use async_trait::async_trait;

/// Writes outgoing mail to the log instead of delivering it.
pub struct ConsoleSender;

#[async_trait]
impl EmailSender for ConsoleSender {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tracing::info!(
            to = %message.to.join(", "),
            subject = %message.subject,
            "Email (not delivered):\n{}",
            message.body
        );
        Ok(())
    }
}

use crate::core::email::{EmailError, EmailMessage, EmailSender};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde_json::json;

const SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

/// Sends through the Gmail API as the account that owns the access token.
pub struct GmailSender {
    client: Client,
    from: String,
}

impl GmailSender {
    pub fn new(access_token: &str, from: String) -> Result<Self, EmailError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", access_token))
                .map_err(|e| EmailError::Delivery(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| EmailError::Delivery(e.to_string()))?;

        Ok(Self { client, from })
    }

    /// RFC 2822 message, base64url-encoded as the `raw` field expects.
    fn encode_raw(&self, message: &EmailMessage) -> String {
        let mut mime = String::new();
        if !self.from.is_empty() {
            mime.push_str(&format!("From: {}\r\n", self.from));
        }
        mime.push_str(&format!("To: {}\r\n", message.to.join(", ")));
        mime.push_str(&format!("Subject: {}\r\n", message.subject));
        mime.push_str("MIME-Version: 1.0\r\n");
        mime.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n");
        mime.push_str(&message.body.replace('\n', "\r\n"));
        URL_SAFE_NO_PAD.encode(mime.as_bytes())
    }
}

#[async_trait]
impl EmailSender for GmailSender {
    fn name(&self) -> &'static str {
        "gmail"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let resp = self
            .client
            .post(SEND_URL)
            .json(&json!({ "raw": self.encode_raw(message) }))
            .send()
            .await
            .map_err(|e| EmailError::Delivery(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(EmailError::Delivery(format!("Gmail API error: {} - {}", status, text)));
        }
        Ok(())
    }
}

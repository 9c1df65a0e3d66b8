use crate::core::email::{EmailError, EmailMessage, EmailSender};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Saves each outgoing email as a JSON file in an outbox directory.
pub struct FileOutboxSender {
    dir: PathBuf,
    from: String,
    counter: AtomicU64,
}

#[derive(Serialize)]
struct StoredEmail<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
    sent_at: DateTime<Utc>,
}

impl FileOutboxSender {
    pub fn new(dir: impl Into<PathBuf>, from: String) -> Self {
        Self {
            dir: dir.into(),
            from,
            counter: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl EmailSender for FileOutboxSender {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let sent_at = Utc::now();
        let seq = self.counter.fetch_add(1, Ordering::Relaxed);
        let path = self.dir.join(format!(
            "email_{}_{:04}.json",
            sent_at.format("%Y%m%d_%H%M%S"),
            seq
        ));

        let stored = StoredEmail {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            body: &message.body,
            sent_at,
        };
        tokio::fs::write(&path, serde_json::to_vec_pretty(&stored)?).await?;
        tracing::debug!(path = %path.display(), "Stored email in outbox");
        Ok(())
    }
}

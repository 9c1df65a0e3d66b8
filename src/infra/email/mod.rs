pub mod console_sender;
pub mod file_sender;
pub mod gmail_sender;

pub use console_sender::ConsoleSender;
pub use file_sender::FileOutboxSender;
pub use gmail_sender::GmailSender;

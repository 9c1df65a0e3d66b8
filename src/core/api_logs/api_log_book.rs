// In-memory log of outbound API activity, one bounded ring per service.
// The HTTP layer serves these through `GET /get_logs?type=<tag>`.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::VecDeque;

/// Maximum number of lines kept per channel.
pub const MAX_LINES_PER_CHANNEL: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogChannel {
    Ai,
    Calendar,
    Email,
    Restaurant,
    Location,
}

impl LogChannel {
    /// Parses a `/get_logs` tag. Unknown tags fall back to the AI channel.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "calendar" => LogChannel::Calendar,
            "email" => LogChannel::Email,
            "restaurant" | "restaurants" => LogChannel::Restaurant,
            "location" => LogChannel::Location,
            _ => LogChannel::Ai,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            LogChannel::Ai => "gemini",
            LogChannel::Calendar => "calendar",
            LogChannel::Email => "email",
            LogChannel::Restaurant => "restaurant",
            LogChannel::Location => "location",
        }
    }
}

pub struct ApiLogBook {
    channels: DashMap<LogChannel, VecDeque<String>>,
}

impl ApiLogBook {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    pub fn record(&self, channel: LogChannel, line: impl AsRef<str>) {
        let stamped = format!(
            "{} - {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            line.as_ref()
        );
        let mut lines = self.channels.entry(channel).or_default();
        if lines.len() >= MAX_LINES_PER_CHANNEL {
            lines.pop_front();
        }
        lines.push_back(stamped);
    }

    /// Returns the retained lines for a channel, oldest first.
    pub fn lines(&self, channel: LogChannel) -> Vec<String> {
        self.channels
            .get(&channel)
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for ApiLogBook {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tag_falls_back_to_ai() {
        assert_eq!(LogChannel::from_tag("gemini"), LogChannel::Ai);
        assert_eq!(LogChannel::from_tag("nonsense"), LogChannel::Ai);
        assert_eq!(LogChannel::from_tag("Calendar"), LogChannel::Calendar);
    }

    #[test]
    fn test_channel_is_bounded() {
        let book = ApiLogBook::new();
        for i in 0..(MAX_LINES_PER_CHANNEL + 5) {
            book.record(LogChannel::Email, format!("line {}", i));
        }

        let lines = book.lines(LogChannel::Email);
        assert_eq!(lines.len(), MAX_LINES_PER_CHANNEL);
        assert!(lines[0].ends_with("line 5"));
        assert!(book.lines(LogChannel::Calendar).is_empty());
    }
}

use crate::core::api_logs::{ApiLogBook, LogChannel};
use crate::core::contacts::TeamMember;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

#[derive(Debug, Clone)]
pub struct MeetingInvite {
    pub title: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub duration_minutes: u32,
    pub location: Option<String>,
    pub organizer: String,
    pub attendees: Vec<TeamMember>,
}

#[derive(Debug, Clone)]
pub struct DinnerInvite {
    pub restaurant: String,
    pub address: String,
    pub cuisine: Option<String>,
    pub rating: Option<f32>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub booking_reference: String,
    pub organizer: String,
    pub attendees: Vec<TeamMember>,
}

fn greeting(attendees: &[TeamMember]) -> String {
    match attendees.len() {
        0 => "team".to_string(),
        1 => attendees[0].first_name().to_string(),
        n => {
            let names: Vec<&str> = attendees.iter().map(|a| a.first_name()).collect();
            format!("{} and {}", names[..n - 1].join(", "), names[n - 1])
        }
    }
}

pub fn render_meeting_invite(invite: &MeetingInvite) -> EmailMessage {
    let date = invite.date.format("%A, %d %B %Y").to_string();
    let time = invite.start.format("%H:%M").to_string();
    let location = invite.location.as_deref().unwrap_or("To be shared");

    EmailMessage {
        to: invite.attendees.iter().map(|a| a.email.clone()).collect(),
        subject: format!("Meeting: {} - {} at {}", invite.title, date, time),
        body: format!(
            "Hi {attendees},\n\n\
             I've scheduled a meeting for {date} at {time}.\n\n\
             Meeting Details:\n\
             - Title: {title}\n\
             - Date: {date}\n\
             - Time: {time}\n\
             - Duration: {duration} minutes\n\
             - Location: {location}\n\n\
             Please let me know if you need to reschedule.\n\n\
             Best regards,\n{organizer}\n",
            attendees = greeting(&invite.attendees),
            date = date,
            time = time,
            title = invite.title,
            duration = invite.duration_minutes,
            location = location,
            organizer = invite.organizer,
        ),
    }
}

pub fn render_dinner_invite(invite: &DinnerInvite) -> EmailMessage {
    let date = invite
        .date
        .map(|d| d.format("%A, %d %B %Y").to_string())
        .unwrap_or_else(|| "a date to be confirmed".to_string());
    let time = invite
        .time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "a time to be confirmed".to_string());
    let rating = invite
        .rating
        .map(|r| format!("{:.1}/5", r))
        .unwrap_or_else(|| "Not rated".to_string());

    EmailMessage {
        to: invite.attendees.iter().map(|a| a.email.clone()).collect(),
        subject: format!("Team Dinner: {} on {}", invite.restaurant, date),
        body: format!(
            "Hi {attendees},\n\n\
             I've organized a team dinner for {date} at {time}.\n\n\
             Restaurant Details:\n\
             - Name: {restaurant}\n\
             - Address: {address}\n\
             - Cuisine: {cuisine}\n\
             - Rating: {rating}\n\
             - Booking reference: {reference}\n\n\
             Please confirm your attendance.\n\n\
             Best regards,\n{organizer}\n",
            attendees = greeting(&invite.attendees),
            date = date,
            time = time,
            restaurant = invite.restaurant,
            address = invite.address,
            cuisine = invite.cuisine.as_deref().unwrap_or("Various"),
            rating = rating,
            reference = invite.booking_reference,
            organizer = invite.organizer,
        ),
    }
}

pub struct EmailService {
    sender: Box<dyn EmailSender>,
    log_book: Arc<ApiLogBook>,
}

impl EmailService {
    pub fn new(sender: Box<dyn EmailSender>, log_book: Arc<ApiLogBook>) -> Self {
        Self { sender, log_book }
    }

    pub fn sender_name(&self) -> &'static str {
        self.sender.name()
    }

    pub async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if message.to.is_empty() {
            return Err(EmailError::Delivery("no recipients".to_string()));
        }

        match self.sender.send(message).await {
            Ok(()) => {
                tracing::info!(
                    sender = self.sender.name(),
                    recipients = message.to.len(),
                    subject = %message.subject,
                    "Email sent"
                );
                self.log_book.record(
                    LogChannel::Email,
                    format!("{}: sent '{}' to {}", self.sender.name(), message.subject, message.to.join(", ")),
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Email '{}' failed: {}", message.subject, e);
                self.log_book.record(
                    LogChannel::Email,
                    format!("{}: failed '{}': {}", self.sender.name(), message.subject, e),
                );
                Err(e)
            }
        }
    }

    /// Sends nothing when the invite has no attendees.
    pub async fn send_meeting_invite(&self, invite: &MeetingInvite) -> Result<usize, EmailError> {
        if invite.attendees.is_empty() {
            return Ok(0);
        }
        let message = render_meeting_invite(invite);
        self.send(&message).await?;
        Ok(message.to.len())
    }

    pub async fn send_dinner_invite(&self, invite: &DinnerInvite) -> Result<usize, EmailError> {
        if invite.attendees.is_empty() {
            return Ok(0);
        }
        let message = render_dinner_invite(invite);
        self.send(&message).await?;
        Ok(message.to.len())
    }
}

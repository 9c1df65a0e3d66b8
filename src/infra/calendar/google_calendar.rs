use crate::core::calendar::{BusyInterval, CalendarBackend, CalendarError, CalendarEvent};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3";

/// Google Calendar v3 REST client authenticated with an OAuth access token.
pub struct GoogleCalendarClient {
    client: Client,
    calendar_id: String,
    timezone: Tz,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<ApiPeriod>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiPeriod {
    start: String,
    end: String,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

#[derive(Debug, Deserialize)]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    location: Option<String>,
    description: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    organizer: Option<ApiPerson>,
    #[serde(default)]
    attendees: Vec<ApiPerson>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPerson {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

impl GoogleCalendarClient {
    pub fn new(access_token: &str, calendar_id: String, timezone: Tz) -> Result<Self, CalendarError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", access_token))
                .map_err(|e| CalendarError::Api(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(|e| CalendarError::Api(e.to_string()))?;

        Ok(Self {
            client,
            calendar_id,
            timezone,
        })
    }

    fn to_rfc3339(&self, local: NaiveDateTime) -> Result<String, CalendarError> {
        self.timezone
            .from_local_datetime(&local)
            .earliest()
            .map(|dt| dt.to_rfc3339())
            .ok_or_else(|| CalendarError::Api(format!("{} does not exist in {}", local, self.timezone)))
    }

    fn to_local(&self, value: &str) -> Option<NaiveDateTime> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&self.timezone).naive_local())
    }

    fn day_window(&self, date: NaiveDate) -> Result<(String, String), CalendarError> {
        let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        Ok((self.to_rfc3339(start)?, self.to_rfc3339(start + Duration::days(1))?))
    }

    fn map_event(&self, event: ApiEvent) -> Option<CalendarEvent> {
        // All-day events carry `date` instead of `dateTime` and are skipped.
        let start = self.to_local(event.start?.date_time.as_deref()?)?;
        let end = self.to_local(event.end?.date_time.as_deref()?)?;
        Some(CalendarEvent {
            id: event.id,
            title: event.summary.unwrap_or_else(|| "(no title)".to_string()),
            start,
            end,
            location: event.location,
            description: event.description,
            organizer: event.organizer.and_then(|o| o.email).unwrap_or_default(),
            attendees: event.attendees.into_iter().filter_map(|a| a.email).collect(),
        })
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        Err(CalendarError::Api(format!("Google Calendar returned {}: {}", status, text)))
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendarClient {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn busy_intervals(
        &self,
        date: NaiveDate,
        attendees: &[String],
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        if attendees.is_empty() {
            return Ok(Vec::new());
        }
        let (time_min, time_max) = self.day_window(date)?;
        let body = json!({
            "timeMin": time_min,
            "timeMax": time_max,
            "timeZone": self.timezone.name(),
            "items": attendees.iter().map(|a| json!({ "id": a })).collect::<Vec<_>>(),
        });

        let resp = self
            .client
            .post(format!("{}/freeBusy", CALENDAR_API))
            .json(&body)
            .send()
            .await
            .map_err(|e| CalendarError::Api(e.to_string()))?;
        let parsed: FreeBusyResponse = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::Api(e.to_string()))?;

        let mut busy = Vec::new();
        for attendee in attendees {
            let Some(calendar) = parsed.calendars.get(attendee) else {
                continue;
            };
            if !calendar.errors.is_empty() {
                // Calendars we cannot read are treated as free.
                tracing::warn!(attendee = %attendee, "No free/busy access: {:?}", calendar.errors);
            }
            for period in &calendar.busy {
                if let (Some(start), Some(end)) = (self.to_local(&period.start), self.to_local(&period.end)) {
                    busy.push(BusyInterval {
                        attendee: attendee.clone(),
                        start,
                        end,
                    });
                }
            }
        }
        Ok(busy)
    }

    async fn events_for(
        &self,
        date: NaiveDate,
        attendee: &str,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let (time_min, time_max) = self.day_window(date)?;
        let resp = self
            .client
            .get(format!("{}/calendars/{}/events", CALENDAR_API, self.calendar_id))
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("q", attendee),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::Api(e.to_string()))?;
        let list: EventList = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::Api(e.to_string()))?;

        Ok(list
            .items
            .into_iter()
            .filter_map(|e| self.map_event(e))
            .filter(|e| {
                e.organizer.eq_ignore_ascii_case(attendee)
                    || e.attendees.iter().any(|a| a.eq_ignore_ascii_case(attendee))
            })
            .collect())
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, CalendarError> {
        let zone = Some(self.timezone.name().to_string());
        let body = json!({
            "summary": event.title,
            "location": event.location,
            "description": event.description,
            "start": ApiEventTime { date_time: Some(self.to_rfc3339(event.start)?), time_zone: zone.clone() },
            "end": ApiEventTime { date_time: Some(self.to_rfc3339(event.end)?), time_zone: zone },
            "attendees": event.attendees.iter().map(|a| json!({ "email": a })).collect::<Vec<_>>(),
        });

        let resp = self
            .client
            .post(format!("{}/calendars/{}/events", CALENDAR_API, self.calendar_id))
            .query(&[("sendUpdates", "none")])
            .json(&body)
            .send()
            .await
            .map_err(|e| CalendarError::Api(e.to_string()))?;
        let created: CreatedEvent = Self::check(resp)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::Api(e.to_string()))?;
        Ok(created.id)
    }
}

use crate::core::calendar::{BusyInterval, CalendarBackend, CalendarError, CalendarEvent};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

/// Calendar kept in a local SQLite file. Used when no hosted calendar is configured.
pub struct SqliteCalendar {
    pool: Pool<Sqlite>,
}

impl SqliteCalendar {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                location TEXT,
                description TEXT,
                organizer TEXT NOT NULL,
                attendees TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // One row per participant, organizer included, for free/busy lookups.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_participants (
                event_id TEXT NOT NULL,
                email TEXT NOT NULL,
                PRIMARY KEY (event_id, email)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_event_participants_email ON event_participants (email)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = date.and_hms_opt(0, 0, 0).unwrap_or_default();
        (start, start + Duration::days(1))
    }

    fn new_event_id() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        format!("evt_{}", suffix.to_lowercase())
    }
}

#[async_trait]
impl CalendarBackend for SqliteCalendar {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn busy_intervals(
        &self,
        date: NaiveDate,
        attendees: &[String],
    ) -> Result<Vec<BusyInterval>, CalendarError> {
        let (day_start, day_end) = Self::day_bounds(date);
        let mut busy = Vec::new();

        for attendee in attendees {
            let rows = sqlx::query(
                r#"
                SELECT e.start_time, e.end_time FROM events e
                JOIN event_participants p ON p.event_id = e.id
                WHERE p.email = ? AND e.start_time < ? AND e.end_time > ?
                "#,
            )
            .bind(attendee.to_lowercase())
            .bind(day_end)
            .bind(day_start)
            .fetch_all(&self.pool)
            .await?;

            for row in rows {
                busy.push(BusyInterval {
                    attendee: attendee.clone(),
                    start: row.try_get("start_time")?,
                    end: row.try_get("end_time")?,
                });
            }
        }

        Ok(busy)
    }

    async fn events_for(
        &self,
        date: NaiveDate,
        attendee: &str,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        let (day_start, day_end) = Self::day_bounds(date);
        let rows = sqlx::query(
            r#"
            SELECT e.* FROM events e
            JOIN event_participants p ON p.event_id = e.id
            WHERE p.email = ? AND e.start_time < ? AND e.end_time > ?
            ORDER BY e.start_time
            "#,
        )
        .bind(attendee.to_lowercase())
        .bind(day_end)
        .bind(day_start)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let attendees: String = row.try_get("attendees")?;
                Ok(CalendarEvent {
                    id: Some(row.try_get("id")?),
                    title: row.try_get("title")?,
                    start: row.try_get("start_time")?,
                    end: row.try_get("end_time")?,
                    location: row.try_get("location")?,
                    description: row.try_get("description")?,
                    organizer: row.try_get("organizer")?,
                    attendees: serde_json::from_str(&attendees)
                        .map_err(|e| CalendarError::Store(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn create_event(&self, event: &CalendarEvent) -> Result<String, CalendarError> {
        let id = event.id.clone().unwrap_or_else(Self::new_event_id);
        let attendees = serde_json::to_string(&event.attendees)
            .map_err(|e| CalendarError::Store(e.to_string()))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO events (id, title, start_time, end_time, location, description, organizer, attendees, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&event.title)
        .bind(event.start)
        .bind(event.end)
        .bind(&event.location)
        .bind(&event.description)
        .bind(&event.organizer)
        .bind(attendees)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let participants = std::iter::once(&event.organizer)
            .chain(event.attendees.iter())
            .filter(|email| !email.trim().is_empty());
        for email in participants {
            sqlx::query("INSERT OR IGNORE INTO event_participants (event_id, email) VALUES (?, ?)")
                .bind(&id)
                .bind(email.to_lowercase())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(title: &str, date: NaiveDate, start: u32, end: u32, attendees: &[&str]) -> CalendarEvent {
        CalendarEvent {
            id: None,
            title: title.to_string(),
            start: date.and_hms_opt(start, 0, 0).unwrap(),
            end: date.and_hms_opt(end, 0, 0).unwrap(),
            location: None,
            description: None,
            organizer: "assistant@example.com".to_string(),
            attendees: attendees.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_created_events_show_up_as_busy() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("calendar.db");
        let calendar = SqliteCalendar::new(db.to_str().unwrap()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 8, 10).unwrap();

        let id = calendar
            .create_event(&event("Sync", date, 10, 11, &["Nidhi@example.com"]))
            .await
            .unwrap();
        assert!(id.starts_with("evt_"));

        let busy = calendar
            .busy_intervals(
                date,
                &["nidhi@example.com".to_string(), "arjun@example.com".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(busy.len(), 1);
        assert_eq!(busy[0].attendee, "nidhi@example.com");
        assert_eq!(busy[0].start, date.and_hms_opt(10, 0, 0).unwrap());

        let next_day = date.succ_opt().unwrap();
        assert!(calendar
            .busy_intervals(next_day, &["nidhi@example.com".to_string()])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_events_for_round_trips_details() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("calendar.db");
        let calendar = SqliteCalendar::new(db.to_str().unwrap()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 8, 11).unwrap();

        calendar
            .create_event(&event("Late", date, 15, 16, &["priyansh@example.com"]))
            .await
            .unwrap();
        calendar
            .create_event(&event("Early", date, 9, 10, &["priyansh@example.com"]))
            .await
            .unwrap();

        let events = calendar.events_for(date, "priyansh@example.com").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].title, "Early");
        assert_eq!(events[1].attendees, vec!["priyansh@example.com"]);

        // The organizer is a participant too.
        let organizer_events = calendar.events_for(date, "assistant@example.com").await.unwrap();
        assert_eq!(organizer_events.len(), 2);
    }
}

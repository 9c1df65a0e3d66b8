use super::envelope::{NextAction, ResultEnvelope};
use super::errors::AssistantError;
use super::goal_parser::{GoalKind, GoalParser, ParsedGoal};
use crate::core::ai::{AiMessage, AiProvider, AiService, EmailDraftRequest};
use crate::core::calendar::{CalendarEvent, CalendarService, TimeSlot};
use crate::core::contacts::{TeamDirectory, TeamMember};
use crate::core::email::{DinnerInvite, EmailMessage, EmailService, MeetingInvite};
use crate::core::location::{Geocoder, LocationService};
use crate::core::restaurants::{ProviderQuery, RestaurantAggregator, SearchPreferences};
use crate::core::sessions::{
    ConversationEntry, DinnerPlan, MeetingPlan, PendingAction, PendingSelection, SelectionError,
    SelectionKind, SelectionOption, SessionBusy, SessionRegistry, SessionState,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How many options a selection presents.
pub const PRESENTED_OPTIONS: usize = 5;

const DEFAULT_MEETING_TITLE: &str = "Team Meeting";
const DINNER_DURATION_MINUTES: i64 = 120;

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub organizer_name: String,
    pub organizer_email: String,
    pub default_duration_minutes: u32,
    pub default_min_rating: Option<f32>,
    pub default_location: String,
    pub timezone: Tz,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantStatus {
    pub services: BTreeMap<String, String>,
    pub active_sessions: usize,
    pub team_members: usize,
}

impl From<AssistantError> for ResultEnvelope {
    fn from(e: AssistantError) -> Self {
        match e {
            AssistantError::MissingFields(fields) => {
                let message = AssistantError::MissingFields(fields.clone()).to_string();
                ResultEnvelope::missing_fields(message, fields)
            }
            other => ResultEnvelope::failure(other.to_string()),
        }
    }
}

/// Routes goals to the services that carry them out and runs the two-phase
/// select/confirm flow.
pub struct Assistant {
    parser: GoalParser,
    sessions: SessionRegistry,
    directory: Arc<TeamDirectory>,
    locations: LocationService<Box<dyn Geocoder>>,
    restaurants: RestaurantAggregator,
    calendar: CalendarService,
    email: EmailService,
    ai: AiService<Box<dyn AiProvider>>,
    settings: AssistantSettings,
}

impl Assistant {
    pub fn new(
        settings: AssistantSettings,
        directory: Arc<TeamDirectory>,
        locations: LocationService<Box<dyn Geocoder>>,
        restaurants: RestaurantAggregator,
        calendar: CalendarService,
        email: EmailService,
        ai: AiService<Box<dyn AiProvider>>,
    ) -> Self {
        Self {
            parser: GoalParser::new(),
            sessions: SessionRegistry::new(),
            directory,
            locations,
            restaurants,
            calendar,
            email,
            ai,
            settings,
        }
    }

    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.settings.timezone).date_naive()
    }

    // =========================================================================
    // Goal handling
    // =========================================================================

    /// Handles one goal for `user`. Every outcome is an envelope except a
    /// request that overlaps another one on the same session.
    pub async fn handle(&self, goal_text: &str, user: &str) -> Result<ResultEnvelope, SessionBusy> {
        let mut session = self.sessions.acquire(user)?;

        if let Some(discarded) = session.discard_selection() {
            tracing::debug!(
                user = user,
                kind = %discarded.kind,
                "New goal discarded pending selection"
            );
        }

        let query = self.with_replayed_context(&session, goal_text);
        let envelope = if query.is_empty() {
            ResultEnvelope::failure("Please tell me what you'd like me to do.")
        } else {
            match self.dispatch(&query, user, &mut session).await {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::info!(user = user, "Goal not completed: {}", e);
                    e.into()
                }
            }
        };

        session.conversation.record(query, envelope.clone());
        Ok(envelope)
    }

    /// Text that only answers an earlier `input_missing_fields` prompt is
    /// appended to the goal that asked for it.
    fn with_replayed_context(&self, session: &SessionState, goal_text: &str) -> String {
        let trimmed = goal_text.trim();
        match session.conversation.latest() {
            Some(entry)
                if entry.response.next_action == Some(NextAction::InputMissingFields)
                    && !trimmed.is_empty()
                    && !self.parser.has_intent(trimmed) =>
            {
                format!("{}\n{}", entry.query, trimmed)
            }
            _ => trimmed.to_string(),
        }
    }

    async fn dispatch(
        &self,
        query: &str,
        user: &str,
        session: &mut SessionState,
    ) -> Result<ResultEnvelope, AssistantError> {
        let goal = self.parser.parse(query, self.today(), &self.directory);
        let kind = goal.kind.ok_or(AssistantError::UnknownGoal)?;

        if !goal.unknown_attendees.is_empty() {
            tracing::info!(names = ?goal.unknown_attendees, "Attendees not in the team directory");
        }
        let missing = goal.missing_fields();
        if !missing.is_empty() {
            return Err(AssistantError::MissingFields(missing));
        }

        tracing::info!(user = user, kind = ?kind, "Dispatching goal");
        match kind {
            GoalKind::Meeting => self.plan_meeting(query, goal, user, session).await,
            GoalKind::Dinner => self.plan_dinner(query, goal, session).await,
            GoalKind::Availability => self.show_schedules(goal).await,
            GoalKind::Email => self.send_emails(goal, user).await,
        }
    }

    async fn plan_meeting(
        &self,
        query: &str,
        goal: ParsedGoal,
        user: &str,
        session: &mut SessionState,
    ) -> Result<ResultEnvelope, AssistantError> {
        let date = goal
            .date
            .ok_or_else(|| AssistantError::MissingFields(vec!["date".to_string()]))?;
        let duration = goal
            .duration_minutes
            .unwrap_or(self.settings.default_duration_minutes);
        let plan = MeetingPlan {
            title: goal
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_MEETING_TITLE.to_string()),
            date,
            duration_minutes: duration,
            location: goal.location.clone(),
            attendees: goal.attendees.clone(),
        };

        let participants = self.participants(&plan.attendees, user);
        let mut slots = self
            .calendar
            .find_available_slots(date, &participants, duration)
            .await?;
        if let Some(preferred) = goal.time {
            sort_by_closeness(&mut slots, preferred);
        }
        if slots.is_empty() {
            return Err(AssistantError::NoAvailableSlots(date));
        }

        let options = time_slot_options(slots);
        let message = format!(
            "I found {} available time slots on {} for {}. Please pick one.",
            options.len(),
            date.format("%A, %d %B %Y"),
            names(&plan.attendees)
        );
        session.offer(PendingSelection::new(
            SelectionKind::TimeSlot,
            options.clone(),
            query,
            PendingAction::Meeting(plan),
        ));
        Ok(ResultEnvelope::selection(
            message,
            NextAction::SelectTimeSlot,
            options,
        ))
    }

    async fn plan_dinner(
        &self,
        query: &str,
        goal: ParsedGoal,
        session: &mut SessionState,
    ) -> Result<ResultEnvelope, AssistantError> {
        let area = goal
            .location
            .clone()
            .ok_or_else(|| AssistantError::MissingFields(vec!["location".to_string()]))?;
        let coords = self.locations.resolve(&area).await?;

        let terms: Vec<String> = goal.cuisine.iter().cloned().collect();
        let preferences = SearchPreferences {
            min_rating: goal.min_rating.or(self.settings.default_min_rating),
            max_price_level: goal.max_price_level,
            cuisine: goal.cuisine.clone(),
        };
        let outcome = self.restaurants.search(&coords, &terms, &preferences).await?;

        let options: Vec<SelectionOption> = outcome
            .restaurants
            .into_iter()
            .take(PRESENTED_OPTIONS)
            .enumerate()
            .map(|(i, r)| SelectionOption::restaurant(i, r))
            .collect();

        let message = format!(
            "Here are the top {} restaurants near {}. Pick one and I'll book it{}.",
            options.len(),
            area,
            if goal.attendees.is_empty() {
                String::new()
            } else {
                format!(" and invite {}", names(&goal.attendees))
            }
        );
        session.offer(PendingSelection::new(
            SelectionKind::Restaurant,
            options.clone(),
            query,
            PendingAction::Dinner(DinnerPlan {
                area,
                date: goal.date,
                time: goal.time,
                cuisine: goal.cuisine,
                attendees: goal.attendees,
            }),
        ));
        Ok(ResultEnvelope::selection(
            message,
            NextAction::SelectRestaurant,
            options,
        ))
    }

    async fn show_schedules(&self, goal: ParsedGoal) -> Result<ResultEnvelope, AssistantError> {
        let date = goal
            .date
            .ok_or_else(|| AssistantError::MissingFields(vec!["date".to_string()]))?;
        let emails: Vec<String> = goal.attendees.iter().map(|a| a.email.clone()).collect();
        let schedules = self.calendar.schedules(date, &emails).await?;
        let busy_count = schedules.iter().filter(|s| !s.events.is_empty()).count();

        Ok(ResultEnvelope::schedules(
            format!(
                "Schedules for {} on {}: {} of {} have events.",
                names(&goal.attendees),
                date.format("%A, %d %B %Y"),
                busy_count,
                schedules.len()
            ),
            schedules,
        ))
    }

    async fn send_emails(&self, goal: ParsedGoal, user: &str) -> Result<ResultEnvelope, AssistantError> {
        let purpose = goal
            .message
            .clone()
            .ok_or_else(|| AssistantError::MissingFields(vec!["message".to_string()]))?;
        let sender_name = self.organizer(user).name;

        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for recipient in &goal.attendees {
            let draft = self
                .ai
                .compose_email(&EmailDraftRequest {
                    recipient_name: recipient.first_name().to_string(),
                    recipient_email: recipient.email.clone(),
                    sender_name: sender_name.clone(),
                    purpose: purpose.clone(),
                    subject_hint: goal.subject.clone(),
                })
                .await;
            let message = EmailMessage {
                to: vec![recipient.email.clone()],
                subject: draft.subject,
                body: draft.body,
            };
            match self.email.send(&message).await {
                Ok(()) => delivered.push(recipient.email.clone()),
                Err(_) => failed.push(recipient.email.clone()),
            }
        }

        if failed.is_empty() {
            Ok(ResultEnvelope::complete(format!(
                "Personalized email(s) sent to {}.",
                delivered.join(", ")
            )))
        } else {
            Ok(ResultEnvelope::failure(format!(
                "Failed to send email(s) to: {}.",
                failed.join(", ")
            )))
        }
    }

    // =========================================================================
    // Confirmation
    // =========================================================================

    /// Confirms option `index` of the pending selection and runs its action.
    pub async fn confirm(
        &self,
        kind: SelectionKind,
        index: i64,
        user: &str,
    ) -> Result<ResultEnvelope, SessionBusy> {
        let mut session = self.sessions.acquire(user)?;

        let envelope = match session.take_selection(kind, index) {
            Err(e) => {
                tracing::info!(user = user, "Rejected confirmation: {}", e);
                AssistantError::from(e).into()
            }
            Ok((selection, option)) => {
                match self.execute(selection, option, user, &mut session).await {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!(user = user, "Confirmed action failed: {}", e);
                        e.into()
                    }
                }
            }
        };

        session
            .conversation
            .record(format!("confirm {} #{}", kind, index), envelope.clone());
        Ok(envelope)
    }

    async fn execute(
        &self,
        selection: PendingSelection,
        option: SelectionOption,
        user: &str,
        session: &mut SessionState,
    ) -> Result<ResultEnvelope, AssistantError> {
        match (selection.action, option) {
            (PendingAction::Meeting(plan), SelectionOption::TimeSlot { slot, .. }) => {
                self.book_meeting(plan, slot, &selection.origin_query, user, session)
                    .await
            }
            (PendingAction::Dinner(plan), SelectionOption::Restaurant { restaurant, .. }) => {
                let reference = booking_reference();
                tracing::info!(
                    restaurant = %restaurant.name,
                    reference = %reference,
                    "Restaurant booked"
                );
                let organizer = self.organizer(user);

                if let (Some(date), Some(time)) = (plan.date, plan.time) {
                    let start = date.and_time(time);
                    let event = CalendarEvent {
                        id: None,
                        title: format!("Team Dinner at {}", restaurant.name),
                        start,
                        end: start + Duration::minutes(DINNER_DURATION_MINUTES),
                        location: Some(restaurant.address.clone()),
                        description: Some(format!("Booking reference {}", reference)),
                        organizer: organizer.email.clone(),
                        attendees: plan.attendees.iter().map(|a| a.email.clone()).collect(),
                    };
                    if let Err(e) = self.calendar.create_event(&event).await {
                        tracing::warn!("Could not add dinner to the calendar: {}", e);
                    }
                }

                let invite = DinnerInvite {
                    restaurant: restaurant.name.clone(),
                    address: restaurant.address.clone(),
                    cuisine: plan
                        .cuisine
                        .clone()
                        .or_else(|| restaurant.cuisines.iter().next().cloned()),
                    rating: restaurant.rating,
                    date: plan.date,
                    time: plan.time,
                    booking_reference: reference.clone(),
                    organizer: organizer.name,
                    attendees: plan.attendees.clone(),
                };
                let invites = self.email.send_dinner_invite(&invite).await;

                let mut message = format!(
                    "Booked {} ({}). Booking reference: {}.",
                    restaurant.name, restaurant.address, reference
                );
                match invites {
                    Ok(0) => {}
                    Ok(_) => message.push_str(&format!(
                        " Invitations sent to {}.",
                        names(&plan.attendees)
                    )),
                    Err(e) => message.push_str(&format!(" Invitations could not be sent: {}.", e)),
                }
                Ok(ResultEnvelope::complete(message))
            }
            (_, option) => {
                let requested = match option {
                    SelectionOption::TimeSlot { .. } => SelectionKind::TimeSlot,
                    SelectionOption::Restaurant { .. } => SelectionKind::Restaurant,
                };
                Err(AssistantError::InvalidSelection(SelectionError::KindMismatch {
                    pending: selection.kind,
                    requested,
                }))
            }
        }
    }

    async fn book_meeting(
        &self,
        plan: MeetingPlan,
        slot: TimeSlot,
        origin_query: &str,
        user: &str,
        session: &mut SessionState,
    ) -> Result<ResultEnvelope, AssistantError> {
        let participants = self.participants(&plan.attendees, user);

        // Someone may have booked the slot since it was offered.
        if !self
            .calendar
            .is_slot_free(plan.date, &slot, &participants)
            .await?
        {
            let slots = self
                .calendar
                .find_available_slots(plan.date, &participants, plan.duration_minutes)
                .await?;
            if slots.is_empty() {
                return Err(AssistantError::NoAvailableSlots(plan.date));
            }
            let options = time_slot_options(slots);
            let message = format!(
                "The {} slot is no longer free. Here are the remaining options.",
                slot.label()
            );
            session.offer(PendingSelection::new(
                SelectionKind::TimeSlot,
                options.clone(),
                origin_query,
                PendingAction::Meeting(plan),
            ));
            return Ok(ResultEnvelope::selection(
                message,
                NextAction::SelectTimeSlot,
                options,
            ));
        }

        let organizer = self.organizer(user);
        let event = CalendarEvent {
            id: None,
            title: plan.title.clone(),
            start: plan.date.and_time(slot.start),
            end: plan.date.and_time(slot.end),
            location: plan.location.clone(),
            description: Some(format!("Requested as: {}", origin_query.lines().next().unwrap_or(""))),
            organizer: organizer.email.clone(),
            attendees: plan.attendees.iter().map(|a| a.email.clone()).collect(),
        };
        self.calendar.create_event(&event).await?;

        let invite = MeetingInvite {
            title: plan.title.clone(),
            date: plan.date,
            start: slot.start,
            duration_minutes: plan.duration_minutes,
            location: plan.location.clone(),
            organizer: organizer.name,
            attendees: plan.attendees.clone(),
        };

        let mut message = format!(
            "'{}' is scheduled for {} at {}.",
            plan.title,
            plan.date.format("%A, %d %B %Y"),
            slot.label()
        );
        match self.email.send_meeting_invite(&invite).await {
            Ok(0) => {}
            Ok(_) => message.push_str(&format!(" Invites sent to {}.", names(&plan.attendees))),
            Err(e) => message.push_str(&format!(" Invites could not be sent: {}.", e)),
        }
        Ok(ResultEnvelope::complete(message))
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub async fn history(&self, user: &str, limit: usize) -> Result<Vec<ConversationEntry>, SessionBusy> {
        let session = self.sessions.acquire(user)?;
        Ok(session.conversation.recent(limit))
    }

    pub fn status(&self) -> AssistantStatus {
        let mut services = BTreeMap::new();
        services.insert(
            "ai".to_string(),
            self.ai.provider_name().unwrap_or("template fallback").to_string(),
        );
        services.insert("calendar".to_string(), self.calendar.backend_name().to_string());
        services.insert("email".to_string(), self.email.sender_name().to_string());
        services.insert("location".to_string(), self.locations.geocoder_name().to_string());
        services.insert(
            "restaurants".to_string(),
            self.restaurants
                .providers()
                .map(|p| p.kind().label())
                .collect::<Vec<_>>()
                .join(", "),
        );

        AssistantStatus {
            services,
            active_sessions: self.sessions.active_sessions(),
            team_members: self.directory.len(),
        }
    }

    /// Probes every outbound integration once and reports a status line per service.
    pub async fn test_apis(&self) -> BTreeMap<String, String> {
        let mut results = BTreeMap::new();

        let ai_status = match self.ai.provider_name() {
            None => "Not configured".to_string(),
            Some(_) => match self.ai.chat(&[AiMessage::user("Reply with the single word OK.")]).await {
                Ok(_) => "Working".to_string(),
                Err(e) => format!("Error: {}", e),
            },
        };
        results.insert("AI Service".to_string(), ai_status);

        let organizer = self.settings.organizer_email.clone();
        let calendar_status = match self.calendar.schedules(self.today(), &[organizer]).await {
            Ok(_) => format!("Working ({})", self.calendar.backend_name()),
            Err(e) => format!("Error: {}", e),
        };
        results.insert("Calendar Service".to_string(), calendar_status);

        results.insert(
            "Email Service".to_string(),
            format!("Configured ({})", self.email.sender_name()),
        );

        let location = self.locations.resolve(&self.settings.default_location).await;
        results.insert(
            "Location Service".to_string(),
            match &location {
                Ok(found) => format!("Working ({})", found.display_name),
                Err(e) => format!("Error: {}", e),
            },
        );

        for provider in self.restaurants.providers() {
            let name = format!("Restaurant Service ({})", provider.kind().label());
            let status = match &location {
                Err(_) => "Error: no coordinates to search around".to_string(),
                Ok(coords) => {
                    let query = ProviderQuery {
                        latitude: coords.latitude,
                        longitude: coords.longitude,
                        radius_meters: self.restaurants.radius_meters(),
                        terms: Vec::new(),
                    };
                    match tokio::time::timeout(std::time::Duration::from_secs(10), provider.search(&query)).await {
                        Ok(Ok(records)) => format!("Working ({} results)", records.len()),
                        Ok(Err(e)) => format!("Error: {}", e),
                        Err(_) => "Error: timed out".to_string(),
                    }
                }
            };
            results.insert(name, status);
        }
        if self.restaurants.provider_count() == 0 {
            results.insert("Restaurant Service".to_string(), "Not configured".to_string());
        }

        results
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// The person a request is made on behalf of.
    fn organizer(&self, user: &str) -> TeamMember {
        if user.contains('@') {
            if let Some(member) = self.directory.lookup(user) {
                return member.clone();
            }
            return TeamMember {
                name: user.split('@').next().unwrap_or(user).to_string(),
                email: user.trim().to_string(),
                role: None,
                department: None,
            };
        }
        TeamMember {
            name: self.settings.organizer_name.clone(),
            email: self.settings.organizer_email.clone(),
            role: None,
            department: None,
        }
    }

    /// Named attendees plus the organizer, for free/busy checks.
    fn participants(&self, attendees: &[TeamMember], user: &str) -> Vec<String> {
        let mut emails: Vec<String> = attendees.iter().map(|a| a.email.clone()).collect();
        let organizer = self.organizer(user).email;
        if !organizer.is_empty() && !emails.iter().any(|e| e.eq_ignore_ascii_case(&organizer)) {
            emails.push(organizer);
        }
        emails
    }
}

fn time_slot_options(slots: Vec<TimeSlot>) -> Vec<SelectionOption> {
    slots
        .into_iter()
        .take(PRESENTED_OPTIONS)
        .enumerate()
        .map(|(i, slot)| SelectionOption::time_slot(i, slot))
        .collect()
}

fn sort_by_closeness(slots: &mut [TimeSlot], preferred: NaiveTime) {
    slots.sort_by_key(|slot| (slot.start - preferred).num_minutes().abs());
}

fn names(members: &[TeamMember]) -> String {
    let names: Vec<&str> = members.iter().map(|m| m.first_name()).collect();
    match names.len() {
        0 => "you".to_string(),
        1 => names[0].to_string(),
        n => format!("{} and {}", names[..n - 1].join(", "), names[n - 1]),
    }
}

fn booking_reference() -> String {
    let code: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("NB-{}", code.to_uppercase())
}

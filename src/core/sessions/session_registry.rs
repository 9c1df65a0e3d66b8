use super::conversation_log::ConversationLog;
use super::selection::{PendingSelection, SelectionError, SelectionKind, SelectionOption};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Maximum number of sessions kept in memory.
const MAX_SESSIONS: usize = 10_000;

/// Session key used when the client does not identify the user.
pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Debug, Error)]
#[error("Another request for {0} is still in progress")]
pub struct SessionBusy(pub String);

/// Everything the assistant remembers about one user between requests.
#[derive(Debug, Default)]
pub struct SessionState {
    pending: Option<PendingSelection>,
    pub conversation: ConversationLog,
}

impl SessionState {
    pub fn pending(&self) -> Option<&PendingSelection> {
        self.pending.as_ref()
    }

    /// Replaces any earlier selection.
    pub fn offer(&mut self, selection: PendingSelection) {
        self.pending = Some(selection);
    }

    pub fn discard_selection(&mut self) -> Option<PendingSelection> {
        self.pending.take()
    }

    /// Validates `index` against the pending selection and consumes it.
    /// On error the pending selection is left untouched.
    pub fn take_selection(
        &mut self,
        kind: SelectionKind,
        index: i64,
    ) -> Result<(PendingSelection, SelectionOption), SelectionError> {
        let pending = self
            .pending
            .as_ref()
            .ok_or(SelectionError::NothingPending(kind))?;

        if pending.kind != kind {
            return Err(SelectionError::KindMismatch {
                pending: pending.kind,
                requested: kind,
            });
        }

        let available = pending.options.len();
        let position = usize::try_from(index)
            .ok()
            .filter(|i| *i < available)
            .ok_or(SelectionError::OutOfRange { index, available })?;

        let selection = self
            .pending
            .take()
            .ok_or(SelectionError::NothingPending(kind))?;
        let option = selection.options[position].clone();
        Ok((selection, option))
    }
}

/// Per-user session state. A session serves one request at a time; a second
/// request arriving meanwhile is rejected rather than queued.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Mutex<SessionState>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn session_key(user: &str) -> String {
        let trimmed = user.trim();
        if trimmed.is_empty() {
            ANONYMOUS_USER.to_string()
        } else {
            trimmed.to_lowercase()
        }
    }

    pub fn acquire(&self, user: &str) -> Result<OwnedMutexGuard<SessionState>, SessionBusy> {
        let key = Self::session_key(user);

        if !self.sessions.contains_key(&key) && self.sessions.len() >= MAX_SESSIONS {
            self.evict_idle_session();
        }

        // Clone the Arc so the map shard is released before locking.
        let session = self
            .sessions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::default())))
            .clone();

        session.try_lock_owned().map_err(|_| SessionBusy(key))
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn evict_idle_session(&self) {
        let idle = self
            .sessions
            .iter()
            .find(|entry| entry.value().try_lock().is_ok())
            .map(|entry| entry.key().clone());
        if let Some(key) = idle {
            self.sessions.remove(&key);
            tracing::debug!(session = %key, "Evicted idle session");
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::TimeSlot;
    use crate::core::sessions::{DinnerPlan, PendingAction};
    use crate::core::restaurants::{ProviderKind, RestaurantRecord};
    use chrono::NaiveTime;

    fn restaurant_selection(count: usize) -> PendingSelection {
        let options = (0..count)
            .map(|i| {
                SelectionOption::restaurant(
                    i,
                    RestaurantRecord::new(format!("R{}", i), "Road", ProviderKind::GooglePlaces),
                )
            })
            .collect();
        PendingSelection::new(
            SelectionKind::Restaurant,
            options,
            "find restaurants in Kondapur",
            PendingAction::Dinner(DinnerPlan {
                area: "Kondapur".to_string(),
                date: None,
                time: None,
                cuisine: None,
                attendees: vec![],
            }),
        )
    }

    #[test]
    fn test_take_selection_consumes_once() {
        let mut state = SessionState::default();
        state.offer(restaurant_selection(3));

        let (_, option) = state.take_selection(SelectionKind::Restaurant, 2).unwrap();
        match option {
            SelectionOption::Restaurant { id, restaurant } => {
                assert_eq!(id, 2);
                assert_eq!(restaurant.name, "R2");
            }
            other => panic!("unexpected option {:?}", other),
        }

        assert_eq!(
            state.take_selection(SelectionKind::Restaurant, 2),
            Err(SelectionError::NothingPending(SelectionKind::Restaurant))
        );
    }

    #[test]
    fn test_invalid_index_keeps_selection() {
        let mut state = SessionState::default();
        state.offer(restaurant_selection(2));

        assert_eq!(
            state.take_selection(SelectionKind::Restaurant, 2),
            Err(SelectionError::OutOfRange { index: 2, available: 2 })
        );
        assert_eq!(
            state.take_selection(SelectionKind::Restaurant, -1),
            Err(SelectionError::OutOfRange { index: -1, available: 2 })
        );
        assert!(matches!(
            state.take_selection(SelectionKind::TimeSlot, 0),
            Err(SelectionError::KindMismatch { .. })
        ));
        assert!(state.pending().is_some());
    }

    #[test]
    fn test_time_slot_option_serialization() {
        let slot = TimeSlot {
            start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            duration_minutes: 60,
        };
        let json = serde_json::to_value(SelectionOption::time_slot(0, slot)).unwrap();
        assert_eq!(json["type"], "time_slot");
        assert_eq!(json["id"], 0);
        assert_eq!(json["time"], "10:00 - 11:00");
        assert_eq!(json["duration_minutes"], 60);
    }

    #[tokio::test]
    async fn test_overlapping_request_is_busy() {
        let registry = SessionRegistry::new();
        let guard = registry.acquire("Nidhi@Example.com").unwrap();

        assert!(registry.acquire("nidhi@example.com").is_err());
        assert!(registry.acquire("priyansh@example.com").is_ok());

        drop(guard);
        assert!(registry.acquire("nidhi@example.com").is_ok());
        assert_eq!(registry.active_sessions(), 2);
    }

    #[test]
    fn test_blank_user_maps_to_anonymous() {
        assert_eq!(SessionRegistry::session_key("  "), ANONYMOUS_USER);
    }
}

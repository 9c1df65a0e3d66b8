use super::error::ApiError;
use super::state::AppState;
use crate::core::api_logs::LogChannel;
use crate::core::assistant::ResultEnvelope;
use crate::core::sessions::{ConversationEntry, SelectionKind};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub index: i64,
    #[serde(default)]
    pub user_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub history: Vec<ConversationEntry>,
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn process_goal(
    State(state): State<AppState>,
    payload: Result<Json<GoalRequest>, JsonRejection>,
) -> Result<Json<ResultEnvelope>, ApiError> {
    let Json(request) = payload?;

    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Query is required".to_string()));
    }

    let user = request.user_email.unwrap_or_default();
    tracing::info!(user = %user, "Processing goal");

    let envelope = state.assistant.handle(&request.query, &user).await?;
    Ok(Json(envelope))
}

pub async fn confirm_selection(
    State(state): State<AppState>,
    payload: Result<Json<ConfirmRequest>, JsonRejection>,
) -> Result<Json<ResultEnvelope>, ApiError> {
    let Json(request) = payload?;

    let kind = parse_selection_kind(&request.kind).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "Unknown selection type '{}'. Use 'time-slot' or 'restaurant'.",
            request.kind
        ))
    })?;

    let user = request.user_email.unwrap_or_default();
    tracing::info!(user = %user, kind = %kind, index = request.index, "Confirming selection");

    let envelope = state.assistant.confirm(kind, request.index, &user).await?;
    Ok(Json(envelope))
}

pub async fn get_logs(State(state): State<AppState>, Query(params): Query<LogsQuery>) -> Json<Value> {
    let channel = LogChannel::from_tag(params.kind.as_deref().unwrap_or_default());

    Json(json!({
        "success": true,
        "type": channel.tag(),
        "logs": state.log_book.lines(channel),
    }))
}

pub async fn test_apis(State(state): State<AppState>) -> Json<Value> {
    let results: BTreeMap<String, String> = state.assistant.test_apis().await;

    Json(json!({
        "success": true,
        "results": results,
    }))
}

pub async fn get_status(State(state): State<AppState>) -> Json<Value> {
    let status = state.assistant.status();

    Json(json!({
        "status": "running",
        "uptime_seconds": state.start_time.elapsed().as_secs(),
        "services": status.services,
        "active_sessions": status.active_sessions,
        "team_members": status.team_members,
    }))
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user = params.user_email.unwrap_or_default();
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);

    let history = state.assistant.history(&user, limit).await?;
    Ok(Json(HistoryResponse {
        success: true,
        history,
    }))
}

fn parse_selection_kind(raw: &str) -> Option<SelectionKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "time-slot" | "time_slot" | "timeslot" => Some(SelectionKind::TimeSlot),
        "restaurant" => Some(SelectionKind::Restaurant),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ai::{AiConfig, AiService, EMAIL_SYSTEM_PROMPT};
    use crate::core::api_logs::ApiLogBook;
    use crate::core::assistant::{Assistant, AssistantSettings};
    use crate::core::calendar::{
        BusyInterval, CalendarBackend, CalendarError, CalendarEvent, CalendarService, SchedulingRules,
    };
    use crate::core::contacts::{TeamDirectory, TeamMember};
    use crate::core::email::EmailService;
    use crate::core::location::{Geocoder, LocationError, LocationService, ResolvedLocation};
    use crate::core::restaurants::{AggregatorSettings, RestaurantAggregator};
    use crate::infra::email::ConsoleSender;
    use crate::web::create_router;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct NowhereGeocoder;

    #[async_trait]
    impl Geocoder for NowhereGeocoder {
        fn name(&self) -> &'static str {
            "nowhere"
        }

        async fn geocode(&self, _place: &str) -> Result<Option<ResolvedLocation>, LocationError> {
            Ok(None)
        }
    }

    struct EmptyCalendar;

    #[async_trait]
    impl CalendarBackend for EmptyCalendar {
        fn name(&self) -> &'static str {
            "empty"
        }

        async fn busy_intervals(
            &self,
            _date: NaiveDate,
            _attendees: &[String],
        ) -> Result<Vec<BusyInterval>, CalendarError> {
            Ok(Vec::new())
        }

        async fn events_for(
            &self,
            _date: NaiveDate,
            _attendee: &str,
        ) -> Result<Vec<CalendarEvent>, CalendarError> {
            Ok(Vec::new())
        }

        async fn create_event(&self, _event: &CalendarEvent) -> Result<String, CalendarError> {
            Ok("evt-1".to_string())
        }
    }

    fn test_state() -> AppState {
        let log_book = Arc::new(ApiLogBook::new());
        let directory = TeamDirectory::new(vec![
            TeamMember {
                name: "Nidhi Sharma".to_string(),
                email: "nidhi@example.com".to_string(),
                role: None,
                department: None,
            },
            TeamMember {
                name: "Priyansh Rao".to_string(),
                email: "priyansh@example.com".to_string(),
                role: None,
                department: None,
            },
        ]);

        let assistant = Assistant::new(
            AssistantSettings {
                organizer_name: "Assistant".to_string(),
                organizer_email: "assistant@example.com".to_string(),
                default_duration_minutes: 60,
                default_min_rating: Some(3.5),
                default_location: "Hyderabad".to_string(),
                timezone: chrono_tz::Asia::Kolkata,
            },
            Arc::new(directory),
            LocationService::new(Box::new(NowhereGeocoder) as Box<dyn Geocoder>, log_book.clone()),
            RestaurantAggregator::new(Vec::new(), AggregatorSettings::default(), log_book.clone()),
            CalendarService::new(
                Box::new(EmptyCalendar),
                SchedulingRules::default(),
                log_book.clone(),
            ),
            EmailService::new(Box::new(ConsoleSender), log_book.clone()),
            AiService::new(
                None,
                EMAIL_SYSTEM_PROMPT.to_string(),
                AiConfig {
                    model: "none".to_string(),
                    temperature: 0.7,
                    max_tokens: Some(1000),
                },
                log_book.clone(),
            ),
        );

        AppState::new(assistant, log_book)
    }

    fn app() -> Router {
        create_router(test_state())
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "healthy");
        assert!(json["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let resp = app()
            .oneshot(post_json("/process_goal", r#"{"query": "   "}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].is_string());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let resp = app()
            .oneshot(post_json("/process_goal", "{not json"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["success"], false);
    }

    #[tokio::test]
    async fn test_goal_without_date_asks_for_it() {
        let resp = app()
            .oneshot(post_json(
                "/process_goal",
                r#"{"query": "Setup a meeting for Nidhi and Priyansh", "user_email": "nidhi@example.com"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["next_action"], "input_missing_fields");
        assert_eq!(json["missing_fields"][0], "date");
    }

    #[tokio::test]
    async fn test_meeting_then_history() {
        let state = test_state();

        let resp = create_router(state.clone())
            .oneshot(post_json(
                "/process_goal",
                r#"{"query": "Setup a meeting for Nidhi and Priyansh on 2025-08-10", "user_email": "nidhi@example.com"}"#,
            ))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["next_action"], "select_time_slot");
        assert_eq!(json["options"][0]["id"], 0);

        let resp = create_router(state)
            .oneshot(
                Request::get("/get_history?user_email=nidhi@example.com&limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["history"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_without_pending_selection() {
        let resp = app()
            .oneshot(post_json(
                "/confirm_selection",
                r#"{"type": "restaurant", "index": 0, "user_email": "nidhi@example.com"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["success"], false);
    }

    #[tokio::test]
    async fn test_confirm_with_unknown_type() {
        let resp = app()
            .oneshot(post_json("/confirm_selection", r#"{"type": "flight", "index": 0}"#))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_log_tag_falls_back_to_ai() {
        let resp = app()
            .oneshot(Request::get("/get_logs?type=weather").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(resp).await;
        assert_eq!(json["type"], "gemini");
        assert!(json["logs"].is_array());
    }

    #[tokio::test]
    async fn test_failed_geocode_shows_up_in_location_logs() {
        let state = test_state();

        let resp = create_router(state.clone())
            .oneshot(post_json(
                "/process_goal",
                r#"{"query": "find restaurants in Kondapur", "user_email": "nidhi@example.com"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["success"], false);

        let resp = create_router(state)
            .oneshot(Request::get("/get_logs?type=location").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["type"], "location");
        let logs = json["logs"].as_array().unwrap();
        assert_eq!(logs.len(), 1);
        assert!(logs[0].as_str().unwrap().contains("no matches"));
    }

    #[tokio::test]
    async fn test_status_reports_services() {
        let resp = app()
            .oneshot(Request::get("/get_status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(resp).await;
        assert_eq!(json["status"], "running");
        assert_eq!(json["services"]["calendar"], "empty");
        assert_eq!(json["team_members"], 2);
    }

    #[test]
    fn test_selection_kind_aliases() {
        assert_eq!(parse_selection_kind("time-slot"), Some(SelectionKind::TimeSlot));
        assert_eq!(parse_selection_kind("Time_Slot"), Some(SelectionKind::TimeSlot));
        assert_eq!(parse_selection_kind("restaurant"), Some(SelectionKind::Restaurant));
        assert_eq!(parse_selection_kind("flight"), None);
    }
}

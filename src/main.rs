// Entry point of the planning assistant HTTP service.
//
// **Architecture Overview:**
// - `core/` = Business logic (transport-agnostic)
// - `infra/` = Implementations of core traits (databases, APIs)
// - `web/` = HTTP adapter (routes, handlers)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Serve the HTTP API

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
mod settings;
#[path = "web/web_layer.rs"]
mod web;

use crate::core::ai::{AiConfig, AiProvider, AiService, EMAIL_SYSTEM_PROMPT};
use crate::core::api_logs::ApiLogBook;
use crate::core::assistant::{Assistant, AssistantSettings};
use crate::core::calendar::{CalendarBackend, CalendarService, SchedulingRules};
use crate::core::contacts::TeamDirectory;
use crate::core::email::{EmailSender, EmailService};
use crate::core::location::{Geocoder, LocationService};
use crate::core::restaurants::{AggregatorSettings, RestaurantAggregator, RestaurantProvider};
use crate::infra::ai::{GeminiClient, OpenRouterClient};
use crate::infra::calendar::{GoogleCalendarClient, SqliteCalendar};
use crate::infra::contacts::JsonTeamDirectory;
use crate::infra::email::{ConsoleSender, FileOutboxSender, GmailSender};
use crate::infra::location::{GeoapifyGeocoder, NominatimClient};
use crate::infra::restaurants::{GeoapifyPlaces, GooglePlaces, OpenTripMap};
use crate::settings::{AiBackend, CalendarBackendKind, EmailBackendKind, Settings};
use crate::web::AppState;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let settings = Settings::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let log_book = Arc::new(ApiLogBook::new());

    let contacts_store = JsonTeamDirectory::new(&settings.team_contacts_path);
    let directory = match TeamDirectory::load(&contacts_store).await {
        Ok(directory) => directory,
        Err(e) => {
            tracing::warn!(path = %settings.team_contacts_path, "Failed to load team directory: {}", e);
            TeamDirectory::new(Vec::new())
        }
    };
    tracing::info!(members = directory.len(), "Team directory loaded");

    let geocoder: Box<dyn Geocoder> = match &settings.geoapify_key {
        Some(key) => Box::new(GeoapifyGeocoder::new(key.clone())),
        None => Box::new(NominatimClient::new()?),
    };

    let restaurants = RestaurantAggregator::new(
        restaurant_providers(&settings),
        AggregatorSettings {
            radius_meters: settings.search_radius_meters,
            max_results: settings.max_restaurant_results,
            provider_timeout: Duration::from_secs(settings.provider_timeout_secs),
        },
        log_book.clone(),
    );
    if restaurants.provider_count() == 0 {
        tracing::warn!("No restaurant API keys configured; dinner planning will find nothing");
    }

    let calendar = CalendarService::new(
        calendar_backend(&settings).await?,
        SchedulingRules {
            buffer_minutes: settings.buffer_minutes,
            ..SchedulingRules::default()
        },
        log_book.clone(),
    );

    let email = EmailService::new(email_sender(&settings)?, log_book.clone());

    let ai = AiService::new(
        ai_provider(&settings),
        EMAIL_SYSTEM_PROMPT.to_string(),
        AiConfig {
            model: match settings.ai_backend {
                AiBackend::Gemini => settings.gemini_model.clone(),
                _ => settings.openrouter_model.clone(),
            },
            temperature: settings.ai_temperature,
            max_tokens: Some(settings.ai_max_tokens),
        },
        log_book.clone(),
    );

    let assistant = Assistant::new(
        AssistantSettings {
            organizer_name: settings.assistant_name.clone(),
            organizer_email: settings.assistant_email.clone(),
            default_duration_minutes: settings.meeting_duration_minutes,
            default_min_rating: Some(settings.min_restaurant_rating),
            default_location: settings.default_location.clone(),
            timezone: settings.timezone,
        },
        Arc::new(directory),
        LocationService::new(geocoder, log_book.clone()),
        restaurants,
        calendar,
        email,
        ai,
    );

    let status = assistant.status();
    tracing::info!(services = ?status.services, "Assistant ready");

    let state = AppState::new(assistant, log_book);
    web::start_server(&settings.bind_address(), state).await
}

/// Configured providers in merge-priority order.
fn restaurant_providers(settings: &Settings) -> Vec<Box<dyn RestaurantProvider>> {
    let mut providers: Vec<Box<dyn RestaurantProvider>> = Vec::new();
    if let Some(key) = &settings.google_places_key {
        providers.push(Box::new(GooglePlaces::new(key.clone())));
    }
    if let Some(key) = &settings.geoapify_key {
        providers.push(Box::new(GeoapifyPlaces::new(key.clone())));
    }
    if let Some(key) = &settings.opentripmap_key {
        providers.push(Box::new(OpenTripMap::new(key.clone())));
    }
    providers
}

async fn calendar_backend(settings: &Settings) -> anyhow::Result<Box<dyn CalendarBackend>> {
    match (settings.calendar_backend, &settings.google_calendar_token) {
        (CalendarBackendKind::Google, Some(token)) => Ok(Box::new(GoogleCalendarClient::new(
            token,
            settings.google_calendar_id.clone(),
            settings.timezone,
        )?)),
        _ => Ok(Box::new(SqliteCalendar::new(&settings.calendar_db_path).await?)),
    }
}

fn email_sender(settings: &Settings) -> anyhow::Result<Box<dyn EmailSender>> {
    let from = settings.assistant_email.clone();
    match (settings.email_backend, &settings.gmail_token) {
        (EmailBackendKind::Gmail, Some(token)) => Ok(Box::new(GmailSender::new(token, from)?)),
        (EmailBackendKind::Local, _) => Ok(Box::new(FileOutboxSender::new(&settings.email_dir, from))),
        _ => Ok(Box::new(ConsoleSender)),
    }
}

fn ai_provider(settings: &Settings) -> Option<Box<dyn AiProvider>> {
    match settings.ai_backend {
        AiBackend::Gemini => settings
            .gemini_api_key
            .clone()
            .map(|key| Box::new(GeminiClient::new(key)) as Box<dyn AiProvider>),
        AiBackend::OpenRouter => settings
            .openrouter_api_key
            .clone()
            .map(|key| Box::new(OpenRouterClient::new(key)) as Box<dyn AiProvider>),
        AiBackend::None => None,
    }
}

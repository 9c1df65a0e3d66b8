// Runtime configuration, read once at startup from the process environment.
// `.env` is loaded by `main` before `Settings::from_env` runs.

use chrono_tz::Tz;
use std::str::FromStr;

const DEFAULT_OPENROUTER_MODEL: &str = "deepseek/deepseek-chat-v3.1:free";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiBackend {
    Gemini,
    OpenRouter,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarBackendKind {
    Local,
    Google,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailBackendKind {
    Console,
    Local,
    Gmail,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub log_level: String,

    pub ai_backend: AiBackend,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: String,
    pub ai_max_tokens: u32,
    pub ai_temperature: f32,

    pub calendar_backend: CalendarBackendKind,
    pub calendar_db_path: String,
    pub google_calendar_token: Option<String>,
    pub google_calendar_id: String,

    pub email_backend: EmailBackendKind,
    pub email_dir: String,
    pub gmail_token: Option<String>,
    pub assistant_name: String,
    pub assistant_email: String,

    pub google_places_key: Option<String>,
    pub geoapify_key: Option<String>,
    pub opentripmap_key: Option<String>,
    pub search_radius_meters: u32,
    pub max_restaurant_results: usize,
    pub provider_timeout_secs: u64,
    pub min_restaurant_rating: f32,

    pub meeting_duration_minutes: u32,
    pub buffer_minutes: i64,
    pub timezone: Tz,
    pub default_location: String,
    pub team_contacts_path: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let gemini_api_key = get("GEMINI_API_KEY");
        let openrouter_api_key = get("OPENROUTER_API_KEY");
        let google_calendar_token = get("GOOGLE_CALENDAR_ACCESS_TOKEN");
        let gmail_token = get("GMAIL_ACCESS_TOKEN");

        let ai_backend = resolve_ai_backend(
            get("AI_SERVICE").as_deref(),
            gemini_api_key.is_some(),
            openrouter_api_key.is_some(),
        );
        let calendar_backend =
            resolve_calendar_backend(get("CALENDAR_SERVICE").as_deref(), google_calendar_token.is_some());
        let email_backend = resolve_email_backend(get("EMAIL_SERVICE").as_deref(), gmail_token.is_some());

        let timezone_name = text("DEFAULT_TIMEZONE", "Asia/Kolkata");
        let timezone = Tz::from_str(&timezone_name).unwrap_or_else(|_| {
            tracing::warn!(timezone = %timezone_name, "Unknown DEFAULT_TIMEZONE, using Asia/Kolkata");
            chrono_tz::Asia::Kolkata
        });

        Self {
            host: text("HOST", "0.0.0.0"),
            port: parse_or(get("PORT"), "PORT", 5000),
            log_level: get("RUST_LOG")
                .or_else(|| get("LOG_LEVEL").map(|v| v.to_lowercase()))
                .unwrap_or_else(|| "info".to_string()),

            ai_backend,
            gemini_api_key,
            gemini_model: text("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            openrouter_api_key,
            openrouter_model: text("OPENROUTER_MODEL", DEFAULT_OPENROUTER_MODEL),
            ai_max_tokens: parse_or(get("AI_MAX_TOKENS"), "AI_MAX_TOKENS", 1000),
            ai_temperature: parse_or(get("AI_TEMPERATURE"), "AI_TEMPERATURE", 0.7),

            calendar_backend,
            calendar_db_path: text("CALENDAR_DB_PATH", "data/calendar.db"),
            google_calendar_token,
            google_calendar_id: text("GOOGLE_CALENDAR_ID", "primary"),

            email_backend,
            email_dir: text("EMAIL_DIR", "data/emails"),
            gmail_token,
            assistant_name: text("ASSISTANT_NAME", "Nebula Assistant"),
            assistant_email: text("ASSISTANT_EMAIL", "assistant@nebula.local"),

            google_places_key: get("GOOGLE_PLACES_API_KEY"),
            geoapify_key: get("GEOAPIFY_API_KEY"),
            opentripmap_key: get("OPENTRIPMAP_API_KEY"),
            search_radius_meters: parse_or(get("DEFAULT_SEARCH_RADIUS"), "DEFAULT_SEARCH_RADIUS", 5000),
            max_restaurant_results: parse_or(get("MAX_RESTAURANT_RESULTS"), "MAX_RESTAURANT_RESULTS", 20),
            provider_timeout_secs: parse_or(get("PROVIDER_TIMEOUT_SECS"), "PROVIDER_TIMEOUT_SECS", 10),
            min_restaurant_rating: parse_or(get("MIN_RESTAURANT_RATING"), "MIN_RESTAURANT_RATING", 3.5),

            meeting_duration_minutes: parse_or(
                get("DEFAULT_MEETING_DURATION"),
                "DEFAULT_MEETING_DURATION",
                60,
            ),
            buffer_minutes: parse_or(get("BUFFER_TIME"), "BUFFER_TIME", 15),
            timezone,
            default_location: text("DEFAULT_LOCATION", "Hyderabad, India"),
            team_contacts_path: text("TEAM_CONTACTS_PATH", "data/users/team_contacts.json"),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> T {
    match raw {
        None => default,
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(key = key, value = %value, "Unparseable setting, using default");
            default
        }),
    }
}

fn resolve_ai_backend(requested: Option<&str>, has_gemini: bool, has_openrouter: bool) -> AiBackend {
    let requested = requested.map(str::to_ascii_lowercase);
    match requested.as_deref() {
        Some("gemini") if has_gemini => AiBackend::Gemini,
        Some("openrouter") if has_openrouter => AiBackend::OpenRouter,
        Some("none") => AiBackend::None,
        Some(other @ ("gemini" | "openrouter")) => {
            tracing::warn!(service = other, "AI service selected without an API key, using templates");
            AiBackend::None
        }
        Some(other) => {
            tracing::warn!(service = other, "Unknown AI_SERVICE");
            resolve_ai_backend(None, has_gemini, has_openrouter)
        }
        None if has_gemini => AiBackend::Gemini,
        None if has_openrouter => AiBackend::OpenRouter,
        None => AiBackend::None,
    }
}

fn resolve_calendar_backend(requested: Option<&str>, has_token: bool) -> CalendarBackendKind {
    match requested.map(str::to_ascii_lowercase).as_deref() {
        Some("google") if has_token => CalendarBackendKind::Google,
        Some("google") => {
            tracing::warn!("CALENDAR_SERVICE=google without GOOGLE_CALENDAR_ACCESS_TOKEN, using local calendar");
            CalendarBackendKind::Local
        }
        None | Some("local") | Some("sqlite") => CalendarBackendKind::Local,
        Some(other) => {
            tracing::warn!(service = other, "Unknown CALENDAR_SERVICE, using local calendar");
            CalendarBackendKind::Local
        }
    }
}

fn resolve_email_backend(requested: Option<&str>, has_token: bool) -> EmailBackendKind {
    match requested.map(str::to_ascii_lowercase).as_deref() {
        None | Some("console") => EmailBackendKind::Console,
        Some("local") => EmailBackendKind::Local,
        Some("gmail") if has_token => EmailBackendKind::Gmail,
        Some("gmail") => {
            tracing::warn!("EMAIL_SERVICE=gmail without GMAIL_ACCESS_TOKEN, printing emails to the console");
            EmailBackendKind::Console
        }
        Some("smtp") => {
            tracing::warn!("SMTP delivery is not supported, printing emails to the console");
            EmailBackendKind::Console
        }
        Some(other) => {
            tracing::warn!(service = other, "Unknown EMAIL_SERVICE, printing emails to the console");
            EmailBackendKind::Console
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]);
        assert_eq!(s.bind_address(), "0.0.0.0:5000");
        assert_eq!(s.ai_backend, AiBackend::None);
        assert_eq!(s.calendar_backend, CalendarBackendKind::Local);
        assert_eq!(s.email_backend, EmailBackendKind::Console);
        assert_eq!(s.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(s.search_radius_meters, 5000);
        assert_eq!(s.max_restaurant_results, 20);
        assert_eq!(s.min_restaurant_rating, 3.5);
        assert_eq!(s.default_location, "Hyderabad, India");
        assert_eq!(s.log_level, "info");
    }

    #[test]
    fn test_gemini_is_default_when_key_present() {
        let s = settings(&[("GEMINI_API_KEY", "g-key"), ("OPENROUTER_API_KEY", "o-key")]);
        assert_eq!(s.ai_backend, AiBackend::Gemini);
        assert_eq!(s.gemini_model, DEFAULT_GEMINI_MODEL);
    }

    #[test]
    fn test_hosted_backends_without_tokens_fall_back() {
        let s = settings(&[
            ("AI_SERVICE", "openrouter"),
            ("CALENDAR_SERVICE", "google"),
            ("EMAIL_SERVICE", "gmail"),
        ]);
        assert_eq!(s.ai_backend, AiBackend::None);
        assert_eq!(s.calendar_backend, CalendarBackendKind::Local);
        assert_eq!(s.email_backend, EmailBackendKind::Console);
    }

    #[test]
    fn test_smtp_falls_back_to_console() {
        let s = settings(&[("EMAIL_SERVICE", "SMTP")]);
        assert_eq!(s.email_backend, EmailBackendKind::Console);
    }

    #[test]
    fn test_bad_values_use_defaults() {
        let s = settings(&[
            ("PORT", "eighty"),
            ("DEFAULT_TIMEZONE", "Mars/Olympus"),
            ("AI_TEMPERATURE", " "),
        ]);
        assert_eq!(s.port, 5000);
        assert_eq!(s.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(s.ai_temperature, 0.7);
    }

    #[test]
    fn test_log_level_prefers_rust_log() {
        let s = settings(&[("LOG_LEVEL", "DEBUG")]);
        assert_eq!(s.log_level, "debug");

        let s = settings(&[("LOG_LEVEL", "DEBUG"), ("RUST_LOG", "nebula_assistant=trace")]);
        assert_eq!(s.log_level, "nebula_assistant=trace");
    }
}

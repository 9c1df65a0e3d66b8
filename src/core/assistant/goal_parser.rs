// Turns free-text goals into structured requests.
//
// A goal is free text plus optional `key: value` lines. Recognized keys
// override whatever the free text implies, so a client can answer an
// `input_missing_fields` prompt by appending lines like `date: 2025-08-10`.

use crate::core::contacts::{TeamDirectory, TeamMember};
use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalKind {
    Meeting,
    Dinner,
    Availability,
    Email,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedGoal {
    pub kind: Option<GoalKind>,
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub location: Option<String>,
    pub cuisine: Option<String>,
    pub attendees: Vec<TeamMember>,
    /// Names given explicitly that are not in the team directory.
    pub unknown_attendees: Vec<String>,
    pub min_rating: Option<f32>,
    pub max_price_level: Option<u8>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

impl ParsedGoal {
    /// Required fields the goal did not supply, by goal kind.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        let needs_attendees = self.attendees.is_empty() || !self.unknown_attendees.is_empty();
        match self.kind {
            Some(GoalKind::Meeting) | Some(GoalKind::Availability) => {
                if self.date.is_none() {
                    missing.push("date".to_string());
                }
                if needs_attendees {
                    missing.push("attendees".to_string());
                }
            }
            Some(GoalKind::Dinner) => {
                if self.location.is_none() {
                    missing.push("location".to_string());
                }
            }
            Some(GoalKind::Email) => {
                if needs_attendees {
                    missing.push("attendees".to_string());
                }
                if self.message.as_deref().map_or(true, |m| m.trim().is_empty()) {
                    missing.push("message".to_string());
                }
            }
            None => {}
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Date,
    Time,
    Location,
    Cuisine,
    Attendees,
    Duration,
    Title,
    Subject,
    Message,
    MinRating,
    MaxPrice,
}

fn field_for_key(key: &str) -> Option<Field> {
    let normalized = key.trim().to_lowercase().replace([' ', '-'], "_");
    let field = match normalized.as_str() {
        "date" | "day" => Field::Date,
        "time" => Field::Time,
        "location" | "area" | "place" | "city" => Field::Location,
        "cuisine" | "food" => Field::Cuisine,
        "attendees" | "employees" | "participants" | "recipients" | "to" => Field::Attendees,
        "duration" => Field::Duration,
        "title" | "topic" => Field::Title,
        "subject" => Field::Subject,
        "message" | "body" | "content" => Field::Message,
        "min_rating" | "rating" => Field::MinRating,
        "max_price" | "price" | "budget" => Field::MaxPrice,
        _ => return None,
    };
    Some(field)
}

const CUISINES: &[&str] = &[
    "south indian",
    "north indian",
    "hyderabadi",
    "indian",
    "chinese",
    "italian",
    "mexican",
    "japanese",
    "thai",
    "mediterranean",
    "american",
    "continental",
    "biryani",
];

/// Words that end a free-text location phrase.
const LOCATION_STOP_WORDS: &[&str] = &[
    "for", "on", "with", "tomorrow", "today", "tonight", "next", "this", "at", "in", "near", "by",
    "around", "under", "rated", "that", "which", "and", "from", "to", "between", "before", "after",
];

/// Phrases after "in"/"at" that describe time, not place.
const TIME_WORDS: &[&str] = &[
    "the morning",
    "the afternoon",
    "the evening",
    "the night",
    "morning",
    "afternoon",
    "evening",
    "night",
    "noon",
    "midnight",
    "an hour",
    "a week",
    "person",
    "me",
    "us",
    "here",
];

const MONTH_PATTERN: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("Invalid goal parser regex")
}

/// Compiled patterns, built once and shared.
pub struct GoalParser {
    intents: Vec<(GoalKind, Regex)>,
    field_line: Regex,
    iso_date: Regex,
    numeric_date: Regex,
    day_month_date: Regex,
    month_day_date: Regex,
    weekday: Regex,
    twelve_hour: Regex,
    twenty_four_hour: Regex,
    hours: Regex,
    minutes: Regex,
    location: Regex,
    title: Regex,
    message_after: Regex,
    min_rating: Regex,
    stars: Regex,
    cheap: Regex,
}

impl Default for GoalParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GoalParser {
    pub fn new() -> Self {
        // First match wins. An email verb at the very start beats everything
        // else; elsewhere in the text it is the weakest signal.
        let intent_patterns: Vec<(GoalKind, &str)> = vec![
            (GoalKind::Email, r"(?i)^\s*(?:please\s+)?(?:send\s+(?:an?\s+)?)?e-?mail\b"),
            (
                GoalKind::Availability,
                r"(?i)\b(?:check|show|see|view)\s+(?:the\s+)?(?:availability|calendars?|schedules?)\b",
            ),
            (GoalKind::Availability, r"(?i)\bwhen\s+(?:is|are)\b.*\b(?:free|available)\b"),
            (GoalKind::Availability, r"(?i)\b(?:is|are)\s+.+\s+(?:free|available)\s+(?:on|tomorrow|today|next)\b"),
            (GoalKind::Availability, r"(?i)\bavailability\b"),
            (GoalKind::Meeting, r"(?i)\bmeeting\b"),
            (
                GoalKind::Meeting,
                r"(?i)\b(?:schedule|set\s*up|setup|arrange|organi[sz]e|book|plan)\b.*\b(?:call|sync|meet|session|discussion|review)\b",
            ),
            (GoalKind::Meeting, r"(?i)\b(?:call\s+with|catch\s+up|1:1|one[- ]on[- ]one|stand-?up|let'?s\s+meet|can\s+we\s+meet)\b"),
            (
                GoalKind::Dinner,
                r"(?i)\b(?:dinner|lunch|brunch|restaurants?|eat|food|cuisine|biryani|book\s+a\s+table|reserve\s+a\s+table|team\s+meal)\b",
            ),
            (
                GoalKind::Email,
                r"(?i)\b(?:e-?mail|mail|write\s+to|notify|let\s+\w+\s+know|inform|announce|congratulate|greet)\b",
            ),
        ];

        Self {
            intents: intent_patterns
                .into_iter()
                .map(|(kind, pattern)| (kind, compile(pattern)))
                .collect(),
            field_line: compile(r"^\s*([A-Za-z][A-Za-z _-]{0,20}?)\s*:\s*(.+?)\s*$"),
            iso_date: compile(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"),
            numeric_date: compile(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b"),
            day_month_date: compile(&format!(
                r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+(?:of\s+)?{}\b,?(?:\s+(\d{{4}}))?",
                MONTH_PATTERN
            )),
            month_day_date: compile(&format!(
                r"(?i)\b{}\s+(\d{{1,2}})(?:st|nd|rd|th)?\b(?:,?\s+(\d{{4}}))?",
                MONTH_PATTERN
            )),
            weekday: compile(
                r"(?i)\b(?:(next|this|coming|on)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            ),
            twelve_hour: compile(r"(?i)\b(\d{1,2})(?::([0-5]\d))?\s*([ap])\.?m\b\.?"),
            twenty_four_hour: compile(r"\b([01]?\d|2[0-3]):([0-5]\d)\b"),
            hours: compile(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:hours?|hrs?)\b"),
            minutes: compile(r"(?i)\b(\d+)\s*(?:minutes?|mins?)\b"),
            location: compile(r"(?i)\b(?:in|near|around|at)\s+"),
            title: compile(
                r"(?i)\b(?:meeting|call|sync|session|discussion|review)\s+(?:about|regarding|to\s+discuss)\s+([^,;\n]+)",
            ),
            message_after: compile(r"(?i)\b(?:about|regarding|saying|that)\s+(.+)$"),
            min_rating: compile(r"(?i)\brat(?:ed|ing)\s*(?:above|over|at\s+least|of|>=?)?\s*(\d(?:\.\d)?)"),
            stars: compile(r"(?i)\b(\d(?:\.\d)?)\s*\+?\s*stars?\b"),
            cheap: compile(r"(?i)\b(?:cheap|budget|affordable|inexpensive|pocket[- ]friendly)\b"),
        }
    }

    /// Whether the non-field part of `text` names a goal at all.
    pub fn has_intent(&self, text: &str) -> bool {
        let (body, _) = self.split_fields(text);
        self.detect_kind(&body).is_some()
    }

    pub fn parse(&self, text: &str, today: NaiveDate, directory: &TeamDirectory) -> ParsedGoal {
        let (body, fields) = self.split_fields(text);
        let mut goal = ParsedGoal {
            kind: self.detect_kind(&body),
            ..ParsedGoal::default()
        };

        goal.date = self.parse_date(&body, today);
        goal.time = self.parse_time(&body);
        goal.duration_minutes = self.parse_duration(&body);
        goal.location = self.extract_location(&body);
        goal.cuisine = find_cuisine(&body);
        goal.title = self.extract_title(&body);
        goal.attendees = directory.find_mentions(&body);
        goal.min_rating = self.extract_min_rating(&body);
        if self.cheap.is_match(&body) {
            goal.max_price_level = Some(2);
        }
        if goal.kind == Some(GoalKind::Email) {
            goal.message = self.extract_message(&body, &goal.attendees);
        }

        for (field, value) in fields {
            self.apply_field(&mut goal, field, &value, today, directory);
        }

        goal
    }

    fn split_fields(&self, text: &str) -> (String, Vec<(Field, String)>) {
        let mut body = Vec::new();
        let mut fields = Vec::new();
        for line in text.lines() {
            let parsed = self.field_line.captures(line).and_then(|caps| {
                let field = field_for_key(&caps[1])?;
                Some((field, caps[2].to_string()))
            });
            match parsed {
                Some(field) => fields.push(field),
                None => body.push(line),
            }
        }
        (body.join("\n"), fields)
    }

    fn detect_kind(&self, body: &str) -> Option<GoalKind> {
        self.intents
            .iter()
            .find(|(_, pattern)| pattern.is_match(body))
            .map(|(kind, _)| *kind)
    }

    fn apply_field(
        &self,
        goal: &mut ParsedGoal,
        field: Field,
        value: &str,
        today: NaiveDate,
        directory: &TeamDirectory,
    ) {
        let value = value.trim();
        match field {
            // An explicit but unreadable date counts as no date.
            Field::Date => goal.date = self.parse_date(value, today),
            Field::Time => {
                if let Some(time) = self.parse_time(value) {
                    goal.time = Some(time);
                }
            }
            Field::Location => goal.location = Some(value.to_string()).filter(|v| !v.is_empty()),
            Field::Cuisine => goal.cuisine = Some(value.to_lowercase()).filter(|v| !v.is_empty()),
            Field::Attendees => {
                goal.attendees.clear();
                goal.unknown_attendees.clear();
                for name in split_names(value) {
                    match directory.lookup(&name) {
                        Some(member) => {
                            if !goal.attendees.iter().any(|m| m.email == member.email) {
                                goal.attendees.push(member.clone());
                            }
                        }
                        None => match directory.find_mentions(&name).into_iter().next() {
                            Some(member) => goal.attendees.push(member),
                            None => goal.unknown_attendees.push(name),
                        },
                    }
                }
            }
            Field::Duration => {
                if let Some(minutes) = self
                    .parse_duration(value)
                    .or_else(|| value.parse::<u32>().ok())
                {
                    goal.duration_minutes = Some(minutes);
                }
            }
            Field::Title => goal.title = Some(value.to_string()).filter(|v| !v.is_empty()),
            Field::Subject => goal.subject = Some(value.to_string()).filter(|v| !v.is_empty()),
            Field::Message => goal.message = Some(value.to_string()).filter(|v| !v.is_empty()),
            Field::MinRating => {
                if let Ok(rating) = value.parse::<f32>() {
                    goal.min_rating = Some(rating.clamp(0.0, 5.0));
                }
            }
            Field::MaxPrice => {
                if let Ok(level) = value.parse::<u8>() {
                    goal.max_price_level = Some(level.min(4));
                } else if self.cheap.is_match(value) {
                    goal.max_price_level = Some(2);
                }
            }
        }
    }

    pub fn parse_date(&self, text: &str, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(caps) = self.iso_date.captures(text) {
            return NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            );
        }

        if let Some(caps) = self.numeric_date.captures(text) {
            // Day first, then month, the way the team writes dates.
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let year: i32 = caps[3].parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, day)
                .or_else(|| NaiveDate::from_ymd_opt(year, day, month));
        }

        if let Some(caps) = self.day_month_date.captures(text) {
            let day: u32 = caps[1].parse().ok()?;
            let month = month_number(&caps[2])?;
            return date_with_optional_year(today, caps.get(3).map(|m| m.as_str()), month, day);
        }

        if let Some(caps) = self.month_day_date.captures(text) {
            let month = month_number(&caps[1])?;
            let day: u32 = caps[2].parse().ok()?;
            return date_with_optional_year(today, caps.get(3).map(|m| m.as_str()), month, day);
        }

        let lowered = text.to_lowercase();
        if lowered.contains("day after tomorrow") {
            return Some(today + Duration::days(2));
        }
        if contains_word(&lowered, "tomorrow") {
            return Some(today + Duration::days(1));
        }
        if contains_word(&lowered, "today") || contains_word(&lowered, "tonight") {
            return Some(today);
        }
        if lowered.contains("next week") {
            return Some(today + Duration::days(7));
        }

        if let Some(caps) = self.weekday.captures(text) {
            let target = weekday_from_name(&caps[2])?;
            let qualifier = caps.get(1).map(|m| m.as_str().to_lowercase());
            let current = today.weekday().num_days_from_monday() as i64;
            let wanted = target.num_days_from_monday() as i64;
            let mut ahead = (wanted - current).rem_euclid(7);
            if ahead == 0 && qualifier.as_deref() != Some("this") {
                ahead = 7;
            }
            return Some(today + Duration::days(ahead));
        }

        None
    }

    pub fn parse_time(&self, text: &str) -> Option<NaiveTime> {
        if let Some(caps) = self.twelve_hour.captures(text) {
            let hour: u32 = caps[1].parse().ok()?;
            let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
            if !(1..=12).contains(&hour) {
                return None;
            }
            let pm = caps[3].eq_ignore_ascii_case("p");
            let hour = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            return NaiveTime::from_hms_opt(hour, minute, 0);
        }

        if let Some(caps) = self.twenty_four_hour.captures(text) {
            return NaiveTime::from_hms_opt(caps[1].parse().ok()?, caps[2].parse().ok()?, 0);
        }

        let lowered = text.to_lowercase();
        if contains_word(&lowered, "noon") {
            return NaiveTime::from_hms_opt(12, 0, 0);
        }
        None
    }

    pub fn parse_duration(&self, text: &str) -> Option<u32> {
        let lowered = text.to_lowercase();
        let mut total: Option<f64> = None;

        if let Some(caps) = self.hours.captures(text) {
            let hours: f64 = caps[1].parse().ok()?;
            total = Some(hours * 60.0);
        } else if lowered.contains("half an hour") || lowered.contains("half hour") {
            total = Some(30.0);
        } else if lowered.contains("an hour") || lowered.contains("one hour") {
            total = Some(60.0);
        }

        if let Some(caps) = self.minutes.captures(text) {
            let minutes: f64 = caps[1].parse().ok()?;
            total = Some(total.unwrap_or(0.0) + minutes);
        }

        total
            .map(|minutes| minutes.round() as u32)
            .filter(|minutes| *minutes > 0)
    }

    fn extract_location(&self, body: &str) -> Option<String> {
        // Every introducer starts its own candidate, so "near me in Kondapur"
        // still reaches "Kondapur".
        for intro in self.location.find_iter(body) {
            let rest = &body[intro.end()..];
            let phrase_end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || " .'&-".contains(c)))
                .unwrap_or(rest.len());
            let phrase = rest[..phrase_end].trim();
            if !phrase.starts_with(|c: char| c.is_ascii_alphabetic()) {
                continue;
            }
            let mut words = Vec::new();
            for word in phrase.split_whitespace() {
                let bare = word.trim_end_matches(['.', '!', '?']).to_lowercase();
                if LOCATION_STOP_WORDS.contains(&bare.as_str()) || bare.chars().all(|c| c.is_ascii_digit()) {
                    break;
                }
                words.push(word);
                if word.ends_with(['.', '!', '?']) {
                    break;
                }
            }

            let candidate = words
                .join(" ")
                .trim_end_matches(['.', '!', '?', '\''])
                .trim()
                .to_string();
            let candidate = candidate
                .strip_prefix("the ")
                .map(str::to_string)
                .unwrap_or(candidate);
            let lowered = candidate.to_lowercase();

            if candidate.is_empty()
                || TIME_WORDS.contains(&lowered.as_str())
                || self.weekday.is_match(&candidate)
                || CUISINES.contains(&lowered.as_str())
            {
                continue;
            }
            return Some(candidate);
        }
        None
    }

    fn extract_title(&self, body: &str) -> Option<String> {
        let caps = self.title.captures(body)?;
        let mut words = Vec::new();
        for word in caps[1].split_whitespace() {
            let bare = word.to_lowercase();
            if ["with", "for", "on", "at", "tomorrow", "today", "next"].contains(&bare.as_str()) {
                break;
            }
            words.push(word);
        }
        let title = words.join(" ").trim_end_matches('.').trim().to_string();
        if title.is_empty()
            || self.weekday.is_match(&title)
            || self.iso_date.is_match(&title)
            || self.numeric_date.is_match(&title)
        {
            return None;
        }
        let mut chars = title.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().collect::<String>() + chars.as_str())
    }

    fn extract_message(&self, body: &str, attendees: &[TeamMember]) -> Option<String> {
        let first_line = body.lines().find(|l| !l.trim().is_empty())?;
        if let Some((_, after)) = first_line.split_once(':') {
            let message = after.trim();
            if !message.is_empty() {
                return Some(message.to_string());
            }
        }

        let caps = self.message_after.captures(body)?;
        let message = caps[1].trim();
        // "Email Nidhi about" with nothing after it, or only a recipient name.
        if message.is_empty()
            || attendees
                .iter()
                .any(|a| a.name.eq_ignore_ascii_case(message) || a.first_name().eq_ignore_ascii_case(message))
        {
            return None;
        }
        Some(message.to_string())
    }

    fn extract_min_rating(&self, body: &str) -> Option<f32> {
        let caps = self
            .min_rating
            .captures(body)
            .or_else(|| self.stars.captures(body))?;
        let rating: f32 = caps[1].parse().ok()?;
        Some(rating.clamp(0.0, 5.0))
    }
}

fn split_names(value: &str) -> Vec<String> {
    value
        .split([',', ';', '&'])
        .flat_map(|part| part.split(" and "))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

fn find_cuisine(body: &str) -> Option<String> {
    let lowered = body.to_lowercase();
    CUISINES
        .iter()
        .find(|cuisine| contains_word(&lowered, cuisine))
        .map(|cuisine| cuisine.to_string())
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + word.len()..].chars().next();
        before.map_or(true, |c| !c.is_alphanumeric()) && after.map_or(true, |c| !c.is_alphanumeric())
    })
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let lowered = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| lowered.starts_with(m))
        .map(|i| i as u32 + 1)
}

/// Without a year, picks this year's date or next year's if it already passed.
fn date_with_optional_year(
    today: NaiveDate,
    year: Option<&str>,
    month: u32,
    day: u32,
) -> Option<NaiveDate> {
    match year {
        Some(year) => NaiveDate::from_ymd_opt(year.parse().ok()?, month, day),
        None => {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
            if this_year < today {
                NaiveDate::from_ymd_opt(today.year() + 1, month, day)
            } else {
                Some(this_year)
            }
        }
    }
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    name.to_lowercase().parse::<Weekday>().ok()
}

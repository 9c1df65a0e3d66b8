use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a misspelled name to count as a match.
const FUZZY_THRESHOLD: f64 = 0.9;

/// Shorter words are never matched fuzzily.
const FUZZY_MIN_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

impl TeamMember {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

/// Source of team members, loaded once at startup.
#[async_trait]
pub trait TeamDirectoryStore: Send + Sync {
    async fn load_members(&self) -> Result<Vec<TeamMember>, DirectoryError>;
}

/// Maps people mentioned in free text to their email addresses.
pub struct TeamDirectory {
    members: Vec<TeamMember>,
    email_pattern: Regex,
    capitalized_word: Regex,
}

impl TeamDirectory {
    pub fn new(members: Vec<TeamMember>) -> Self {
        Self {
            members,
            email_pattern: Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
                .expect("Invalid email regex"),
            capitalized_word: Regex::new(r"\b[A-Z][A-Za-z]+\b").expect("Invalid name regex"),
        }
    }

    pub async fn load(store: &dyn TeamDirectoryStore) -> Result<Self, DirectoryError> {
        Ok(Self::new(store.load_members().await?))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Looks up by full name, first name, or email, case-insensitively.
    /// Falls back to the closest name when nothing matches exactly.
    pub fn lookup(&self, name_or_email: &str) -> Option<&TeamMember> {
        let needle = name_or_email.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.members
            .iter()
            .find(|m| m.name.to_lowercase() == needle || m.email.to_lowercase() == needle)
            .or_else(|| {
                self.members
                    .iter()
                    .find(|m| m.first_name().to_lowercase() == needle)
            })
            .or_else(|| self.closest(&needle))
    }

    /// The member whose first or full name is most similar to `word`.
    fn closest(&self, word: &str) -> Option<&TeamMember> {
        let word = word.to_lowercase();
        if word.chars().count() < FUZZY_MIN_LEN || word.contains('@') {
            return None;
        }
        self.members
            .iter()
            .map(|m| {
                let score = strsim::jaro_winkler(&word, &m.first_name().to_lowercase())
                    .max(strsim::jaro_winkler(&word, &m.name.to_lowercase()));
                (score, m)
            })
            .filter(|(score, _)| *score >= FUZZY_THRESHOLD)
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal))
            .map(|(_, m)| m)
    }

    /// Team members named in `text` (whole words, full or first name) plus any
    /// literal email addresses, in order of first appearance.
    pub fn find_mentions(&self, text: &str) -> Vec<TeamMember> {
        let lowered = text.to_lowercase();
        let mut found: Vec<(usize, TeamMember)> = Vec::new();

        for member in &self.members {
            let full = member.name.to_lowercase();
            let first = member.first_name().to_lowercase();
            let position = find_word(&lowered, &full).or_else(|| find_word(&lowered, &first));
            if let Some(pos) = position {
                found.push((pos, member.clone()));
            }
        }

        // Capitalized words that are close to a name, e.g. "Nidi" or "Priyanshu".
        for word in self.capitalized_word.find_iter(text) {
            let touches_address = text[..word.start()].ends_with(['@', '.'])
                || text[word.end()..].starts_with('@');
            if touches_address {
                continue;
            }
            if let Some(member) = self.closest(word.as_str()) {
                if !found.iter().any(|(_, f)| f.email == member.email) {
                    found.push((word.start(), member.clone()));
                }
            }
        }

        for m in self.email_pattern.find_iter(text) {
            let email = m.as_str().trim_end_matches('.');
            if found.iter().any(|(_, f)| f.email.eq_ignore_ascii_case(email)) {
                continue;
            }
            let member = self.lookup(email).cloned().unwrap_or_else(|| TeamMember {
                name: email.split('@').next().unwrap_or(email).to_string(),
                email: email.to_string(),
                role: None,
                department: None,
            });
            found.push((m.start(), member));
        }

        found.sort_by_key(|(pos, _)| *pos);
        let mut members: Vec<TeamMember> = Vec::with_capacity(found.len());
        for (_, member) in found {
            if !members.iter().any(|m| m.email == member.email) {
                members.push(member);
            }
        }
        members
    }
}

fn find_word(haystack: &str, word: &str) -> Option<usize> {
    if word.is_empty() {
        return None;
    }
    let mut from = 0;
    while let Some(offset) = haystack[from..].find(word) {
        let start = from + offset;
        let end = start + word.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        // A trailing '@' or an inner '.' means the word is part of an address.
        let mut rest = haystack[end..].chars();
        let after_ok = match rest.next() {
            None => true,
            Some('@') => false,
            Some('.') => !rest.next().map_or(false, |n| n.is_alphanumeric()),
            Some(c) => !c.is_alphanumeric(),
        };
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }
    None
}

use crate::core::contacts::{DirectoryError, TeamDirectoryStore, TeamMember};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

/// Reads the team roster from a JSON file shaped `{"employees": [...]}`.
pub struct JsonTeamDirectory {
    path: PathBuf,
}

#[derive(Deserialize)]
struct Roster {
    #[serde(default)]
    employees: Vec<TeamMember>,
}

impl JsonTeamDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TeamDirectoryStore for JsonTeamDirectory {
    async fn load_members(&self) -> Result<Vec<TeamMember>, DirectoryError> {
        if !self.path.exists() {
            tracing::warn!(path = %self.path.display(), "Team contacts file not found, starting with an empty directory");
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read_to_string(&self.path).await?;
        let roster: Roster = serde_json::from_str(&raw)?;
        Ok(roster
            .employees
            .into_iter()
            .filter(|m| !m.email.trim().is_empty())
            .collect())
    }
}

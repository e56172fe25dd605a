use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionProfile {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Session {
    #[serde(default, rename = "access_token")]
    token: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    profile: Option<SessionProfile>,
    #[serde(skip)]
    user: Option<String>,
}

impl Session {
    /// `PLACEMENT_TOKEN` (with optional `PLACEMENT_USER`) wins over the
    /// saved session file. No credential at all is not an error.
    pub fn load(session_file: &Path) -> Result<Self> {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        if let Some(token) = var("PLACEMENT_TOKEN") {
            debug!("using session from PLACEMENT_TOKEN");
            return Ok(Self::from_token(token, var("PLACEMENT_USER")));
        }
        if !session_file.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(session_file)
            .with_context(|| format!("Failed to read session file: {}", session_file.display()))?;
        debug!(path = %session_file.display(), "using saved session");
        Self::parse(&raw)
            .with_context(|| format!("Invalid session file: {}", session_file.display()))
    }

    pub fn from_token(token: String, user: Option<String>) -> Self {
        Self {
            token: Some(token),
            user,
            ..Default::default()
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    pub fn identity_label(&self) -> String {
        if !self.is_authenticated() {
            return "not signed in".to_string();
        }
        let profile = self.profile.as_ref();
        let name = profile
            .and_then(|p| p.name.clone())
            .or_else(|| self.user.clone());
        match (name, profile.and_then(|p| p.department.as_deref())) {
            (Some(name), Some(dept)) => format!("{} ({})", name, dept),
            (Some(name), None) => name,
            (None, _) => self.role.clone().unwrap_or_else(|| "student".to_string()),
        }
    }
}

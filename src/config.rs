use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::client::DEFAULT_API_URL;

/// Analysis runs several model calls server-side and is slow.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub timeout: Duration,
    pub download_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout_secs = match var("PLACEMENT_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .context("PLACEMENT_TIMEOUT_SECS must be a whole number of seconds")?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let (data_dir, config_dir) = match directories::ProjectDirs::from("", "", "placement") {
            Some(dirs) => (dirs.data_dir().to_path_buf(), dirs.config_dir().to_path_buf()),
            None => (PathBuf::from("."), PathBuf::from(".")),
        };

        Ok(Config {
            api_url: var("PLACEMENT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            download_dir: var("PLACEMENT_DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_download_dir),
            data_dir,
            config_dir,
        })
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("placement.log")
    }

    pub fn session_path(&self) -> PathBuf {
        self.config_dir.join("session.json")
    }
}

fn default_download_dir() -> PathBuf {
    directories::UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|d| d.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.session_path().ends_with("session.json"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PLACEMENT_API_URL", "https://portal.example.edu/api"),
            ("PLACEMENT_TIMEOUT_SECS", "30"),
            ("PLACEMENT_DOWNLOAD_DIR", "/tmp/resumes"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://portal.example.edu/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.download_dir, PathBuf::from("/tmp/resumes"));
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = Config::from_lookup(lookup(&[("PLACEMENT_API_URL", "  ")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_bad_timeout_is_an_error() {
        let err = Config::from_lookup(lookup(&[("PLACEMENT_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("PLACEMENT_TIMEOUT_SECS"));
    }
}

//! Application-level configuration loading, including the fallback candidate
//! pool used when the merged lists are too small to seed a bracket.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::catalog::CandidateRecord;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "MOVIE_NIGHT_BACK_CONFIG_PATH";

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    fallback_pool: Vec<CandidateRecord>,
    catalog_url: Option<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in candidate pool.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        count = app_config.fallback_pool.len(),
                        "loaded fallback candidate pool from config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Candidates substituted when the merged union is below the minimum
    /// viable bracket size.
    pub fn fallback_pool(&self) -> &[CandidateRecord] {
        &self.fallback_pool
    }

    /// Base URL of the external candidate catalog, when one is configured.
    pub fn catalog_url(&self) -> Option<&str> {
        self.catalog_url.as_deref()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fallback_pool: default_fallback_pool(),
            catalog_url: env::var("CATALOG_URL").ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    fallback_pool: Vec<RawCandidate>,
    catalog_url: Option<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            fallback_pool: value.fallback_pool.into_iter().map(Into::into).collect(),
            catalog_url: env::var("CATALOG_URL").ok().or(value.catalog_url),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single fallback candidate entry.
struct RawCandidate {
    id: i64,
    title: String,
    poster: Option<String>,
}

impl From<RawCandidate> for CandidateRecord {
    fn from(value: RawCandidate) -> Self {
        Self {
            candidate_id: value.id,
            title: value.title,
            poster_ref: value.poster,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in fallback pool shipped with the binary: broadly liked films so a
/// degraded-mode tournament is still worth playing.
fn default_fallback_pool() -> Vec<CandidateRecord> {
    let entries: [(i64, &str, &str); 8] = [
        (278, "The Shawshank Redemption", "/9cqNxx0GxF0bflZmeSMuL5tnGzr.jpg"),
        (238, "The Godfather", "/3bhkrj58Vtu7enYsRolD1fZdja1.jpg"),
        (155, "The Dark Knight", "/qJ2tW6WMUDux911r6m7haRef0WH.jpg"),
        (680, "Pulp Fiction", "/d5iIlFn5s0ImszYzBPb8JPIfbXD.jpg"),
        (13, "Forrest Gump", "/arw2vcBveWOVZr6pxd9XTd1TdQa.jpg"),
        (27205, "Inception", "/oYuLEt3zVCKq57qu2F8dT7NIa6f.jpg"),
        (603, "The Matrix", "/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg"),
        (129, "Spirited Away", "/39wmItIWsg5sZMyRUHLkWBcuVCM.jpg"),
    ];

    entries
        .into_iter()
        .map(|(id, title, poster)| CandidateRecord {
            candidate_id: id,
            title: title.to_owned(),
            poster_ref: Some(poster.to_owned()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_is_large_enough_for_a_bracket() {
        let pool = default_fallback_pool();
        assert!(pool.len() >= 4);

        let mut ids: Vec<i64> = pool.iter().map(|c| c.candidate_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), pool.len(), "fallback ids must be distinct");
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub ranking: RankingConfig,
    pub session: SessionConfig,
    pub ingest: IngestConfig,
    pub collaborators: CollaboratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Refresh cadence of the materialized ranking index. This is the
    /// staleness bound callers must tolerate.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a disconnected session's cursor is retained before reaping.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,
    /// Bound on the per-session seen-video exclusion set (FIFO eviction).
    #[serde(default = "default_exclude_capacity")]
    pub exclude_capacity: usize,
    /// Minimum accumulated watch time before a left-swipe counts as a view.
    #[serde(default = "default_min_view_seconds")]
    pub min_view_seconds: f64,
    /// Videos materialized per feed fetch for a session.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Views with no terminating signal are finalized with last-known
    /// progress after this long.
    #[serde(default = "default_view_finalize_timeout_secs")]
    pub view_finalize_timeout_secs: u64,
    #[serde(default = "default_view_sweep_interval_secs")]
    pub view_sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    pub content_service_url: String,
    pub social_service_url: String,
    pub identity_service_url: String,
    pub trust_safety_service_url: String,
    pub graph_service_url: String,
    #[serde(default = "default_collaborator_timeout_secs")]
    pub timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            ranking: RankingConfig {
                refresh_interval_secs: std::env::var("RANKING_REFRESH_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_refresh_interval_secs),
            },
            session: SessionConfig {
                grace_period_secs: std::env::var("SESSION_GRACE_PERIOD_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_grace_period_secs),
                exclude_capacity: std::env::var("SESSION_EXCLUDE_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_exclude_capacity),
                min_view_seconds: std::env::var("SESSION_MIN_VIEW_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_min_view_seconds),
                page_size: std::env::var("SESSION_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_page_size),
            },
            ingest: IngestConfig {
                view_finalize_timeout_secs: std::env::var("VIEW_FINALIZE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_view_finalize_timeout_secs),
                view_sweep_interval_secs: std::env::var("VIEW_SWEEP_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_view_sweep_interval_secs),
            },
            collaborators: CollaboratorConfig {
                content_service_url: std::env::var("CONTENT_SERVICE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8081".to_string()),
                social_service_url: std::env::var("SOCIAL_SERVICE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8082".to_string()),
                identity_service_url: std::env::var("IDENTITY_SERVICE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8083".to_string()),
                trust_safety_service_url: std::env::var("TRUST_SAFETY_SERVICE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8084".to_string()),
                graph_service_url: std::env::var("GRAPH_SERVICE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:8085".to_string()),
                timeout_secs: std::env::var("COLLABORATOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_collaborator_timeout_secs),
            },
        })
    }
}

fn default_refresh_interval_secs() -> u64 {
    5
}

fn default_grace_period_secs() -> u64 {
    300
}

fn default_exclude_capacity() -> usize {
    500
}

fn default_min_view_seconds() -> f64 {
    3.0
}

fn default_page_size() -> usize {
    10
}

fn default_view_finalize_timeout_secs() -> u64 {
    60
}

fn default_view_sweep_interval_secs() -> u64 {
    10
}

fn default_collaborator_timeout_secs() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(default_refresh_interval_secs(), 5);
        assert_eq!(default_grace_period_secs(), 300);
        assert_eq!(default_exclude_capacity(), 500);
        assert_eq!(default_min_view_seconds(), 3.0);
    }
}

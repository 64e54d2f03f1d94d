use std::path::PathBuf;

use serde::Deserialize;

/// Application settings, read from the Rocket figment (`Rocket.toml` and
/// `ROCKET_*` environment variables).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory backing the public `/uploads/` prefix.
    pub upload_root: PathBuf,
    pub session_ttl_hours: i64,
    /// How long an externally initiated operation may run before it is
    /// abandoned.
    pub request_deadline_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upload_root: PathBuf::from("uploads"),
            session_ttl_hours: 24,
            request_deadline_ms: 10_000,
        }
    }
}

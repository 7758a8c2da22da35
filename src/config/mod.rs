use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Process-wide configuration, resolved once at startup.
///
/// Environment variables override the defaults; CLI flags override the
/// environment (see `main`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// TCP port the server binds to.
    pub port: u16,
    /// Optional directory of `<collection>.json` seed files plus `rules.json`.
    pub seed_dir: Option<PathBuf>,
    /// Name of the unique identity field on user records.
    pub identity: String,
    /// Fixed server-side secret keying the password/token hash.
    pub secret: String,
    /// Development mode; reserved for live static-asset reads.
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3030,
            seed_dir: None,
            identity: "email".to_string(),
            secret: "This is not a production server".to_string(),
            dev_mode: false,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("NEBULA_PORT").or_else(|_| env::var("PORT")) {
            self.port = v.parse().unwrap_or(self.port);
        }
        if let Ok(v) = env::var("NEBULA_SEED_DIR") {
            if !v.is_empty() {
                self.seed_dir = Some(PathBuf::from(v));
            }
        }
        if let Ok(v) = env::var("NEBULA_IDENTITY") {
            if !v.is_empty() {
                self.identity = v;
            }
        }
        if let Ok(v) = env::var("NEBULA_SECRET") {
            if !v.is_empty() {
                self.secret = v;
            }
        }
        if let Ok(v) = env::var("NEBULA_DEV") {
            self.dev_mode = v.parse().unwrap_or(self.dev_mode);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.port, 3030);
        assert_eq!(config.identity, "email");
        assert!(config.seed_dir.is_none());
        assert!(!config.dev_mode);
    }
}

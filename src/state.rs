use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::auth::Auth;
use crate::config::AppConfig;
use crate::rules::RuleSet;
use crate::storage::Store;

/// Runtime-toggleable utility flags (`/util` service).
#[derive(Debug, Default)]
pub struct UtilFlags {
    throttle: AtomicBool,
}

impl UtilFlags {
    pub fn throttle(&self) -> bool {
        self.throttle.load(Ordering::Relaxed)
    }

    pub fn set_throttle(&self, enabled: bool) {
        self.throttle.store(enabled, Ordering::Relaxed);
    }
}

/// Process-wide state, assembled once at startup and injected into every
/// handler through axum's `State` extractor.
pub struct AppState {
    pub config: AppConfig,
    /// Arbitrary application data, exposed through `/data`.
    pub public: Store,
    /// System collections (`users`, `sessions`); never exposed directly.
    pub protected: Store,
    /// Raw nested key/value tree behind `/jsonstore`.
    pub jsonstore: RwLock<Value>,
    pub rules: RuleSet,
    pub auth: Auth,
    pub util: UtilFlags,
}

impl AppState {
    /// Build the state from configuration: empty partitions, optionally
    /// populated from the seed directory (`<collection>.json` files;
    /// `users.json` and `sessions.json` go to the protected partition,
    /// `rules.json` configures the access rules).
    pub fn from_config(config: AppConfig) -> anyhow::Result<Arc<Self>> {
        let public = Store::new();
        let protected = Store::new();
        let mut rules = RuleSet::default();

        if let Some(seed_dir) = &config.seed_dir {
            let entries = fs::read_dir(seed_dir)
                .with_context(|| format!("cannot read seed directory {}", seed_dir.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
                else {
                    continue;
                };
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("cannot read seed file {}", path.display()))?;
                let parsed: Value = serde_json::from_str(&content)
                    .with_context(|| format!("invalid JSON in seed file {}", path.display()))?;

                match name.as_str() {
                    "rules" => {
                        rules = RuleSet::from_json(&parsed)
                            .with_context(|| format!("invalid rules in {}", path.display()))?;
                    }
                    "users" | "sessions" => protected.load_seed(&name, &parsed),
                    _ => public.load_seed(&name, &parsed),
                }
                tracing::info!("seeded {} from {}", name, path.display());
            }
        }

        let auth = Auth::new(config.identity.clone(), config.secret.clone());
        Ok(Arc::new(Self {
            config,
            public,
            protected,
            jsonstore: RwLock::new(Value::Object(Map::new())),
            rules,
            auth,
            util: UtilFlags::default(),
        }))
    }
}

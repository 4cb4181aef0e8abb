//! Server settings from environment (`GRAPH_API_*`), with `.env` support.

use serde::{Deserialize, Serialize};

/// Used when `GRAPH_API_SECRET_KEY` is unset. Never rely on it outside development.
pub const DEFAULT_SECRET_KEY: &str = "graph-api-development-secret";

/// Default request body limit: 2 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorsSettings {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
    pub max_age_secs: u64,
}

impl Default for CorsSettings {
    fn default() -> Self {
        CorsSettings {
            allow_origin: "*".into(),
            allow_methods: "OPTIONS, POST, GET, PATCH, DELETE".into(),
            allow_headers: "*".into(),
            max_age_secs: 86400,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// HMAC key for session tokens.
    pub secret_key: String,
    /// Attach internal error detail to 500 responses.
    pub debug: bool,
    pub cors: CorsSettings,
    pub body_limit: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            secret_key: DEFAULT_SECRET_KEY.into(),
            debug: false,
            cors: CorsSettings::default(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ServerSettings {
    /// Load `.env` (if present), then read settings from the process environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Read settings through `lookup`; unset or unparsable values keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ServerSettings::default();
        let secret_key = match lookup("GRAPH_API_SECRET_KEY").filter(|s| !s.is_empty()) {
            Some(key) => key,
            None => {
                tracing::warn!("GRAPH_API_SECRET_KEY is not set; using the built-in development key");
                defaults.secret_key
            }
        };
        let debug = lookup("GRAPH_API_DEBUG")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(defaults.debug);
        let cors = CorsSettings {
            allow_origin: lookup("GRAPH_API_CORS_ALLOW_ORIGIN").unwrap_or(defaults.cors.allow_origin),
            allow_methods: lookup("GRAPH_API_CORS_ALLOW_METHODS").unwrap_or(defaults.cors.allow_methods),
            allow_headers: lookup("GRAPH_API_CORS_ALLOW_HEADERS").unwrap_or(defaults.cors.allow_headers),
            max_age_secs: lookup("GRAPH_API_CORS_MAX_AGE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cors.max_age_secs),
        };
        let body_limit = lookup("GRAPH_API_BODY_LIMIT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.body_limit);
        ServerSettings {
            secret_key,
            debug,
            cors,
            body_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn unset_environment_gives_defaults() {
        let settings = ServerSettings::from_lookup(|_| None);
        assert_eq!(settings, ServerSettings::default());
    }

    #[test]
    fn environment_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("GRAPH_API_SECRET_KEY", "s3cret"),
            ("GRAPH_API_DEBUG", "true"),
            ("GRAPH_API_CORS_ALLOW_ORIGIN", "https://app.example.com"),
            ("GRAPH_API_CORS_MAX_AGE", "600"),
            ("GRAPH_API_BODY_LIMIT", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let settings = ServerSettings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.secret_key, "s3cret");
        assert!(settings.debug);
        assert_eq!(settings.cors.allow_origin, "https://app.example.com");
        assert_eq!(settings.cors.max_age_secs, 600);
        assert_eq!(settings.body_limit, DEFAULT_BODY_LIMIT);
    }
}

//! Server configuration.
//!
//! Built from the command line first, then adjusted by the client's
//! `initializationOptions`.

use serde::Deserialize;

/// Runtime configuration of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Size of the worker pool running read requests and diagnostics jobs.
    pub worker_threads: usize,
    /// Publish diagnostics after open and change.
    pub diagnostics: bool,
    /// Advertise and serve semantic tokens.
    pub semantic_tokens: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            worker_threads: std::thread::available_parallelism().map_or(1, usize::from),
            diagnostics: true,
            semantic_tokens: true,
        }
    }
}

/// The subset of `initializationOptions` the server understands.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializationOptions {
    diagnostics: Option<bool>,
    semantic_tokens: Option<bool>,
}

impl ServerConfig {
    /// Override settings from the client's `initializationOptions`.
    ///
    /// Unknown keys are ignored. Options that do not deserialize are logged
    /// and leave the configuration unchanged.
    pub fn apply_initialization_options(&mut self, options: Option<serde_json::Value>) {
        let Some(value) = options else {
            return;
        };
        if value.is_null() {
            return;
        }
        match serde_json::from_value::<InitializationOptions>(value) {
            Ok(options) => {
                if let Some(diagnostics) = options.diagnostics {
                    self.diagnostics = diagnostics;
                }
                if let Some(semantic_tokens) = options.semantic_tokens {
                    self.semantic_tokens = semantic_tokens;
                }
                tracing::debug!(?self, "applied initialization options");
            }
            Err(e) => {
                tracing::warn!("Ignoring malformed initializationOptions: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert!(config.worker_threads >= 1);
        assert!(config.diagnostics);
        assert!(config.semantic_tokens);
    }

    #[test]
    fn test_options_override() {
        let mut config = ServerConfig::default();
        config.apply_initialization_options(Some(json!({
            "semanticTokens": false,
            "somethingElse": 3
        })));
        assert!(!config.semantic_tokens);
        assert!(config.diagnostics);
    }

    #[test]
    fn test_malformed_options_ignored() {
        let mut config = ServerConfig::default();
        let before = config.clone();
        config.apply_initialization_options(Some(json!({"diagnostics": "yes"})));
        assert_eq!(config, before);
        config.apply_initialization_options(Some(json!([1, 2])));
        assert_eq!(config, before);
    }
}

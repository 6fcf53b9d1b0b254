//! Engine configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration shared by the accounting engine, its stores and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the channel behind a streaming transaction read.
    pub stream_buffer: usize,
    /// Maximum number of rounds a single rewind may replay. `None` = no limit.
    pub max_rewind_rounds: Option<u64>,
    /// Logging setup for binaries.
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stream_buffer: 64,
            max_rewind_rounds: None,
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Set the streaming channel capacity (minimum 1).
    pub fn stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity.max(1);
        self
    }

    /// Limit how far back a rewind may go.
    pub fn max_rewind_rounds(mut self, rounds: u64) -> Self {
        self.max_rewind_rounds = Some(rounds);
        self
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Parse a JSON config document; missing fields take their defaults.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Log level and output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    pub level: String,
    /// Per-crate overrides: crate name → level
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directive string, e.g. `"info,ledgerindex_accounting=debug"`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.stream_buffer, 64);
        assert!(cfg.max_rewind_rounds.is_none());
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn fluent_setters() {
        let cfg = EngineConfig::default().stream_buffer(0).max_rewind_rounds(1000);
        assert_eq!(cfg.stream_buffer, 1);
        assert_eq!(cfg.max_rewind_rounds, Some(1000));
    }

    #[test]
    fn partial_json() {
        let cfg = EngineConfig::from_json(r#"{"max_rewind_rounds": 50, "log": {"json": true}}"#)
            .unwrap();
        assert_eq!(cfg.stream_buffer, 64);
        assert_eq!(cfg.max_rewind_rounds, Some(50));
        assert!(cfg.log.json);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn log_directives() {
        let mut log = LogConfig::default();
        log.components.insert("ledgerindex-accounting".into(), "debug".into());
        assert_eq!(log.directives(), "info,ledgerindex_accounting=debug");
    }
}

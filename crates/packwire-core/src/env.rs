//! Process environment resolution.
//!
//! `NODE_ENV` and `PORT` are read once, at startup, into an [`Environment`]
//! that is passed explicitly to every assembler. Nothing else in the crate
//! reads the process environment.

use crate::config::ProjectConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// `NODE_ENV` value that suppresses side effects such as opening a browser.
pub const TESTING_ENV: &str = "testing";

/// Build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    /// `production` selects production; every other value is development.
    #[must_use]
    pub fn from_node_env(node_env: &str) -> Self {
        if node_env == "production" {
            Self::Production
        } else {
            Self::Development
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Resolved process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    /// Effective `NODE_ENV`.
    pub node_env: String,
    /// Effective dev server port.
    pub port: u16,
}

impl Environment {
    /// Resolve against an arbitrary variable lookup.
    ///
    /// Unset `NODE_ENV` falls back to the configured dev default; unset `PORT`
    /// falls back to `dev.port`.
    pub fn resolve<F>(config: &ProjectConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let node_env = lookup("NODE_ENV")
            .filter(|v| !v.is_empty())
            .or_else(|| config.dev.env.get("NODE_ENV").cloned())
            .unwrap_or_else(|| Mode::Development.as_str().to_string());

        let port = match lookup("PORT").filter(|v| !v.is_empty()) {
            Some(value) => value
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::InvalidPort { value })?,
            None => config.dev.port,
        };

        Ok(Self { node_env, port })
    }

    /// Resolve from the real process environment.
    pub fn from_process(config: &ProjectConfig) -> Result<Self> {
        Self::resolve(config, |key| std::env::var(key).ok())
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        Mode::from_node_env(&self.node_env)
    }

    #[must_use]
    pub fn is_testing(&self) -> bool {
        self.node_env == TESTING_ENV
    }

    /// Same environment with a different `NODE_ENV` (used by `build`).
    #[must_use]
    pub fn with_node_env(mut self, node_env: impl Into<String>) -> Self {
        self.node_env = node_env.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_node_env_defaults_to_dev_config() {
        let config = ProjectConfig::default();
        let env = Environment::resolve(&config, lookup(&[])).unwrap();
        assert_eq!(env.node_env, "development");
        assert_eq!(env.mode(), Mode::Development);
        assert_eq!(env.port, 8080);
    }

    #[test]
    fn test_node_env_from_lookup_wins() {
        let config = ProjectConfig::default();
        let env = Environment::resolve(&config, lookup(&[("NODE_ENV", "testing")])).unwrap();
        assert_eq!(env.node_env, "testing");
        assert!(env.is_testing());
        assert_eq!(env.mode(), Mode::Development);
    }

    #[test]
    fn test_port_override() {
        let config = ProjectConfig::default();
        let env = Environment::resolve(&config, lookup(&[("PORT", "3001")])).unwrap();
        assert_eq!(env.port, 3001);
    }

    #[test]
    fn test_invalid_port() {
        let config = ProjectConfig::default();
        let err = Environment::resolve(&config, lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::InvalidPort { value } if value == "eighty"));
    }

    #[test]
    fn test_mode_from_node_env() {
        assert_eq!(Mode::from_node_env("production"), Mode::Production);
        assert_eq!(Mode::from_node_env("development"), Mode::Development);
        assert_eq!(Mode::from_node_env("testing"), Mode::Development);
    }

    #[test]
    #[serial]
    fn test_from_process_reads_env() {
        let config = ProjectConfig::default();
        std::env::remove_var("NODE_ENV");
        std::env::set_var("PORT", "4567");

        let env = Environment::from_process(&config).unwrap();
        assert_eq!(env.node_env, "development");
        assert_eq!(env.port, 4567);

        std::env::remove_var("PORT");
    }
}

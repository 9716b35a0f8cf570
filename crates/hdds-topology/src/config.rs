// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topology supervisor configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Topology supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Bounded wait of each aggregator on its feed (milliseconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Topic names whose endpoints are never tracked, besides the DDS built-in topics
    #[serde(default)]
    pub ignored_topics: Vec<String>,

    /// Prefix of aggregator/dispatcher thread names
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,
}

fn default_poll_interval() -> u64 {
    100
}

fn default_thread_name_prefix() -> String {
    "hdds-topo".to_string()
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            ignored_topics: Vec::new(),
            thread_name_prefix: default_thread_name_prefix(),
        }
    }
}

impl TopologyConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Get poll interval as Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_ms cannot be 0".into(),
            ));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "thread_name_prefix cannot be empty".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn aggregator_thread_name(&self, domain_id: u32) -> String {
        format!("{}-agg-{}", self.thread_name_prefix, domain_id)
    }

    pub(crate) fn dispatcher_thread_name(&self) -> String {
        format!("{}-dispatch", self.thread_name_prefix)
    }
}

/// Configuration error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for topology supervision.

use crate::config::ConfigError;
use crate::discovery::FeedError;
use std::io;
use thiserror::Error;

/// Errors returned by [`crate::DomainSupervisor`] operations.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("supervisor is not running")]
    NotRunning,

    #[error("supervisor is already running")]
    AlreadyRunning,

    #[error("domain {0} is already supervised")]
    DomainExists(u32),

    #[error("domain {0} is not supervised")]
    UnknownDomain(u32),

    #[error("event dispatcher has stopped")]
    DispatcherStopped,

    #[error("discovery feed: {0}")]
    Feed(#[from] FeedError),

    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn thread: {0}")]
    ThreadSpawn(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, TopologyError>;

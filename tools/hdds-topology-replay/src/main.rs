// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDDS Topology Replay CLI
//!
//! Feeds a recorded discovery capture through the topology core and prints
//! every notification, then a per-domain mismatch summary.
//!
//! # Usage
//!
//! ```bash
//! # Replay a capture, text output
//! hdds-topology-replay --capture rig.jsonl
//!
//! # JSON lines, small batches, debug logs from the core
//! hdds-topology-replay --capture rig.jsonl --format json --batch 4 --log-level debug
//!
//! # Custom topology config (filters, thread names)
//! hdds-topology-replay --capture rig.jsonl --config topology.json --no-summary
//! ```

mod capture;

use anyhow::{Context, Result};
use capture::{load_capture, CaptureFeed};
use clap::{Parser, ValueEnum};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use hdds_topology::{DomainSupervisor, Guid, Notification, TopicSummary, TopologyConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "hdds-topology-replay")]
#[command(author = "naskel.com")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Replay a DDS discovery capture and report QoS mismatches")]
#[command(long_about = None)]
struct Cli {
    /// JSON-lines discovery capture
    #[arg(short, long)]
    capture: PathBuf,

    /// Topology config file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: FormatArg,

    /// Internal log level
    #[arg(short, long, value_enum, default_value = "warn")]
    log_level: LevelArg,

    /// Events handed to the core per feed batch
    #[arg(short, long, default_value = "32")]
    batch: usize,

    /// Print a per-domain summary at the end (default)
    #[arg(long, overrides_with = "no_summary")]
    summary: bool,

    /// Skip the final summary
    #[arg(long, overrides_with = "summary")]
    no_summary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LevelArg {
    fn directive(self) -> String {
        let level = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        };
        format!("hdds_topology={level},hdds_topology_replay={level}")
    }
}

/// Mismatch report of one domain.
#[derive(Debug, Serialize)]
struct DomainSummary {
    domain_id: u32,
    topics: Vec<TopicSummary>,
    mismatches: BTreeMap<String, Vec<Guid>>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.directive()));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, shutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&cli, &running, &mut out)
}

fn run(cli: &Cli, running: &AtomicBool, out: &mut dyn Write) -> Result<()> {
    let config = match &cli.config {
        Some(path) => TopologyConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TopologyConfig::default(),
    };
    let domains = load_capture(&cli.capture)
        .with_context(|| format!("Failed to load capture {}", cli.capture.display()))?;

    tracing::info!(
        capture = %cli.capture.display(),
        domains = domains.len(),
        events = domains.values().map(Vec::len).sum::<usize>(),
        batch = cli.batch,
        "Starting replay"
    );

    let supervisor = DomainSupervisor::new(config).context("Invalid topology config")?;
    supervisor.start().context("Failed to start supervisor")?;
    let notifications = supervisor
        .subscribe_channel()
        .context("Failed to subscribe")?;

    for (domain_id, events) in domains {
        supervisor
            .add_domain_with_feed(domain_id, CaptureFeed::new(events, cli.batch))
            .with_context(|| format!("Failed to add domain {domain_id}"))?;
    }

    let printed = pump(&supervisor, &notifications, running, cli.format, out)?;

    let interrupted = !running.load(Ordering::SeqCst);
    if !cli.no_summary && !interrupted {
        write_summary(&supervisor, cli.format, out)?;
    }

    let stats = supervisor.stats();
    tracing::info!(
        events_applied = stats.dispatcher.events_applied,
        notifications = printed,
        interrupted,
        "Replay complete"
    );
    supervisor.stop();
    Ok(())
}

/// Print notifications until every feed is drained or Ctrl+C. Returns the count printed.
fn pump(
    supervisor: &DomainSupervisor,
    notifications: &Receiver<Notification>,
    running: &AtomicBool,
    format: FormatArg,
    out: &mut dyn Write,
) -> Result<usize> {
    let mut printed = 0;
    while running.load(Ordering::SeqCst) {
        match notifications.recv_timeout(Duration::from_millis(50)) {
            Ok(notification) => {
                write_notification(&notification, format, out)?;
                printed += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                if supervisor.active_feeds().is_empty() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Ok(printed),
        }
    }

    if running.load(Ordering::SeqCst) {
        // Feeds are closed; wait for the dispatcher to catch up, then drain.
        supervisor.flush().context("Dispatcher stopped")?;
        for notification in notifications.try_iter() {
            write_notification(&notification, format, out)?;
            printed += 1;
        }
    }
    Ok(printed)
}

fn write_notification(
    notification: &Notification,
    format: FormatArg,
    out: &mut dyn Write,
) -> Result<()> {
    match format {
        FormatArg::Text => writeln!(out, "{notification}")?,
        FormatArg::Json => writeln!(out, "{}", serde_json::to_string(notification)?)?,
    }
    Ok(())
}

fn write_summary(supervisor: &DomainSupervisor, format: FormatArg, out: &mut dyn Write) -> Result<()> {
    for domain_id in supervisor.domains() {
        let topics = supervisor.query_topics(domain_id)?;
        let mut mismatches = BTreeMap::new();
        for topic in topics.iter().filter(|t| t.mismatched_endpoints > 0) {
            let keys = supervisor.query_mismatches(domain_id, &topic.name)?;
            mismatches.insert(topic.name.clone(), keys);
        }
        let summary = DomainSummary {
            domain_id,
            topics,
            mismatches,
        };

        match format {
            FormatArg::Json => writeln!(out, "{}", serde_json::to_string(&summary)?)?,
            FormatArg::Text => write_text_summary(&summary, out)?,
        }
    }
    Ok(())
}

fn write_text_summary(summary: &DomainSummary, out: &mut dyn Write) -> Result<()> {
    writeln!(
        out,
        "== domain {}: {} topic(s), {} with QoS mismatches",
        summary.domain_id,
        summary.topics.len(),
        summary.mismatches.len()
    )?;
    for topic in &summary.topics {
        writeln!(
            out,
            "  {:<24} [{}] readers={} writers={} mismatched={}",
            topic.name,
            topic.type_names.join(", "),
            topic.reader_count,
            topic.writer_count,
            topic.mismatched_endpoints
        )?;
        for key in summary.mismatches.get(&topic.name).into_iter().flatten() {
            writeln!(out, "    ! {key}")?;
        }
    }
    Ok(())
}

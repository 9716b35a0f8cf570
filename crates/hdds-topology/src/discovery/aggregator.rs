// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-domain aggregator thread.
//!
//! ```text
//!   DiscoveryFeed ──wait(poll)──> [filter + normalize] ──Command::Discovery──> dispatcher
//! ```
//!
//! The thread cycles Idle -> Polling -> (batch ready) -> Idle until its stop
//! flag is raised, the feed reports `Closed`, or the dispatcher is gone.

use super::{DiscoveryEvent, DiscoveryFeed, FeedError, FeedEvent, TopicFilter};
use crate::dispatcher::Command;
use crossbeam::channel::Sender;
use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Snapshot of one aggregator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    /// Batches handed to the dispatcher queue.
    pub batches: u64,
    /// Events forwarded to the dispatcher.
    pub events: u64,
    /// Endpoint events dropped by the topic filter.
    pub filtered: u64,
    /// Non-fatal feed errors.
    pub feed_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    batches: AtomicU64,
    events: AtomicU64,
    filtered: AtomicU64,
    feed_errors: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> AggregatorStats {
        AggregatorStats {
            batches: self.batches.load(Ordering::Relaxed),
            events: self.events.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            feed_errors: self.feed_errors.load(Ordering::Relaxed),
        }
    }
}

/// Owner handle of a running aggregator; stops and joins the thread on drop.
pub struct AggregatorHandle {
    domain_id: u32,
    stop: Arc<AtomicBool>,
    counters: Arc<Counters>,
    thread: Option<JoinHandle<()>>,
}

impl AggregatorHandle {
    pub fn domain_id(&self) -> u32 {
        self.domain_id
    }

    /// Raise the stop flag and wait for the thread to exit.
    ///
    /// Returns within roughly one poll interval (plus any in-flight `wait`).
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("[TOPO-AGG] domain={} aggregator panicked", self.domain_id);
            }
        }
    }

    /// True once the loop has exited (feed closed, dispatcher gone, or stopped).
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn stats(&self) -> AggregatorStats {
        self.counters.snapshot()
    }
}

impl Drop for AggregatorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything an aggregator thread needs.
pub(crate) struct AggregatorConfig {
    pub domain_id: u32,
    pub poll_interval: Duration,
    pub filter: TopicFilter,
    pub thread_name: String,
}

/// Spawn the aggregator thread for one domain.
pub(crate) fn spawn(
    config: AggregatorConfig,
    feed: Box<dyn DiscoveryFeed>,
    tx: Sender<Command>,
) -> io::Result<AggregatorHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let counters = Arc::new(Counters::default());
    let domain_id = config.domain_id;

    let thread = {
        let stop = Arc::clone(&stop);
        let counters = Arc::clone(&counters);
        thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run(config, feed, tx, &stop, &counters))?
    };

    Ok(AggregatorHandle {
        domain_id,
        stop,
        counters,
        thread: Some(thread),
    })
}

fn run(
    config: AggregatorConfig,
    mut feed: Box<dyn DiscoveryFeed>,
    tx: Sender<Command>,
    stop: &AtomicBool,
    counters: &Counters,
) {
    let domain_id = config.domain_id;
    log::info!(
        "[TOPO-AGG] domain={} started (poll {:?})",
        domain_id,
        config.poll_interval
    );

    while !stop.load(Ordering::Acquire) {
        let events = match feed.wait(config.poll_interval) {
            Ok(events) => events,
            Err(FeedError::Closed) => {
                log::info!("[TOPO-AGG] domain={} feed closed", domain_id);
                break;
            }
            Err(err) => {
                counters.feed_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("[TOPO-AGG] domain={} {}", domain_id, err);
                // Avoid spinning on a feed that fails without blocking.
                thread::sleep(config.poll_interval);
                continue;
            }
        };

        if events.is_empty() {
            continue;
        }

        let received = events.len();
        let batch: Vec<FeedEvent> = events
            .into_iter()
            .filter(|e| config.filter.accepts(&e.event))
            .map(normalize)
            .collect();

        let dropped = received - batch.len();
        if dropped > 0 {
            counters.filtered.fetch_add(dropped as u64, Ordering::Relaxed);
            log::trace!("[TOPO-AGG] domain={} filtered {} events", domain_id, dropped);
        }
        if batch.is_empty() {
            continue;
        }

        counters.batches.fetch_add(1, Ordering::Relaxed);
        counters
            .events
            .fetch_add(batch.len() as u64, Ordering::Relaxed);
        if tx
            .send(Command::Discovery {
                domain_id,
                events: batch,
            })
            .is_err()
        {
            log::debug!("[TOPO-AGG] domain={} dispatcher gone, exiting", domain_id);
            break;
        }
    }

    log::info!("[TOPO-AGG] domain={} stopped", domain_id);
}

/// Fill in the owning participant when the feed did not report it.
fn normalize(mut event: FeedEvent) -> FeedEvent {
    if let DiscoveryEvent::EndpointArrived(endpoint) = &mut event.event {
        if endpoint.participant_key.is_none() {
            endpoint.participant_key = Some(endpoint.key.participant_guid());
        }
    }
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guid::Guid;
    use crate::model::{Endpoint, Participant};
    use crossbeam::channel::{self, Receiver};
    use std::collections::VecDeque;
    use std::time::Instant;

    /// Feed replaying scripted results, then timing out forever.
    struct ScriptedFeed {
        script: VecDeque<Result<Vec<FeedEvent>, FeedError>>,
    }

    impl DiscoveryFeed for ScriptedFeed {
        fn wait(&mut self, timeout: Duration) -> Result<Vec<FeedEvent>, FeedError> {
            match self.script.pop_front() {
                Some(result) => result,
                None => {
                    thread::sleep(timeout);
                    Ok(Vec::new())
                }
            }
        }
    }

    fn guid(id: u8) -> Guid {
        Guid::new([id; 12], [0, 0, 0, 2])
    }

    fn start(
        script: Vec<Result<Vec<FeedEvent>, FeedError>>,
        filter: TopicFilter,
    ) -> (AggregatorHandle, Receiver<Command>) {
        let (tx, rx) = channel::unbounded();
        let config = AggregatorConfig {
            domain_id: 7,
            poll_interval: Duration::from_millis(10),
            filter,
            thread_name: "test-agg-7".to_string(),
        };
        let feed = Box::new(ScriptedFeed {
            script: script.into(),
        });
        let handle = spawn(config, feed, tx).expect("spawn aggregator");
        (handle, rx)
    }

    fn next_batch(rx: &Receiver<Command>) -> (u32, Vec<FeedEvent>) {
        match rx.recv_timeout(Duration::from_secs(2)) {
            Ok(Command::Discovery { domain_id, events }) => (domain_id, events),
            Ok(_) => panic!("unexpected command"),
            Err(err) => panic!("no batch: {}", err),
        }
    }

    #[test]
    fn test_builtin_endpoints_filtered_and_owner_derived() {
        let events = vec![
            FeedEvent::new(DiscoveryEvent::EndpointArrived(Endpoint::writer(
                guid(1),
                "DCPSPublication",
                "",
            ))),
            FeedEvent::new(DiscoveryEvent::EndpointArrived(Endpoint::reader(
                guid(2),
                "chatter",
                "String",
            ))),
        ];
        let (mut handle, rx) = start(vec![Ok(events)], TopicFilter::default());

        let (domain_id, batch) = next_batch(&rx);
        assert_eq!(domain_id, 7);
        assert_eq!(batch.len(), 1);
        match &batch[0].event {
            DiscoveryEvent::EndpointArrived(endpoint) => {
                assert_eq!(endpoint.key, guid(2));
                assert_eq!(endpoint.participant_key, Some(guid(2).participant_guid()));
            }
            other => panic!("unexpected event {:?}", other),
        }

        handle.stop();
        let stats = handle.stats();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.events, 1);
        assert_eq!(stats.filtered, 1);
    }

    #[test]
    fn test_transient_error_keeps_polling() {
        let script = vec![
            Err(FeedError::Transient("socket reset".to_string())),
            Ok(vec![FeedEvent::new(DiscoveryEvent::ParticipantArrived(
                Participant::new(guid(3)),
            ))]),
        ];
        let (mut handle, rx) = start(script, TopicFilter::default());

        let (_, batch) = next_batch(&rx);
        assert_eq!(batch[0].event.key(), guid(3));

        handle.stop();
        assert_eq!(handle.stats().feed_errors, 1);
    }

    #[test]
    fn test_closed_feed_ends_loop() {
        let (handle, rx) = start(vec![Err(FeedError::Closed)], TopicFilter::default());

        let deadline = Instant::now() + Duration::from_secs(2);
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_is_prompt() {
        let (mut handle, _rx) = start(Vec::new(), TopicFilter::default());
        thread::sleep(Duration::from_millis(20));

        let begin = Instant::now();
        handle.stop();
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert!(handle.is_finished());
    }

    #[test]
    fn test_dispatcher_gone_ends_loop() {
        let (tx, rx) = channel::unbounded();
        drop(rx);
        let config = AggregatorConfig {
            domain_id: 1,
            poll_interval: Duration::from_millis(10),
            filter: TopicFilter::default(),
            thread_name: "test-agg-1".to_string(),
        };
        let events = vec![FeedEvent::new(DiscoveryEvent::EndpointDisposed { key: guid(1) })];
        let feed = Box::new(ScriptedFeed {
            script: vec![Ok(events)].into(),
        });
        let handle = spawn(config, feed, tx).expect("spawn aggregator");

        let deadline = Instant::now() + Duration::from_secs(2);
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished());
    }
}

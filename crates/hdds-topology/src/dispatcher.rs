// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Event dispatcher: the single thread that owns every domain graph.
//!
//! Aggregators and the supervisor talk to it through one unbounded command
//! queue. Discovery events are applied in arrival order; each applied event
//! is followed by its notifications, delivered synchronously to every
//! subscriber before the next event is touched. Queries run as closures on
//! this thread, so the graphs never need a lock.

use crate::discovery::{DiscoveryEvent, FeedEvent};
use crate::graph::{DomainGraph, EndpointRemoved};
use crate::guid::Guid;
use crate::model::{Endpoint, Participant};
use crossbeam::channel::{self, Receiver, Sender};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Change in a domain graph, delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    NewTopic {
        domain_id: u32,
        topic_name: String,
    },
    RemovedTopic {
        domain_id: u32,
        topic_name: String,
    },
    NewEndpoint {
        domain_id: u32,
        endpoint: Endpoint,
    },
    RemovedEndpoint {
        domain_id: u32,
        key: Guid,
        topic_name: String,
    },
    NewParticipant {
        domain_id: u32,
        participant: Participant,
    },
    RemovedParticipant {
        domain_id: u32,
        key: Guid,
    },
    UpdatedParticipant {
        domain_id: u32,
        participant: Participant,
    },
    /// Current set of endpoints involved in a mismatch on the topic.
    MismatchesChanged {
        domain_id: u32,
        topic_name: String,
        endpoints: Vec<Guid>,
    },
    NoMoreMismatches {
        domain_id: u32,
        topic_name: String,
    },
}

impl Notification {
    pub fn domain_id(&self) -> u32 {
        match self {
            Self::NewTopic { domain_id, .. }
            | Self::RemovedTopic { domain_id, .. }
            | Self::NewEndpoint { domain_id, .. }
            | Self::RemovedEndpoint { domain_id, .. }
            | Self::NewParticipant { domain_id, .. }
            | Self::RemovedParticipant { domain_id, .. }
            | Self::UpdatedParticipant { domain_id, .. }
            | Self::MismatchesChanged { domain_id, .. }
            | Self::NoMoreMismatches { domain_id, .. } => *domain_id,
        }
    }

    /// Topic the notification is about, if any.
    pub fn topic_name(&self) -> Option<&str> {
        match self {
            Self::NewTopic { topic_name, .. }
            | Self::RemovedTopic { topic_name, .. }
            | Self::RemovedEndpoint { topic_name, .. }
            | Self::MismatchesChanged { topic_name, .. }
            | Self::NoMoreMismatches { topic_name, .. } => Some(topic_name),
            Self::NewEndpoint { endpoint, .. } => Some(&endpoint.topic_name),
            Self::NewParticipant { .. }
            | Self::RemovedParticipant { .. }
            | Self::UpdatedParticipant { .. } => None,
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[domain {}] ", self.domain_id())?;
        match self {
            Self::NewTopic { topic_name, .. } => write!(f, "new topic '{}'", topic_name),
            Self::RemovedTopic { topic_name, .. } => write!(f, "removed topic '{}'", topic_name),
            Self::NewEndpoint { endpoint, .. } => write!(
                f,
                "new {} {} on '{}' ({})",
                endpoint.direction, endpoint.key, endpoint.topic_name, endpoint.type_name
            ),
            Self::RemovedEndpoint {
                key, topic_name, ..
            } => write!(f, "removed endpoint {} from '{}'", key, topic_name),
            Self::NewParticipant { participant, .. } => {
                write!(f, "new participant {}", participant.key)
            }
            Self::RemovedParticipant { key, .. } => write!(f, "removed participant {}", key),
            Self::UpdatedParticipant { participant, .. } => {
                write!(f, "updated participant {}", participant.key)
            }
            Self::MismatchesChanged {
                topic_name,
                endpoints,
                ..
            } => {
                write!(f, "QoS mismatches on '{}': ", topic_name)?;
                for (i, key) in endpoints.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", key)?;
                }
                Ok(())
            }
            Self::NoMoreMismatches { topic_name, .. } => {
                write!(f, "no more QoS mismatches on '{}'", topic_name)
            }
        }
    }
}

/// Receiver of graph notifications. Called on the dispatcher thread.
pub trait Subscriber: Send {
    /// Handle one notification. Returning `false` unsubscribes.
    fn on_notification(&mut self, notification: &Notification) -> bool;
}

impl Subscriber for Sender<Notification> {
    fn on_notification(&mut self, notification: &Notification) -> bool {
        self.send(notification.clone()).is_ok()
    }
}

/// Closure run on the dispatcher thread with read access to every graph.
pub(crate) type InspectFn = Box<dyn FnOnce(&BTreeMap<u32, DomainGraph>) + Send>;

/// Messages accepted by the dispatcher thread.
pub(crate) enum Command {
    Discovery {
        domain_id: u32,
        events: Vec<FeedEvent>,
    },
    AddDomain(u32),
    RemoveDomain(u32),
    Subscribe(Box<dyn Subscriber>),
    Inspect(InspectFn),
    Shutdown,
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    pub events_applied: u64,
    pub notifications_emitted: u64,
    /// Batches that arrived for a domain no longer (or never) registered.
    pub batches_dropped: u64,
    pub queries_served: u64,
    /// Subscribers currently registered.
    pub subscribers: u64,
}

#[derive(Debug, Default)]
struct Counters {
    events_applied: AtomicU64,
    notifications_emitted: AtomicU64,
    batches_dropped: AtomicU64,
    queries_served: AtomicU64,
    subscribers: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            events_applied: self.events_applied.load(Ordering::Relaxed),
            notifications_emitted: self.notifications_emitted.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            queries_served: self.queries_served.load(Ordering::Relaxed),
            subscribers: self.subscribers.load(Ordering::Relaxed),
        }
    }
}

/// Apply one discovery event to a graph and return its notifications, in order.
pub fn apply_event(graph: &mut DomainGraph, event: DiscoveryEvent) -> Vec<Notification> {
    let domain_id = graph.domain_id();
    let mut out = Vec::new();

    match event {
        DiscoveryEvent::ParticipantArrived(participant) => {
            let key = participant.key;
            let is_new = graph.add_participant(participant);
            if let Some(participant) = graph.participant(&key).cloned() {
                out.push(if is_new {
                    Notification::NewParticipant {
                        domain_id,
                        participant,
                    }
                } else {
                    Notification::UpdatedParticipant {
                        domain_id,
                        participant,
                    }
                });
            }
        }
        DiscoveryEvent::ParticipantUpdated(update) => {
            if let Some(participant) = graph.update_participant(update) {
                out.push(Notification::UpdatedParticipant {
                    domain_id,
                    participant,
                });
            }
        }
        DiscoveryEvent::ParticipantDisposed { key } => {
            if graph.remove_participant(&key).is_some() {
                out.push(Notification::RemovedParticipant { domain_id, key });
            }
        }
        DiscoveryEvent::EndpointArrived(endpoint) => {
            let key = endpoint.key;
            let topic_name = endpoint.topic_name.clone();
            let added = graph.add_endpoint(endpoint);

            if let Some(relocated) = added.relocated {
                push_removal(&mut out, domain_id, key, relocated);
            }
            if added.topic_created {
                out.push(Notification::NewTopic {
                    domain_id,
                    topic_name: topic_name.clone(),
                });
            }
            if let Some(endpoint) = graph.endpoint(&key).cloned() {
                out.push(Notification::NewEndpoint {
                    domain_id,
                    endpoint,
                });
            }
            if let Some(endpoints) = added.mismatches {
                out.push(mismatch_notification(domain_id, topic_name, endpoints));
            }
        }
        DiscoveryEvent::EndpointDisposed { key } => {
            if let Some(removed) = graph.remove_endpoint(&key) {
                push_removal(&mut out, domain_id, key, removed);
            }
        }
    }

    out
}

fn push_removal(out: &mut Vec<Notification>, domain_id: u32, key: Guid, removed: EndpointRemoved) {
    out.push(Notification::RemovedEndpoint {
        domain_id,
        key,
        topic_name: removed.topic_name.clone(),
    });
    if removed.topic_removed {
        out.push(Notification::RemovedTopic {
            domain_id,
            topic_name: removed.topic_name,
        });
    } else {
        out.push(mismatch_notification(
            domain_id,
            removed.topic_name,
            removed.mismatches,
        ));
    }
}

fn mismatch_notification(domain_id: u32, topic_name: String, endpoints: Vec<Guid>) -> Notification {
    if endpoints.is_empty() {
        Notification::NoMoreMismatches {
            domain_id,
            topic_name,
        }
    } else {
        Notification::MismatchesChanged {
            domain_id,
            topic_name,
            endpoints,
        }
    }
}

/// State owned by the dispatcher thread.
struct DispatchState {
    graphs: BTreeMap<u32, DomainGraph>,
    subscribers: Vec<Box<dyn Subscriber>>,
    counters: Arc<Counters>,
}

impl DispatchState {
    fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Discovery { domain_id, events } => self.apply_batch(domain_id, events),
            Command::AddDomain(domain_id) => {
                self.graphs
                    .entry(domain_id)
                    .or_insert_with(|| DomainGraph::new(domain_id));
                log::debug!("[TOPO-DISPATCH] domain={} graph created", domain_id);
            }
            Command::RemoveDomain(domain_id) => {
                if self.graphs.remove(&domain_id).is_some() {
                    log::debug!("[TOPO-DISPATCH] domain={} graph dropped", domain_id);
                }
            }
            Command::Subscribe(subscriber) => {
                self.subscribers.push(subscriber);
                self.counters
                    .subscribers
                    .store(self.subscribers.len() as u64, Ordering::Relaxed);
            }
            Command::Inspect(inspect) => {
                inspect(&self.graphs);
                self.counters.queries_served.fetch_add(1, Ordering::Relaxed);
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn apply_batch(&mut self, domain_id: u32, events: Vec<FeedEvent>) {
        let Some(graph) = self.graphs.get_mut(&domain_id) else {
            self.counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "[TOPO-DISPATCH] dropped batch of {} events for unknown domain {}",
                events.len(),
                domain_id
            );
            return;
        };

        for FeedEvent { event, .. } in events {
            log::trace!("[TOPO-DISPATCH] domain={} apply {:?}", domain_id, event);
            let notifications = apply_event(graph, event);
            self.counters.events_applied.fetch_add(1, Ordering::Relaxed);

            let before = self.subscribers.len();
            for notification in &notifications {
                self.subscribers
                    .retain_mut(|subscriber| subscriber.on_notification(notification));
            }
            self.counters
                .notifications_emitted
                .fetch_add(notifications.len() as u64, Ordering::Relaxed);

            if self.subscribers.len() != before {
                log::debug!(
                    "[TOPO-DISPATCH] dropped {} closed subscribers",
                    before - self.subscribers.len()
                );
                self.counters
                    .subscribers
                    .store(self.subscribers.len() as u64, Ordering::Relaxed);
            }
        }
    }
}

/// Handle to the dispatcher thread. Shuts it down on drop.
pub struct EventDispatcher {
    tx: Sender<Command>,
    counters: Arc<Counters>,
    thread: Option<JoinHandle<()>>,
}

impl EventDispatcher {
    pub(crate) fn spawn(thread_name: String) -> io::Result<Self> {
        let (tx, rx) = channel::unbounded();
        let counters = Arc::new(Counters::default());
        let state = DispatchState {
            graphs: BTreeMap::new(),
            subscribers: Vec::new(),
            counters: Arc::clone(&counters),
        };

        let thread = thread::Builder::new()
            .name(thread_name)
            .spawn(move || run(state, rx))?;

        Ok(Self {
            tx,
            counters,
            thread: Some(thread),
        })
    }

    pub(crate) fn sender(&self) -> Sender<Command> {
        self.tx.clone()
    }

    /// Enqueue a command; false if the thread is gone.
    #[cfg(test)]
    pub(crate) fn send(&self, command: Command) -> bool {
        self.tx.send(command).is_ok()
    }

    /// Run `f` on the dispatcher thread after everything queued before it.
    ///
    /// Returns `None` if the dispatcher has stopped.
    #[cfg(test)]
    pub(crate) fn query<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&BTreeMap<u32, DomainGraph>) -> R + Send + 'static,
    {
        query(&self.tx, f)
    }

    pub fn stats(&self) -> DispatcherStats {
        self.counters.snapshot()
    }

    /// Stop the thread after it drains what is already queued.
    pub(crate) fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.tx.send(Command::Shutdown);
            if thread.join().is_err() {
                log::warn!("[TOPO-DISPATCH] dispatcher thread panicked");
            }
        }
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Marshal `f` onto the dispatcher thread and wait for its result.
pub(crate) fn query<R, F>(tx: &Sender<Command>, f: F) -> Option<R>
where
    R: Send + 'static,
    F: FnOnce(&BTreeMap<u32, DomainGraph>) -> R + Send + 'static,
{
    let (reply_tx, reply_rx) = channel::bounded(1);
    let inspect: InspectFn = Box::new(move |graphs| {
        let _ = reply_tx.send(f(graphs));
    });
    tx.send(Command::Inspect(inspect)).ok()?;
    reply_rx.recv().ok()
}

fn run(mut state: DispatchState, rx: Receiver<Command>) {
    log::debug!("[TOPO-DISPATCH] started");
    for command in rx.iter() {
        if !state.handle(command) {
            break;
        }
    }
    log::debug!(
        "[TOPO-DISPATCH] stopped ({} domains, {} subscribers)",
        state.graphs.len(),
        state.subscribers.len()
    );
}

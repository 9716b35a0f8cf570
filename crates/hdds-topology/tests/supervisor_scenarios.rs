// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::too_many_lines)] // Example/test code
#![allow(clippy::match_wildcard_for_single_variants)] // Test patterns

//! End-to-end supervisor scenarios: feed -> aggregator -> dispatcher -> subscriber.

use crossbeam::channel::Receiver;
use hdds_topology::{
    ChannelFeed, DiscoveryFeed, Direction, DomainSupervisor, Endpoint, FeedError, FeedSender,
    Guid, MismatchKind, Notification, Participant, ParticipantUpdate, QosAttributes,
    TopologyConfig, TopologyError,
};
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(3);

fn config() -> TopologyConfig {
    TopologyConfig {
        poll_interval_ms: 10,
        thread_name_prefix: "test-topo".to_string(),
        ..Default::default()
    }
}

fn running_supervisor() -> DomainSupervisor {
    let supervisor = DomainSupervisor::new(config()).expect("valid config");
    supervisor.start().expect("start");
    supervisor
}

fn attach(supervisor: &DomainSupervisor, domain_id: u32) -> FeedSender {
    let (tx, feed) = ChannelFeed::new();
    supervisor
        .add_domain_with_feed(domain_id, feed)
        .expect("add domain");
    tx
}

fn participant_key(id: u8) -> Guid {
    Guid::new([id; 12], [0, 0, 1, 0xC1])
}

fn endpoint_key(owner: u8, entity: u8) -> Guid {
    Guid::new([owner; 12], [0, 0, entity, 0x02])
}

/// Receive notifications until one satisfies `done`; returns all of them.
fn collect_until(
    rx: &Receiver<Notification>,
    done: impl Fn(&Notification) -> bool,
) -> Vec<Notification> {
    let deadline = Instant::now() + TIMEOUT;
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match rx.recv_timeout(remaining) {
            Ok(n) => {
                let finished = done(&n);
                seen.push(n);
                if finished {
                    return seen;
                }
            }
            Err(_) => panic!("timed out; received so far: {:#?}", seen),
        }
    }
}

fn is_new_endpoint(key: Guid) -> impl Fn(&Notification) -> bool {
    move |n| matches!(n, Notification::NewEndpoint { endpoint, .. } if endpoint.key == key)
}

#[test]
fn test_partition_mismatch_then_cleared() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 0);

    let w1 = Endpoint::writer(endpoint_key(1, 1), "T", "X")
        .with_qos(QosAttributes::reliable().partition(&["P1"]));
    let r1 = Endpoint::reader(endpoint_key(2, 1), "T", "X")
        .with_qos(QosAttributes::reliable().partition(&["P2"]));
    feed.endpoint_arrived(w1.clone());
    feed.endpoint_arrived(r1.clone());

    let seen = collect_until(&rx, |n| matches!(n, Notification::MismatchesChanged { .. }));
    match seen.last() {
        Some(Notification::MismatchesChanged {
            domain_id,
            topic_name,
            endpoints,
        }) => {
            assert_eq!(*domain_id, 0);
            assert_eq!(topic_name, "T");
            assert!(endpoints.contains(&w1.key));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(seen[0], Notification::NewTopic { .. }));

    let readers = supervisor.query_endpoints(0, "T", Direction::Reader).unwrap();
    assert_eq!(readers.len(), 1);
    assert_eq!(readers[0].mismatches[&w1.key], vec![MismatchKind::Partition]);
    assert_eq!(supervisor.query_mismatches(0, "T").unwrap().len(), 2);

    feed.endpoint_disposed(w1.key);
    let seen = collect_until(&rx, |n| matches!(n, Notification::NoMoreMismatches { .. }));
    assert!(matches!(
        &seen[0],
        Notification::RemovedEndpoint { key, .. } if *key == w1.key
    ));
    assert!(supervisor.query_mismatches(0, "T").unwrap().is_empty());

    supervisor.stop();
}

#[test]
fn test_update_before_participant_emits_single_new_participant() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 0);
    let key = participant_key(9);

    feed.participant_updated(ParticipantUpdate::new(key).with_property("hostname", "robot"));
    feed.participant_arrived(Participant::new(key).with_property("pid", "1234"));

    let seen = collect_until(&rx, |n| matches!(n, Notification::NewParticipant { .. }));
    assert_eq!(seen.len(), 1);
    match &seen[0] {
        Notification::NewParticipant { participant, .. } => {
            assert_eq!(participant.property("hostname"), Some("robot"));
            assert_eq!(participant.property("pid"), Some("1234"));
        }
        other => panic!("unexpected {:?}", other),
    }

    supervisor.flush().unwrap();
    assert!(rx.try_recv().is_err());
    let participants = supervisor.query_participants(0).unwrap();
    assert_eq!(participants.len(), 1);
}

#[test]
fn test_endpoint_linked_when_owner_arrives_later() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 0);
    let owner = participant_key(4);

    // Owner derived from the endpoint GUID prefix by the aggregator.
    let writer = Endpoint::writer(endpoint_key(4, 1), "T", "X");
    feed.endpoint_arrived(writer.clone());
    let seen = collect_until(&rx, is_new_endpoint(writer.key));
    match seen.last() {
        Some(Notification::NewEndpoint { endpoint, .. }) => {
            assert_eq!(endpoint.participant_key, Some(owner));
            assert!(endpoint.participant.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }

    feed.participant_arrived(Participant::new(owner).with_property("hostname", "h"));
    collect_until(&rx, |n| matches!(n, Notification::NewParticipant { .. }));

    let owned = supervisor.query_endpoints_by_participant(0, owner).unwrap();
    assert_eq!(owned.len(), 1);
    let linked = owned[0].participant.as_ref().expect("participant linked");
    assert_eq!(linked.property("hostname"), Some("h"));
}

#[test]
fn test_builtin_topics_are_filtered() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 0);

    feed.endpoint_arrived(Endpoint::writer(endpoint_key(1, 1), "DCPSPublication", ""));
    let user = Endpoint::reader(endpoint_key(1, 2), "rt/chatter", "std_msgs::String");
    feed.endpoint_arrived(user.clone());

    let seen = collect_until(&rx, is_new_endpoint(user.key));
    assert!(seen
        .iter()
        .all(|n| n.topic_name() != Some("DCPSPublication")));

    let topics = supervisor.query_topics(0).unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].name, "rt/chatter");
    assert_eq!(supervisor.stats().aggregators[&0].filtered, 1);
}

#[test]
fn test_ignored_topics_from_config() {
    let supervisor = DomainSupervisor::new(TopologyConfig {
        ignored_topics: vec!["rosout".to_string()],
        ..config()
    })
    .unwrap();
    supervisor.start().unwrap();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 0);

    feed.endpoint_arrived(Endpoint::writer(endpoint_key(1, 1), "rosout", "Log"));
    let user = Endpoint::writer(endpoint_key(1, 2), "chatter", "String");
    feed.endpoint_arrived(user.clone());

    let seen = collect_until(&rx, is_new_endpoint(user.key));
    assert!(seen.iter().all(|n| n.topic_name() != Some("rosout")));
}

#[test]
fn test_transient_feed_error_does_not_stop_domain() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 3);

    feed.send_error(FeedError::Transient("reader lost".to_string()));
    let endpoint = Endpoint::reader(endpoint_key(1, 1), "T", "X");
    feed.endpoint_arrived(endpoint.clone());

    let seen = collect_until(&rx, is_new_endpoint(endpoint.key));
    assert!(seen.iter().all(|n| n.domain_id() == 3));
    assert_eq!(supervisor.active_feeds(), vec![3]);
    assert_eq!(supervisor.stats().aggregators[&3].feed_errors, 1);
}

#[test]
fn test_closed_feed_leaves_graph_queryable() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 0);

    let endpoint = Endpoint::writer(endpoint_key(1, 1), "T", "X");
    feed.endpoint_arrived(endpoint.clone());
    drop(feed);
    collect_until(&rx, is_new_endpoint(endpoint.key));

    let deadline = Instant::now() + TIMEOUT;
    while !supervisor.active_feeds().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(supervisor.active_feeds().is_empty());
    assert_eq!(supervisor.domains(), vec![0]);
    assert_eq!(supervisor.query_topics(0).unwrap().len(), 1);
}

#[test]
fn test_remove_domain_stops_notifications() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 1);

    let endpoint = Endpoint::writer(endpoint_key(1, 1), "T", "X");
    feed.endpoint_arrived(endpoint.clone());
    collect_until(&rx, is_new_endpoint(endpoint.key));

    supervisor.remove_domain(1).unwrap();
    // The aggregator dropped its feed, so nothing more can be queued.
    assert!(!feed.endpoint_disposed(endpoint.key));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    assert!(supervisor.domains().is_empty());
    assert!(supervisor.query_topics(1).unwrap().is_empty());
    assert!(matches!(
        supervisor.remove_domain(1),
        Err(TopologyError::UnknownDomain(1))
    ));
}

#[test]
fn test_readd_during_removal_waits_for_graph_drop() {
    // A long poll keeps remove_domain inside the aggregator join for a while.
    let supervisor = DomainSupervisor::new(TopologyConfig {
        poll_interval_ms: 500,
        ..config()
    })
    .expect("valid config");
    supervisor.start().expect("start");
    let rx = supervisor.subscribe_channel().unwrap();
    let _old_feed = attach(&supervisor, 1);

    let new_feed = std::thread::scope(|scope| {
        let removal = scope.spawn(|| supervisor.remove_domain(1));

        let deadline = Instant::now() + TIMEOUT;
        let new_feed = loop {
            let (tx, feed) = ChannelFeed::new();
            match supervisor.add_domain_with_feed(1, feed) {
                Ok(()) => break tx,
                Err(TopologyError::DomainExists(1)) => {
                    assert!(Instant::now() < deadline, "domain 1 never became free");
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(other) => panic!("unexpected error {:?}", other),
            }
        };

        removal.join().expect("removal thread").expect("remove domain");
        new_feed
    });

    let writer = Endpoint::writer(endpoint_key(1, 1), "T", "X");
    new_feed.endpoint_arrived(writer.clone());
    collect_until(&rx, is_new_endpoint(writer.key));

    assert_eq!(supervisor.domains(), vec![1]);
    assert_eq!(
        supervisor
            .query_endpoints(1, "T", Direction::Writer)
            .unwrap()
            .len(),
        1
    );
    assert_eq!(supervisor.stats().dispatcher.batches_dropped, 0);
}

#[test]
fn test_domains_are_isolated() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed0 = attach(&supervisor, 0);
    let feed1 = attach(&supervisor, 1);

    let key = endpoint_key(1, 1);
    feed0.endpoint_arrived(Endpoint::writer(key, "A", "X"));
    feed1.endpoint_arrived(Endpoint::reader(key, "B", "X"));

    let mut seen = collect_until(&rx, is_new_endpoint(key));
    seen.extend(collect_until(&rx, is_new_endpoint(key)));
    let mut domains: Vec<u32> = seen
        .iter()
        .filter(|n| matches!(n, Notification::NewEndpoint { .. }))
        .map(Notification::domain_id)
        .collect();
    domains.sort_unstable();
    assert_eq!(domains, vec![0, 1]);

    assert_eq!(supervisor.query_endpoints(0, "A", Direction::Writer).unwrap().len(), 1);
    assert!(supervisor.query_endpoints(0, "B", Direction::Reader).unwrap().is_empty());
    assert_eq!(supervisor.query_endpoints(1, "B", Direction::Reader).unwrap().len(), 1);
    assert!(supervisor.query_endpoints(7, "A", Direction::Writer).unwrap().is_empty());
    assert_eq!(supervisor.domains(), vec![0, 1]);
}

#[test]
fn test_lifecycle_errors() {
    let supervisor = DomainSupervisor::new(config()).unwrap();
    let (_tx, feed) = ChannelFeed::new();
    assert!(matches!(
        supervisor.add_domain_with_feed(0, feed),
        Err(TopologyError::NotRunning)
    ));
    assert!(matches!(
        supervisor.query_topics(0),
        Err(TopologyError::NotRunning)
    ));

    supervisor.start().unwrap();
    assert!(matches!(
        supervisor.start(),
        Err(TopologyError::AlreadyRunning)
    ));

    let _feed = attach(&supervisor, 0);
    let (_tx, feed) = ChannelFeed::new();
    assert!(matches!(
        supervisor.add_domain_with_feed(0, feed),
        Err(TopologyError::DomainExists(0))
    ));
    assert!(matches!(
        supervisor.add_domain(5),
        Err(TopologyError::Feed(FeedError::Open { domain_id: 5, .. }))
    ));
    assert!(matches!(
        supervisor.remove_domain(5),
        Err(TopologyError::UnknownDomain(5))
    ));
}

#[test]
fn test_invalid_config_rejected() {
    let result = DomainSupervisor::new(TopologyConfig {
        poll_interval_ms: 0,
        ..Default::default()
    });
    assert!(matches!(result, Err(TopologyError::Config(_))));
}

#[test]
fn test_feed_provider_opens_domains() {
    let provider = |domain_id: u32| -> Result<Box<dyn DiscoveryFeed>, FeedError> {
        if domain_id > 10 {
            return Err(FeedError::Open {
                domain_id,
                reason: "out of range".to_string(),
            });
        }
        let (tx, feed) = ChannelFeed::new();
        tx.participant_arrived(Participant::new(Guid::new(
            [domain_id as u8; 12],
            [0, 0, 1, 0xC1],
        )));
        Ok(Box::new(feed))
    };
    let supervisor = DomainSupervisor::with_provider(config(), provider).unwrap();
    supervisor.start().unwrap();
    let rx = supervisor.subscribe_channel().unwrap();

    supervisor.add_domain(2).unwrap();
    let seen = collect_until(&rx, |n| matches!(n, Notification::NewParticipant { .. }));
    assert_eq!(seen[0].domain_id(), 2);

    assert!(matches!(
        supervisor.add_domain(11),
        Err(TopologyError::Feed(_))
    ));
    assert_eq!(supervisor.domains(), vec![2]);
}

#[test]
fn test_stop_joins_everything() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let _feed0 = attach(&supervisor, 0);
    let _feed1 = attach(&supervisor, 1);

    let begin = Instant::now();
    supervisor.stop();
    assert!(begin.elapsed() < TIMEOUT);

    assert!(!supervisor.is_running());
    assert!(supervisor.domains().is_empty());
    assert!(supervisor.active_feeds().is_empty());
    // Dispatcher gone: the subscriber channel is disconnected.
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    assert!(matches!(
        supervisor.subscribe_channel(),
        Err(TopologyError::NotRunning)
    ));

    // Restartable after a stop.
    supervisor.start().unwrap();
    supervisor.stop();
}

#[test]
fn test_stats_count_applied_events() {
    let supervisor = running_supervisor();
    let rx = supervisor.subscribe_channel().unwrap();
    let feed = attach(&supervisor, 0);

    let endpoint = Endpoint::writer(endpoint_key(1, 1), "T", "X");
    feed.participant_arrived(Participant::new(participant_key(1)));
    feed.endpoint_arrived(endpoint.clone());
    collect_until(&rx, is_new_endpoint(endpoint.key));
    supervisor.flush().unwrap();

    let stats = supervisor.stats();
    assert_eq!(stats.dispatcher.events_applied, 2);
    // NewParticipant, NewTopic, NewEndpoint
    assert_eq!(stats.dispatcher.notifications_emitted, 3);
    assert_eq!(stats.aggregators[&0].events, 2);
    assert_eq!(stats.dispatcher.subscribers, 1);
}

#[test]
fn test_dropped_receiver_is_unsubscribed() {
    let supervisor = running_supervisor();
    let live = supervisor.subscribe_channel().unwrap();
    drop(supervisor.subscribe_channel().unwrap());
    let feed = attach(&supervisor, 0);

    let endpoint = Endpoint::writer(endpoint_key(1, 1), "T", "X");
    feed.endpoint_arrived(endpoint.clone());
    collect_until(&live, is_new_endpoint(endpoint.key));
    supervisor.flush().unwrap();

    assert_eq!(supervisor.stats().dispatcher.subscribers, 1);
}

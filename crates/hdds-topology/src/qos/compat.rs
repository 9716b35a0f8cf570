// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! QoS compatibility checking (RxO - Request vs Offered).
//!
//! Implements DDS v1.4 Sec.2.2.3 QoS compatibility rules and reports *which*
//! policies are incompatible for a reader/writer pair, rather than a single
//! yes/no answer.
//!
//! # Compatibility Rules
//!
//! | Policy            | Incompatible when                                   |
//! |-------------------|-----------------------------------------------------|
//! | Reliability       | reader kind > writer kind                           |
//! | Durability        | reader kind > writer kind                           |
//! | Presentation      | reader scope > writer scope, or reader requires coherent/ordered access the writer lacks |
//! | Deadline          | reader period < writer period                       |
//! | Latency budget    | reader budget < writer budget                       |
//! | Ownership         | kinds differ                                        |
//! | Liveliness        | reader kind > writer kind, or reader lease < writer lease |
//! | Destination order | reader kind > writer kind                           |
//! | Partition         | no partition pair matches                           |
//! | Data repr.        | no encoding in common                               |
//! | Topic / type name | names differ (reported as `Invalid`)                |
//!
//! A policy missing on either side is not compared.

use super::partition::partitions_match;
use super::{DataRepresentation, QosAttributes};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Incompatible policy, tagged with its DDS `QosPolicyId_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum MismatchKind {
    /// Topic or type name mismatch (`INVALID_QOS_POLICY_ID`).
    Invalid = 0,
    Durability = 2,
    Presentation = 3,
    Deadline = 4,
    LatencyBudget = 5,
    Ownership = 6,
    Liveliness = 8,
    Partition = 10,
    Reliability = 11,
    DestinationOrder = 12,
    DataRepresentation = 23,
    /// Reserved for type-consistency enforcement; not produced by name checks.
    TypeConsistency = 24,
}

impl MismatchKind {
    /// Numeric policy id, used as the sort key of checker output.
    pub fn policy_id(self) -> u32 {
        self as u32
    }

    /// DDS policy name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Invalid => "INVALID",
            Self::Durability => "DURABILITY",
            Self::Presentation => "PRESENTATION",
            Self::Deadline => "DEADLINE",
            Self::LatencyBudget => "LATENCY_BUDGET",
            Self::Ownership => "OWNERSHIP",
            Self::Liveliness => "LIVELINESS",
            Self::Partition => "PARTITION",
            Self::Reliability => "RELIABILITY",
            Self::DestinationOrder => "DESTINATION_ORDER",
            Self::DataRepresentation => "DATA_REPRESENTATION",
            Self::TypeConsistency => "TYPE_CONSISTENCY_ENFORCEMENT",
        }
    }
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One side of a compatibility check: the endpoint's topic, type and QoS.
#[derive(Debug, Clone, Copy)]
pub struct MatchSide<'a> {
    pub topic_name: &'a str,
    pub type_name: &'a str,
    pub qos: &'a QosAttributes,
}

impl<'a> MatchSide<'a> {
    pub fn new(topic_name: &'a str, type_name: &'a str, qos: &'a QosAttributes) -> Self {
        Self {
            topic_name,
            type_name,
            qos,
        }
    }
}

/// Effective encodings of an advertised data representation list.
fn effective_representations(ids: &[DataRepresentation]) -> &[DataRepresentation] {
    if ids.is_empty() {
        &[DataRepresentation::Xcdr1]
    } else {
        ids
    }
}

/// Check a reader's requested QoS against a writer's offered QoS.
///
/// Returns every incompatible policy, sorted by policy id. A policy may be
/// listed more than once (e.g. Liveliness kind *and* lease); callers that
/// display the list de-duplicate it themselves.
///
/// Pure: the result depends only on the two arguments.
pub fn check_compatibility(reader: MatchSide<'_>, writer: MatchSide<'_>) -> Vec<MismatchKind> {
    let mut kinds = Vec::new();
    let (r, w) = (reader.qos, writer.qos);

    if reader.topic_name != writer.topic_name {
        kinds.push(MismatchKind::Invalid);
    }
    if !reader.type_name.is_empty()
        && !writer.type_name.is_empty()
        && reader.type_name != writer.type_name
    {
        kinds.push(MismatchKind::Invalid);
    }

    if let (Some(rk), Some(wk)) = (r.reliability, w.reliability) {
        if rk > wk {
            kinds.push(MismatchKind::Reliability);
        }
    }

    if let (Some(rk), Some(wk)) = (r.durability, w.durability) {
        if rk > wk {
            kinds.push(MismatchKind::Durability);
        }
    }

    if let (Some(rp), Some(wp)) = (r.presentation, w.presentation) {
        if rp.access_scope > wp.access_scope {
            kinds.push(MismatchKind::Presentation);
        }
        if rp.coherent_access && !wp.coherent_access {
            kinds.push(MismatchKind::Presentation);
        }
        if rp.ordered_access && !wp.ordered_access {
            kinds.push(MismatchKind::Presentation);
        }
    }

    // Reader demands a tighter period than the writer offers.
    if let (Some(rd), Some(wd)) = (r.deadline, w.deadline) {
        if rd < wd {
            kinds.push(MismatchKind::Deadline);
        }
    }

    if let (Some(rb), Some(wb)) = (r.latency_budget, w.latency_budget) {
        if rb < wb {
            kinds.push(MismatchKind::LatencyBudget);
        }
    }

    if let (Some(ro), Some(wo)) = (r.ownership, w.ownership) {
        if ro != wo {
            kinds.push(MismatchKind::Ownership);
        }
    }

    if let (Some(rl), Some(wl)) = (r.liveliness, w.liveliness) {
        if rl.kind > wl.kind {
            kinds.push(MismatchKind::Liveliness);
        }
        if rl.lease_duration < wl.lease_duration {
            kinds.push(MismatchKind::Liveliness);
        }
    }

    if let (Some(ro), Some(wo)) = (r.destination_order, w.destination_order) {
        if ro > wo {
            kinds.push(MismatchKind::DestinationOrder);
        }
    }

    if !partitions_match(&r.partition, &w.partition) {
        kinds.push(MismatchKind::Partition);
    }

    if let (Some(rr), Some(wr)) = (&r.data_representation, &w.data_representation) {
        let offered = effective_representations(wr);
        let shared = effective_representations(rr)
            .iter()
            .any(|id| offered.contains(id));
        if !shared {
            kinds.push(MismatchKind::DataRepresentation);
        }
    }

    kinds.sort_by_key(|kind| kind.policy_id());
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::{
        Durability, Liveliness, LivelinessKind, OwnershipKind, Presentation,
        PresentationAccessScope, Reliability,
    };
    use std::time::Duration;

    fn check(reader: &QosAttributes, writer: &QosAttributes) -> Vec<MismatchKind> {
        check_compatibility(
            MatchSide::new("T", "Type", reader),
            MatchSide::new("T", "Type", writer),
        )
    }

    #[test]
    fn test_reliability_best_effort_reader_reliable_writer_compatible() {
        let reader = QosAttributes::best_effort();
        let writer = QosAttributes::reliable();
        assert!(check(&reader, &writer).is_empty());
    }

    #[test]
    fn test_reliability_reliable_reader_best_effort_writer_incompatible() {
        let reader = QosAttributes::reliable();
        let writer = QosAttributes::best_effort();
        assert_eq!(check(&reader, &writer), vec![MismatchKind::Reliability]);
    }

    #[test]
    fn test_durability_ladder() {
        let reader = QosAttributes::new().durability(Durability::Transient);

        let weaker = QosAttributes::new().durability(Durability::TransientLocal);
        assert_eq!(check(&reader, &weaker), vec![MismatchKind::Durability]);

        let stronger = QosAttributes::new().durability(Durability::Persistent);
        assert!(check(&reader, &stronger).is_empty());
    }

    #[test]
    fn test_presentation_reports_each_flag() {
        let reader = QosAttributes::new().presentation(Presentation::new(
            PresentationAccessScope::Topic,
            true,
            true,
        ));
        let writer = QosAttributes::new().presentation(Presentation::new(
            PresentationAccessScope::Group,
            false,
            false,
        ));

        assert_eq!(
            check(&reader, &writer),
            vec![
                MismatchKind::Presentation,
                MismatchKind::Presentation,
                MismatchKind::Presentation
            ]
        );
    }

    #[test]
    fn test_presentation_writer_flags_may_exceed_reader() {
        let reader = QosAttributes::new().presentation(Presentation::new(
            PresentationAccessScope::Instance,
            false,
            false,
        ));
        let writer = QosAttributes::new().presentation(Presentation::new(
            PresentationAccessScope::Topic,
            true,
            true,
        ));
        assert!(check(&reader, &writer).is_empty());
    }

    #[test]
    fn test_deadline() {
        let reader = QosAttributes::new().deadline(Duration::from_millis(100));
        let slow_writer = QosAttributes::new().deadline(Duration::from_millis(200));
        let fast_writer = QosAttributes::new().deadline(Duration::from_millis(50));

        assert_eq!(check(&reader, &slow_writer), vec![MismatchKind::Deadline]);
        assert!(check(&reader, &fast_writer).is_empty());
    }

    #[test]
    fn test_latency_budget() {
        let reader = QosAttributes::new().latency_budget(Duration::from_millis(10));
        let writer = QosAttributes::new().latency_budget(Duration::from_millis(20));
        assert_eq!(check(&reader, &writer), vec![MismatchKind::LatencyBudget]);
        assert!(check(&writer, &reader).is_empty());
    }

    #[test]
    fn test_ownership_must_match_exactly() {
        let shared = QosAttributes::new().ownership(OwnershipKind::Shared);
        let exclusive = QosAttributes::new().ownership(OwnershipKind::Exclusive);

        assert_eq!(check(&shared, &exclusive), vec![MismatchKind::Ownership]);
        assert_eq!(check(&exclusive, &shared), vec![MismatchKind::Ownership]);
        assert!(check(&exclusive, &exclusive).is_empty());
    }

    #[test]
    fn test_liveliness_kind_and_lease_both_reported() {
        let reader = QosAttributes::new().liveliness(Liveliness::new(
            LivelinessKind::ManualByTopic,
            Duration::from_secs(5),
        ));
        let writer = QosAttributes::new().liveliness(Liveliness::automatic_secs(10));

        assert_eq!(
            check(&reader, &writer),
            vec![MismatchKind::Liveliness, MismatchKind::Liveliness]
        );
    }

    #[test]
    fn test_liveliness_infinite_writer_lease() {
        let reader = QosAttributes::new().liveliness(Liveliness::automatic_secs(10));
        let writer = QosAttributes::new().liveliness(Liveliness::default());
        assert_eq!(check(&reader, &writer), vec![MismatchKind::Liveliness]);
    }

    #[test]
    fn test_destination_order() {
        use crate::qos::DestinationOrderKind;
        let reader = QosAttributes::new().destination_order(DestinationOrderKind::BySourceTimestamp);
        let writer =
            QosAttributes::new().destination_order(DestinationOrderKind::ByReceptionTimestamp);
        assert_eq!(check(&reader, &writer), vec![MismatchKind::DestinationOrder]);
    }

    #[test]
    fn test_partition_mismatch() {
        let reader = QosAttributes::new().partition(&["P2"]);
        let writer = QosAttributes::new().partition(&["P1"]);
        assert_eq!(check(&reader, &writer), vec![MismatchKind::Partition]);

        let wildcard_writer = QosAttributes::new().partition(&["P*"]);
        assert!(check(&reader, &wildcard_writer).is_empty());
    }

    #[test]
    fn test_data_representation() {
        let reader = QosAttributes::new().data_representation(&[DataRepresentation::Xcdr2]);
        let writer = QosAttributes::new().data_representation(&[DataRepresentation::Xcdr1]);
        assert_eq!(check(&reader, &writer), vec![MismatchKind::DataRepresentation]);

        // An advertised empty list is the default XCDR1.
        let default_writer = QosAttributes::new().data_representation(&[]);
        let both_reader = QosAttributes::new()
            .data_representation(&[DataRepresentation::Xcdr1, DataRepresentation::Xcdr2]);
        assert!(check(&both_reader, &default_writer).is_empty());
    }

    #[test]
    fn test_missing_policies_are_skipped() {
        let reader = QosAttributes::reliable().durability(Durability::Persistent);
        let writer = QosAttributes::new();
        assert!(check(&reader, &writer).is_empty());
    }

    #[test]
    fn test_type_and_topic_name_mismatch_reported_as_invalid() {
        let qos = QosAttributes::new();
        let kinds = check_compatibility(
            MatchSide::new("T", "A", &qos),
            MatchSide::new("U", "B", &qos),
        );
        assert_eq!(kinds, vec![MismatchKind::Invalid, MismatchKind::Invalid]);

        let unknown_type =
            check_compatibility(MatchSide::new("T", "", &qos), MatchSide::new("T", "B", &qos));
        assert!(unknown_type.is_empty());
    }

    #[test]
    fn test_output_sorted_by_policy_id() {
        let reader = QosAttributes::reliable()
            .durability(Durability::TransientLocal)
            .ownership(OwnershipKind::Exclusive)
            .partition(&["a"]);
        let writer = QosAttributes::new()
            .reliability(Reliability::BestEffort)
            .durability(Durability::Volatile)
            .ownership(OwnershipKind::Shared)
            .partition(&["b"]);

        let kinds = check(&reader, &writer);
        assert_eq!(
            kinds,
            vec![
                MismatchKind::Durability,
                MismatchKind::Ownership,
                MismatchKind::Partition,
                MismatchKind::Reliability
            ]
        );
        assert!(kinds.windows(2).all(|w| w[0].policy_id() <= w[1].policy_id()));
    }

    #[test]
    fn test_check_is_deterministic() {
        let reader = QosAttributes::reliable().partition(&["x*"]);
        let writer = QosAttributes::best_effort().partition(&["y"]);
        assert_eq!(check(&reader, &writer), check(&reader, &writer));
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PARTITION matching (DDS v1.4 Sec.2.2.3.13)
//!
//! Writers and readers communicate only if some partition name of one side
//! matches some partition name of the other.
//!
//! # Matching Rules
//!
//! - An empty partition list is the implicit default partition `""`.
//! - Names may be shell-style globs: `?` matches exactly one character,
//!   `*` matches zero or more. Matching is anchored (whole string).
//! - A glob is only ever compared against a literal. Two names that both
//!   contain wildcards never match, not even when textually identical.
//!
//! Example:
//! - `["A"]` vs `["A"]` -> Compatible \[OK\]
//! - `["A*"]` vs `["ABC"]` -> Compatible \[OK\]
//! - `["A*"]` vs `["A*"]` -> Incompatible \[X\] (wildcard vs wildcard)
//! - `[]` vs `["*"]` -> Compatible \[OK\] (`*` matches the default partition)
//! - `[]` vs `["sensor"]` -> Incompatible \[X\]
//!
//! # Examples
//!
//! ```
//! use hdds_topology::qos::partitions_match;
//!
//! let writer = vec!["sensor/*".to_string()];
//! let reader = vec!["sensor/imu".to_string()];
//! assert!(partitions_match(&reader, &writer));
//! ```

/// True if the name contains glob metacharacters.
pub fn has_wildcards(name: &str) -> bool {
    name.contains(['*', '?'])
}

/// Anchored glob match of `pattern` against `text`.
///
/// Supports: * (any chars, consecutive stars collapse), ? (single char).
/// Backtracks to the most recent star on mismatch, so the cost stays
/// O(pattern * text) in the worst case.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    // (pattern index of last star, text index it is currently absorbing up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        match pattern.get(pi) {
            Some('*') => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(&p) if p == '?' || p == text[ti] => {
                pi += 1;
                ti += 1;
            }
            _ => match backtrack {
                Some((star_pi, star_ti)) => {
                    // Let the star swallow one more character and retry.
                    pi = star_pi + 1;
                    ti = star_ti + 1;
                    backtrack = Some((star_pi, star_ti + 1));
                }
                None => return false,
            },
        }
    }

    // Text exhausted: only trailing stars may remain.
    pattern[pi..].iter().all(|&c| c == '*')
}

/// Compare two partition names under the wildcard rules.
fn names_match(a: &str, b: &str) -> bool {
    match (has_wildcards(a), has_wildcards(b)) {
        (true, true) => false,
        (true, false) => glob_match(a, b),
        (false, true) => glob_match(b, a),
        (false, false) => a == b,
    }
}

/// True if the partition list reaches the default partition `""`.
///
/// An empty list *is* the default partition; otherwise some entry must match
/// the empty name (e.g. `""` itself or `"*"`).
pub fn matches_default_partition(names: &[String]) -> bool {
    names.is_empty() || names.iter().any(|name| names_match(name, ""))
}

/// Decide whether two partition lists are compatible.
///
/// The check is commutative: `partitions_match(a, b) == partitions_match(b, a)`.
pub fn partitions_match(a: &[String], b: &[String]) -> bool {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => matches_default_partition(b),
        (_, true) => matches_default_partition(a),
        _ => a
            .iter()
            .any(|name_a| b.iter().any(|name_b| names_match(name_a, name_b))),
    }
}

//! Diff planning
//!
//! [`plan`] compares a scan's persisted findings with a fresh analyzer
//! result and decides which findings to add, remove or patch. It performs no
//! I/O.

use crate::key::IdentityKey;
use a11y_types::{FieldChange, Finding, FindingId, NewFinding, ResultPatch};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Planned changes for one scan
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcilePlan {
    /// Fresh findings with no existing match
    pub to_add: Vec<NewFinding>,
    /// Existing findings with no fresh match
    pub to_remove: Vec<FindingId>,
    /// Patches for matched findings whose mutable fields changed
    pub to_update: Vec<ResultPatch>,
    /// Matched findings left untouched
    pub unchanged: usize,
    /// Fresh findings dropped because an earlier one had the same key
    pub duplicates_collapsed: usize,
}

impl ReconcilePlan {
    /// Whether applying the plan would change nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.to_update.is_empty()
    }

    /// Number of write operations
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.to_add.len() + self.to_remove.len() + self.to_update.len()
    }
}

/// Diff `existing` against `incoming`
///
/// Incoming findings sharing a key collapse to the first occurrence. When
/// several existing findings share a matched key, each is kept and patched
/// on its own.
#[must_use]
pub fn plan(existing: &[Finding], incoming: Vec<NewFinding>, now: DateTime<Utc>) -> ReconcilePlan {
    let mut result = ReconcilePlan::default();

    let mut fresh: IndexMap<IdentityKey, NewFinding> = IndexMap::with_capacity(incoming.len());
    for finding in incoming {
        let key = IdentityKey::of_new(&finding);
        if fresh.contains_key(&key) {
            tracing::trace!(fingerprint = %key.fingerprint().short(), "duplicate finding collapsed");
            result.duplicates_collapsed += 1;
        } else {
            fresh.insert(key, finding);
        }
    }

    let mut matched: HashSet<IdentityKey> = HashSet::with_capacity(existing.len());
    for current in existing {
        let key = IdentityKey::of(current);
        match fresh.get(&key) {
            Some(candidate) => {
                let changes = diff_fields(current, candidate);
                if changes.is_empty() {
                    result.unchanged += 1;
                } else {
                    tracing::trace!(
                        finding_id = %current.id,
                        fingerprint = %key.fingerprint().short(),
                        fields = changes.len(),
                        "finding changed"
                    );
                    result.to_update.push(ResultPatch {
                        id: current.id,
                        changes,
                        updated_at: now,
                    });
                }
                matched.insert(key);
            }
            None => {
                tracing::trace!(
                    finding_id = %current.id,
                    fingerprint = %key.fingerprint().short(),
                    "finding no longer reported"
                );
                result.to_remove.push(current.id);
            }
        }
    }

    result.to_add = fresh
        .into_iter()
        .filter(|(key, _)| !matched.contains(key))
        .map(|(key, finding)| {
            tracing::trace!(fingerprint = %key.fingerprint().short(), "new finding");
            finding
        })
        .collect();

    result
}

/// Mutable fields that differ between a persisted and a fresh finding
///
/// Tags compare as an ordered sequence.
#[must_use]
pub fn diff_fields(current: &Finding, fresh: &NewFinding) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if current.help != fresh.help {
        changes.push(FieldChange::Help(fresh.help.clone()));
    }
    if current.impact != fresh.impact {
        changes.push(FieldChange::Impact(fresh.impact.clone()));
    }
    if current.tags != fresh.tags {
        changes.push(FieldChange::Tags(fresh.tags.clone()));
    }
    if current.element_path != fresh.element_path {
        changes.push(FieldChange::ElementPath(fresh.element_path.clone()));
    }
    if current.details != fresh.details {
        changes.push(FieldChange::Details(fresh.details.clone()));
    }
    changes
}

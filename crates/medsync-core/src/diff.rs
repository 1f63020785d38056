//! Medication list reconciliation.
//!
//! [`MedicationDiffEngine`] holds the most recently recorded medication list
//! (the snapshot) and compares each incoming list against it by `code`:
//! - `added`: codes only in the new list, in new-list order
//! - `removed`: codes only in the snapshot, in snapshot order
//! - `changed`: codes in both whose `dose` differs, in new-list order
//!
//! Every call replaces the snapshot wholesale with an owned copy of the new
//! list. Within one incoming list the first occurrence of a code wins; later
//! duplicates are dropped.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::domain::{MedicationChange, MedicationDiff, MedicationItem};
use crate::metrics::METRICS;
use crate::obs::emit_diff_computed;

/// Stateful diff engine owning the current medication snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MedicationDiffEngine {
    snapshot: Vec<MedicationItem>,
}

impl MedicationDiffEngine {
    pub fn new(initial: Vec<MedicationItem>) -> Self {
        Self {
            snapshot: dedup_by_code(&initial),
        }
    }

    /// The list recorded by the most recent [`compute_diff`](Self::compute_diff).
    pub fn snapshot(&self) -> &[MedicationItem] {
        &self.snapshot
    }

    /// Diff `new_list` against the snapshot, then make it the snapshot.
    pub fn compute_diff(&mut self, new_list: &[MedicationItem]) -> MedicationDiff {
        let incoming = dedup_by_code(new_list);

        let previous: HashMap<&str, &MedicationItem> = self
            .snapshot
            .iter()
            .map(|item| (item.code.as_str(), item))
            .collect();
        let incoming_codes: HashSet<&str> = incoming.iter().map(|i| i.code.as_str()).collect();

        let mut diff = MedicationDiff::default();

        for item in &incoming {
            match previous.get(item.code.as_str()) {
                None => diff.added.push(item.clone()),
                Some(prev) if prev.dose != item.dose => diff.changed.push(MedicationChange {
                    from: (*prev).clone(),
                    to: item.clone(),
                }),
                Some(_) => {}
            }
        }

        diff.removed = self
            .snapshot
            .iter()
            .filter(|prev| !incoming_codes.contains(prev.code.as_str()))
            .cloned()
            .collect();

        self.snapshot = incoming;

        METRICS.inc_diffs_computed();
        emit_diff_computed(
            diff.added.len(),
            diff.removed.len(),
            diff.changed.len(),
            self.snapshot.len(),
        );
        diff
    }
}

/// Keep the first occurrence of each code, preserving order.
fn dedup_by_code(items: &[MedicationItem]) -> Vec<MedicationItem> {
    let mut seen = HashSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if seen.insert(item.code.as_str()) {
            out.push(item.clone());
        } else {
            warn!(
                event = "diff.duplicate_code",
                code = %item.code,
                dose = %item.dose,
                "dropping duplicate medication code"
            );
        }
    }
    out
}

//! Bypass re-inclusion: the always-show portfolios.
//!
//! Items set aside by the governance stage re-merge into the final set
//! without changes-only filtering. They carry a minimal classification: no
//! badge, no note, only the iteration-deadline flag computed the same way the
//! classifier layers it. Their dependencies likewise get the deadline badge
//! at most, never change classification.

use epicdiff_types::{
    is_closing_status, Badge, ClassificationRecord, DependencyItem, TrackedItem,
};

use crate::label::label_is_iteration;

/// Minimal classification for a bypass item.
pub fn bypass_record(item: &TrackedItem, iteration: u32) -> ClassificationRecord {
    let mut rec = ClassificationRecord::empty(&item.key);
    let settled = is_closing_status(&item.status)
        || item.commitment.is_deferred()
        || item.commitment.is_canceled();
    rec.iteration_risk = !settled && label_is_iteration(&item.target_iteration, iteration);
    if rec.iteration_risk {
        rec.reasons.push("due this iteration".into());
    }
    rec
}

/// Display badges for a dependency of a bypass item.
pub fn bypass_dependency_badges(dep: &DependencyItem, iteration: u32) -> Vec<Badge> {
    if !dep.is_settled() && label_is_iteration(&dep.target_iteration, iteration) {
        vec![Badge::Overdue]
    } else {
        Vec::new()
    }
}

//! Orphan pruning: dropping parents that lost their justification.
//!
//! Runs after changes-only filtering and dependency visibility. An item that
//! was only carried for the sake of at-risk dependencies loses its row when
//! those dependencies turn out to be invisible or not at risk. Never runs in
//! show-all mode.

use epicdiff_types::{ClassificationRecord, DependencyItem, TrackedItem};

/// `true` when the item no longer justifies a row of its own.
///
/// All four conditions must hold: no real change this iteration, not at an
/// at-risk rating, no continuity row (already closed or already deferred),
/// and no surviving dependency with an at-risk rating. A pruned item takes
/// its surviving dependencies with it.
pub fn is_orphan(
    item: &TrackedItem,
    record: &ClassificationRecord,
    visible_deps: &[&DependencyItem],
) -> bool {
    if record.has_real_change() {
        return false;
    }
    if item.risk_rating.is_at_risk() {
        return false;
    }
    if record.already_closed || record.already_deferred {
        return false;
    }
    // Only an at-risk surviving dependency can still justify the row.
    !visible_deps.iter().any(|d| d.risk_rating.is_at_risk())
}

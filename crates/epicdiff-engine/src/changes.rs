//! Changes-only filtering: narrowing a non-baseline report to what moved.
//!
//! Runs on the governance-retained, non-bypass item set. Dependency candidacy
//! is purely derivative here; their final visibility is resolved later by the
//! decision table.

use epicdiff_types::{Badge, ClassificationRecord, ClassificationSet, TrackedItem};

/// Decide one item. Rows run top to bottom; the first whose condition holds
/// governs inclusion.
pub fn include_item(
    item: &TrackedItem,
    record: &ClassificationRecord,
    include_at_risk: bool,
) -> bool {
    // At-risk rows ride the include_at_risk switch.
    if record.badge == Badge::AtRisk {
        return include_at_risk;
    }
    // Closures always report.
    if record.badge == Badge::Done {
        return true;
    }
    // Continued deferrals keep their row (continuity visibility).
    if record.badge == Badge::Def && record.already_deferred {
        return true;
    }
    // Cancellations always report.
    if record.badge == Badge::Canceled {
        return true;
    }
    // Any other badge is a change by definition.
    if record.badge.is_set() {
        return true;
    }
    // No badge, but the deadline flag is up.
    if record.iteration_risk {
        return true;
    }
    // Rating fallback for records where no badge registered it.
    if include_at_risk && item.risk_rating.is_at_risk() {
        return true;
    }
    false
}

/// Apply the changes-only rows to the flow-through set.
///
/// Callers skip this stage wholesale in show-all mode and on the baseline
/// iteration. Items the cache does not cover are excluded.
pub fn apply_changes_only(
    items: Vec<TrackedItem>,
    set: &ClassificationSet,
    include_at_risk: bool,
) -> Vec<TrackedItem> {
    let before = items.len();
    let kept: Vec<TrackedItem> = items
        .into_iter()
        .filter(|item| {
            set.record(&item.key)
                .map(|rec| include_item(item, rec, include_at_risk))
                .unwrap_or(false)
        })
        .collect();
    tracing::debug!(before, after = kept.len(), "Changes-only filter applied");
    kept
}

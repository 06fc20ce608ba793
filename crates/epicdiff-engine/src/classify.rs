//! Badge classification: diffing one item against its prior-iteration record.
//!
//! Each (item, iteration) pair gets exactly one badge from a priority cascade,
//! first match wins. The iteration-deadline flag is the one exception: it is
//! layered onto whichever primary badge applies, and only becomes the badge
//! itself (`OVERDUE`) when every other rule falls through.

use epicdiff_types::{
    is_closing_status, is_done_status, is_pending_status, Badge, ClassificationRecord,
    ClassificationSet, Snapshot, TrackedItem,
};

use crate::governance::GovernancePolicy;
use crate::label::label_is_iteration;

/// Display names of the tracked fields that differ between the two records.
fn changed_fields(current: &TrackedItem, previous: &TrackedItem) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if current.target_iteration != previous.target_iteration {
        changed.push("target iteration");
    }
    if current.risk_rating != previous.risk_rating {
        changed.push("risk rating");
    }
    if current.risk_note != previous.risk_note {
        changed.push("risk note");
    }
    if current.dependency_team != previous.dependency_team {
        changed.push("dependency team");
    }
    if current.fix_version != previous.fix_version {
        changed.push("fix version");
    }
    if current.commitment != previous.commitment {
        changed.push("commitment");
    }
    if current.program_increment != previous.program_increment {
        changed.push("program increment");
    }
    changed
}

/// Classify one item against its prior-iteration record.
///
/// `previous` is absent for first-seen items. Pure function of the two records
/// and the iteration number; governance stamping happens in
/// [`classify_snapshot`].
pub fn classify_item(
    current: &TrackedItem,
    previous: Option<&TrackedItem>,
    iteration: u32,
) -> ClassificationRecord {
    let mut rec = ClassificationRecord::empty(&current.key);

    let closing_now = is_closing_status(&current.status);
    let closing_before = previous
        .map(|p| is_closing_status(&p.status))
        .unwrap_or(false);
    let deferred_now = current.commitment.is_deferred();
    let deferred_before = previous.map(|p| p.commitment.is_deferred()).unwrap_or(false);
    let canceled_now = current.commitment.is_canceled();
    let canceled_before = previous.map(|p| p.commitment.is_canceled()).unwrap_or(false);

    rec.closed_this_iteration = closing_now && !closing_before;
    rec.already_closed = closing_now && closing_before;
    rec.deferred_this_iteration = deferred_now && !deferred_before;
    rec.already_deferred = deferred_now && deferred_before;
    rec.canceled_this_iteration = canceled_now && !canceled_before;
    rec.already_canceled = canceled_now && canceled_before;

    // Deadline flag first: it layers onto whichever primary badge applies.
    let still_open = !closing_now && !deferred_now && !canceled_now;
    rec.iteration_risk = still_open && label_is_iteration(&current.target_iteration, iteration);
    if rec.iteration_risk {
        rec.reasons.push("due this iteration".into());
    }

    // First seen.
    let Some(previous) = previous else {
        rec.badge = Badge::New;
        rec.note = "New this iteration".into();
        rec.reasons.insert(0, "first seen this iteration".into());
        return rec;
    };

    // Closed/done status.
    if is_done_status(&current.status) {
        rec.badge = Badge::Done;
        if rec.closed_this_iteration {
            rec.note = "Closed this iteration".into();
            rec.reasons
                .insert(0, format!("status moved to {}", current.status));
        } else {
            rec.note = "Closed in an earlier iteration".into();
            rec.reasons.insert(0, "remains closed".into());
        }
        return rec;
    }

    // Pending acceptance. "Already pending" is derived from not having closed
    // this iteration; no separate flag is tracked.
    if is_pending_status(&current.status) {
        rec.badge = Badge::Pending;
        if rec.closed_this_iteration {
            rec.note = "Pending acceptance".into();
            rec.reasons.insert(0, "awaiting acceptance".into());
        } else {
            rec.note = "Awaiting acceptance (carried over)".into();
            rec.reasons.insert(0, "still awaiting acceptance".into());
        }
        return rec;
    }

    // Deferred commitment, first occurrence or continuation.
    if deferred_now {
        rec.badge = Badge::Def;
        if rec.deferred_this_iteration {
            rec.note = "Deferred this iteration".into();
            rec.reasons
                .insert(0, format!("commitment moved to {}", current.commitment.label()));
        } else {
            rec.note = "Deferred (carried over)".into();
            rec.reasons.insert(0, "remains deferred".into());
        }
        return rec;
    }

    // Canceled commitment.
    if canceled_now {
        rec.badge = Badge::Canceled;
        if rec.canceled_this_iteration {
            rec.note = "Canceled this iteration".into();
            rec.reasons.insert(0, "commitment moved to canceled".into());
        } else {
            rec.note = "Canceled (carried over)".into();
            rec.reasons.insert(0, "remains canceled".into());
        }
        return rec;
    }

    // At-risk rating.
    if current.risk_rating.is_at_risk() {
        rec.badge = Badge::AtRisk;
        rec.note = format!("At risk ({})", current.risk_rating.label());
        rec.reasons
            .insert(0, format!("risk rating {}", current.risk_rating.label()));
        return rec;
    }

    // Tracked-field drift.
    let fields = changed_fields(current, previous);
    if !fields.is_empty() {
        rec.badge = Badge::Chg;
        rec.note = "Changed since last iteration".into();
        rec.reasons.insert(0, format!("changed: {}", fields.join(", ")));
        return rec;
    }

    // Deadline pressure alone.
    if rec.iteration_risk {
        rec.badge = Badge::Overdue;
        rec.note = "Due this iteration".into();
        return rec;
    }

    rec
}

/// Classify every item in a snapshot against the previous one.
///
/// Stamps each record with its governance resolution so the cache carries it;
/// the governance filter then consumes the cached resolution. A missing
/// previous snapshot marks the set as baseline (every item classifies `NEW`).
pub fn classify_snapshot(
    current: &Snapshot,
    previous: Option<&Snapshot>,
    policy: &GovernancePolicy,
) -> ClassificationSet {
    let mut set = ClassificationSet::new(current.iteration, previous.is_none());
    for item in &current.items {
        let prior = previous.and_then(|s| s.item(&item.key));
        let mut rec = classify_item(item, prior, current.iteration);
        rec.excluded_reason = policy.resolve_item(item);
        rec.included = rec.excluded_reason.is_none();
        set.insert(rec);
    }
    tracing::debug!(
        iteration = current.iteration,
        records = set.records.len(),
        baseline = set.baseline,
        "Snapshot classified"
    );
    set
}

//! Dependency visibility: the ordered decision table.
//!
//! Each dependency of a retained item is resolved against a fixed table,
//! evaluated top to bottom, first match wins. Rows are plain data so every one
//! is addressable from tests by name. Hidden dependencies are removed from the
//! result set entirely, not merely marked.

use epicdiff_types::{Badge, ClassificationRecord, DependencyItem};

use crate::label::label_is_iteration;

/// Why a dependency was hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideReason {
    /// Canceled before this iteration; its row disappeared for good.
    CanceledEarlier,
    /// Settled, under a parent showing no visible change of its own (an
    /// at-risk badge alone does not count).
    ParentAtRiskOnly,
}

/// Visibility decision for one dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct DepVisibility {
    pub should_show: bool,
    /// Display badges in order; the deadline badge, when present, comes first.
    pub badges: Vec<Badge>,
    pub hide_reason: Option<HideReason>,
    /// Name of the governing table row.
    pub row: &'static str,
}

struct Row {
    name: &'static str,
    applies: fn(&DependencyItem, &ClassificationRecord) -> bool,
    show: bool,
    badges: &'static [Badge],
    hide_reason: Option<HideReason>,
}

const TABLE: &[Row] = &[
    Row {
        name: "canceled_earlier",
        applies: |dep, _| dep.canceled_earlier(),
        show: false,
        badges: &[],
        hide_reason: Some(HideReason::CanceledEarlier),
    },
    Row {
        name: "canceled_now",
        applies: |dep, _| dep.canceled_this_iteration(),
        show: true,
        badges: &[Badge::Canceled],
        hide_reason: None,
    },
    Row {
        name: "deferred_now",
        applies: |dep, _| dep.deferred_this_iteration(),
        show: true,
        badges: &[Badge::Def],
        hide_reason: None,
    },
    Row {
        name: "deferred_earlier",
        applies: |dep, _| dep.deferred_earlier(),
        show: true,
        badges: &[Badge::Def],
        hide_reason: None,
    },
    Row {
        name: "done_now_parent_changed",
        applies: |dep, parent| dep.done_this_iteration() && parent.has_visible_change(),
        show: true,
        badges: &[Badge::Chg, Badge::Done],
        hide_reason: None,
    },
    Row {
        name: "done_now_parent_quiet",
        applies: |dep, _| dep.done_this_iteration(),
        show: false,
        badges: &[],
        hide_reason: Some(HideReason::ParentAtRiskOnly),
    },
    Row {
        name: "done_earlier_parent_changed",
        applies: |dep, parent| dep.done_earlier() && parent.has_visible_change(),
        show: true,
        badges: &[Badge::Done],
        hide_reason: None,
    },
    Row {
        name: "done_earlier_parent_quiet",
        applies: |dep, _| dep.done_earlier(),
        show: false,
        badges: &[],
        hide_reason: Some(HideReason::ParentAtRiskOnly),
    },
    Row {
        name: "open",
        applies: |_, _| true,
        show: true,
        badges: &[],
        hide_reason: None,
    },
];

/// Resolve one dependency against the table.
///
/// After the governing row is applied, the deadline badge (`OVERDUE`, the
/// rendering layer's RISK marker) is prepended when the dependency's own
/// target iteration falls due and it is not settled, and only on rows that
/// already show.
pub fn resolve_dependency(
    dep: &DependencyItem,
    parent: &ClassificationRecord,
    iteration: u32,
) -> DepVisibility {
    // The final row matches unconditionally, so a governing row always exists.
    let row = TABLE
        .iter()
        .find(|row| (row.applies)(dep, parent))
        .unwrap();

    let mut vis = DepVisibility {
        should_show: row.show,
        badges: row.badges.to_vec(),
        hide_reason: row.hide_reason,
        row: row.name,
    };

    if vis.should_show
        && !dep.is_settled()
        && label_is_iteration(&dep.target_iteration, iteration)
    {
        vis.badges.insert(0, Badge::Overdue);
    }
    vis
}

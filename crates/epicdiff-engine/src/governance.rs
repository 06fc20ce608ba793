//! Governance filtering: organizational inclusion policy.
//!
//! Drops items that fail the reporting agreement (explicit exclude flags plus
//! a category exclusion set with portfolio-prefix bypasses) and partitions the
//! survivors into the flow-through set and the bypass set held aside for
//! re-inclusion after changes-only filtering.

use serde::{Deserialize, Serialize};

use epicdiff_types::{
    ClassificationSet, ExclusionReason, GovernanceFlag, Snapshot, TrackedItem,
};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Inclusion policy for the governance filter.
///
/// Always an explicit injected value, never module-level state. The defaults
/// mirror the standing reporting agreement: run-the-business categories stay
/// out, designated portfolios always report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernancePolicy {
    /// Category tags dropped from every report (case-insensitive match).
    pub excluded_categories: Vec<String>,
    /// Portfolio prefixes that bypass the category rule and skip changes-only
    /// filtering (case-insensitive prefix match).
    pub bypass_prefixes: Vec<String>,
}

impl Default for GovernancePolicy {
    fn default() -> Self {
        Self {
            excluded_categories: vec!["ktlo".into(), "overhead".into(), "sustaining".into()],
            bypass_prefixes: vec!["strategic".into(), "reg-".into(), "exec-".into()],
        }
    }
}

impl GovernancePolicy {
    pub fn is_excluded_category(&self, category: &str) -> bool {
        let cat = category.trim().to_lowercase();
        if cat.is_empty() {
            return false;
        }
        self.excluded_categories
            .iter()
            .any(|c| c.trim().to_lowercase() == cat)
    }

    pub fn is_bypass_portfolio(&self, portfolio: &str) -> bool {
        let tag = portfolio.trim().to_lowercase();
        if tag.is_empty() {
            return false;
        }
        self.bypass_prefixes
            .iter()
            .any(|prefix| tag.starts_with(&prefix.trim().to_lowercase()))
    }

    /// Resolve one item against the policy: `None` keeps it, `Some` names why
    /// it is dropped. An explicit include flag overrides the category rule.
    pub fn resolve_item(&self, item: &TrackedItem) -> Option<ExclusionReason> {
        match item.governance {
            GovernanceFlag::Exclude => return Some(ExclusionReason::ExplicitFlag),
            GovernanceFlag::Include => return None,
            GovernanceFlag::Unspecified => {}
        }
        if self.is_excluded_category(&item.category) && !self.is_bypass_portfolio(&item.portfolio) {
            return Some(ExclusionReason::Category);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Result of the governance stage: the flow-through set, the bypass set held
/// aside for re-inclusion, and an audit list of exclusions.
#[derive(Debug, Clone, Default)]
pub struct GovernanceOutcome {
    pub retained: Vec<TrackedItem>,
    pub bypass: Vec<TrackedItem>,
    pub excluded: Vec<(String, ExclusionReason)>,
}

/// Apply governance to a snapshot's item set.
///
/// Pure set reduction: snapshot order is preserved and no item appears twice.
/// The classifier stamped each record with its resolution, so the cache is
/// authoritative here; items the cache does not cover are resolved live.
/// Dependencies fall with their parent and are recorded in the audit list
/// (with `ParentFlag` when the parent was explicitly excluded).
pub fn apply_governance(
    snapshot: &Snapshot,
    set: &ClassificationSet,
    policy: &GovernancePolicy,
) -> GovernanceOutcome {
    let mut outcome = GovernanceOutcome::default();
    for item in &snapshot.items {
        let reason = match set.record(&item.key) {
            Some(rec) => rec.excluded_reason,
            None => policy.resolve_item(item),
        };
        match reason {
            Some(reason) => {
                outcome.excluded.push((item.key.clone(), reason));
                for dep in snapshot.dependencies_of(&item.key) {
                    let dep_reason = if item.governance == GovernanceFlag::Exclude {
                        ExclusionReason::ParentFlag
                    } else {
                        reason
                    };
                    outcome.excluded.push((dep.key.clone(), dep_reason));
                }
            }
            None => {
                if policy.is_bypass_portfolio(&item.portfolio) {
                    outcome.bypass.push(item.clone());
                } else {
                    outcome.retained.push(item.clone());
                }
            }
        }
    }
    tracing::debug!(
        retained = outcome.retained.len(),
        bypass = outcome.bypass.len(),
        excluded = outcome.excluded.len(),
        "Governance filter applied"
    );
    outcome
}

//! Shared types and errors for the epicdiff report pipeline.
//!
//! This crate provides the foundational types used across the other epicdiff
//! crates:
//! - `EpicdiffError` — unified error taxonomy
//! - `TrackedItem` / `DependencyItem` — raw per-iteration records
//! - `Snapshot` — one iteration's immutable record set
//! - `ClassificationRecord` / `ClassificationSet` — the derived badge cache
//! - `ChangeDetail` — the field-level diff handed to the rendering layer

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unified error type for all epicdiff subsystems.
#[derive(Debug, thiserror::Error)]
pub enum EpicdiffError {
    // === Precondition failures ===
    #[error("no snapshot recorded for iteration {iteration}")]
    MissingSnapshot { iteration: u32 },

    #[error(
        "no classification cache for iteration {iteration}; \
         run classification for that iteration before requesting a changes-only report"
    )]
    MissingClassification { iteration: u32 },

    // === Configuration ===
    #[error("invalid report policy: {0}")]
    Policy(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EpicdiffError {
    /// Returns `true` for precondition failures: the caller must supply the
    /// named resource and re-invoke. The pipeline never retries on its own.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EpicdiffError::MissingSnapshot { .. } | EpicdiffError::MissingClassification { .. }
        )
    }
}

/// A convenience alias for `Result<T, EpicdiffError>`.
pub type Result<T> = std::result::Result<T, EpicdiffError>;

// ---------------------------------------------------------------------------
// Badge — the single per-item status marker
// ---------------------------------------------------------------------------

/// Status badge assigned to every (item, iteration) pair; always exactly one
/// of the nine values.
///
/// `Overdue` marks an iteration-deadline risk. On dependencies the same value
/// is the prepended risk marker; the rendering layer labels it RISK there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Badge {
    New,
    Chg,
    Done,
    Pending,
    Def,
    Canceled,
    Overdue,
    AtRisk,
    None,
}

impl Badge {
    /// Every badge value, in cascade priority order.
    pub const ALL: [Badge; 9] = [
        Badge::New,
        Badge::Done,
        Badge::Pending,
        Badge::Def,
        Badge::Canceled,
        Badge::AtRisk,
        Badge::Chg,
        Badge::Overdue,
        Badge::None,
    ];

    /// `true` for every badge except `None`.
    pub fn is_set(&self) -> bool {
        !matches!(self, Badge::None)
    }

    /// Short display label, as the rendering layer prints it.
    pub fn label(&self) -> &'static str {
        match self {
            Badge::New => "NEW",
            Badge::Chg => "CHG",
            Badge::Done => "DONE",
            Badge::Pending => "PENDING",
            Badge::Def => "DEF",
            Badge::Canceled => "CANCELED",
            Badge::Overdue => "OVERDUE",
            Badge::AtRisk => "ATRISK",
            Badge::None => "NONE",
        }
    }
}

// ---------------------------------------------------------------------------
// RiskRating / Commitment / GovernanceFlag
// ---------------------------------------------------------------------------

/// Risk rating ordered by severity: `Blank < Green < Amber < Red`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskRating {
    #[default]
    Blank,
    Green,
    Amber,
    Red,
}

impl RiskRating {
    /// Amber and red ratings count as at-risk.
    pub fn is_at_risk(&self) -> bool {
        matches!(self, RiskRating::Amber | RiskRating::Red)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskRating::Blank => "blank",
            RiskRating::Green => "green",
            RiskRating::Amber => "amber",
            RiskRating::Red => "red",
        }
    }
}

/// Commitment state of a work item within the current planning horizon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Commitment {
    Committed,
    CommittedAfterPlan,
    NotCommitted,
    Deferred,
    Canceled,
    Traded,
    #[default]
    Blank,
}

impl Commitment {
    /// The committed superset used by change-detail directional flags.
    pub fn is_committed(&self) -> bool {
        matches!(self, Commitment::Committed | Commitment::CommittedAfterPlan)
    }

    /// Deferred and traded commitments both report as deferrals.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Commitment::Deferred | Commitment::Traded)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Commitment::Canceled)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Commitment::Committed => "committed",
            Commitment::CommittedAfterPlan => "committed-after-plan",
            Commitment::NotCommitted => "not-committed",
            Commitment::Deferred => "deferred",
            Commitment::Canceled => "canceled",
            Commitment::Traded => "traded",
            Commitment::Blank => "blank",
        }
    }
}

/// Explicit governance inclusion marker carried by tracked items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GovernanceFlag {
    Include,
    Exclude,
    #[default]
    Unspecified,
}

// ---------------------------------------------------------------------------
// Status vocabulary
// ---------------------------------------------------------------------------

/// Case-insensitive status names that count as closed/done.
pub const DONE_STATUSES: &[&str] = &["done", "closed", "resolved", "complete"];

/// Case-insensitive status names that count as pending acceptance.
pub const PENDING_STATUSES: &[&str] = &[
    "pending acceptance",
    "pending approval",
    "awaiting acceptance",
];

/// `true` when `status` names a closed/done state.
pub fn is_done_status(status: &str) -> bool {
    let s = status.trim().to_lowercase();
    DONE_STATUSES.contains(&s.as_str())
}

/// `true` when `status` names a pending-acceptance state.
pub fn is_pending_status(status: &str) -> bool {
    let s = status.trim().to_lowercase();
    PENDING_STATUSES.contains(&s.as_str())
}

/// Entering the union of the done and pending sets counts as closing out.
pub fn is_closing_status(status: &str) -> bool {
    is_done_status(status) || is_pending_status(status)
}

// ---------------------------------------------------------------------------
// TrackedItem — the parent-level record
// ---------------------------------------------------------------------------

/// A parent-level work unit ("epic") as observed in one iteration's snapshot.
///
/// Records are immutable within an iteration; the next iteration supersedes
/// them with a fresh record under the same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub key: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub risk_rating: RiskRating,
    #[serde(default)]
    pub risk_note: String,
    #[serde(default)]
    pub commitment: Commitment,
    /// Free-text target iteration label, e.g. "Iteration 3". The numeric value
    /// is derived by pattern matching and may fail to extract.
    #[serde(default)]
    pub target_iteration: String,
    /// Allocation/category tag checked against the governance exclusion set.
    #[serde(default)]
    pub category: String,
    /// Portfolio tag; matched against bypass prefixes and used as the default
    /// grouping key.
    #[serde(default)]
    pub portfolio: String,
    #[serde(default)]
    pub governance: GovernanceFlag,
    #[serde(default)]
    pub initiative: Option<String>,
    #[serde(default)]
    pub dependency_team: String,
    #[serde(default)]
    pub fix_version: String,
    #[serde(default)]
    pub program_increment: String,
}

impl TrackedItem {
    /// A blank item with the given key; convenient for tests and ingestion.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            summary: String::new(),
            status: String::new(),
            risk_rating: RiskRating::Blank,
            risk_note: String::new(),
            commitment: Commitment::Blank,
            target_iteration: String::new(),
            category: String::new(),
            portfolio: String::new(),
            governance: GovernanceFlag::Unspecified,
            initiative: None,
            dependency_team: String::new(),
            fix_version: String::new(),
            program_increment: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// DependencyItem — the sub-item record
// ---------------------------------------------------------------------------

/// A sub-item owned by exactly one tracked item via `parent_key`.
///
/// The `now_*`/`was_*` transition flags are derived against the prior
/// iteration by [`observe_previous`](DependencyItem::observe_previous) at
/// snapshot-pair ingestion; snapshot producers never supply them by hand.
/// Done derives from the status vocabulary; canceled and deferred derive from
/// the commitment state, matching how parent items are classified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyItem {
    pub key: String,
    pub parent_key: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub commitment: Commitment,
    #[serde(default)]
    pub target_iteration: String,
    #[serde(default)]
    pub risk_rating: RiskRating,

    #[serde(default)]
    pub now_done: bool,
    #[serde(default)]
    pub was_done: bool,
    #[serde(default)]
    pub now_canceled: bool,
    #[serde(default)]
    pub was_canceled: bool,
    #[serde(default)]
    pub now_deferred: bool,
    #[serde(default)]
    pub was_deferred: bool,
}

impl DependencyItem {
    /// A blank dependency under the given parent.
    pub fn new(key: impl Into<String>, parent_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            parent_key: parent_key.into(),
            summary: String::new(),
            team: String::new(),
            status: String::new(),
            commitment: Commitment::Blank,
            target_iteration: String::new(),
            risk_rating: RiskRating::Blank,
            now_done: false,
            was_done: false,
            now_canceled: false,
            was_canceled: false,
            now_deferred: false,
            was_deferred: false,
        }
    }

    /// Recompute the transition flags by diffing against the record observed
    /// in the previous iteration (absent for first-seen dependencies).
    pub fn observe_previous(&mut self, previous: Option<&DependencyItem>) {
        self.now_done = is_done_status(&self.status);
        self.now_canceled = self.commitment.is_canceled();
        self.now_deferred = self.commitment.is_deferred();
        match previous {
            Some(prev) => {
                self.was_done = is_done_status(&prev.status);
                self.was_canceled = prev.commitment.is_canceled();
                self.was_deferred = prev.commitment.is_deferred();
            }
            None => {
                self.was_done = false;
                self.was_canceled = false;
                self.was_deferred = false;
            }
        }
    }

    pub fn done_this_iteration(&self) -> bool {
        self.now_done && !self.was_done
    }

    pub fn done_earlier(&self) -> bool {
        self.now_done && self.was_done
    }

    pub fn canceled_this_iteration(&self) -> bool {
        self.now_canceled && !self.was_canceled
    }

    pub fn canceled_earlier(&self) -> bool {
        self.now_canceled && self.was_canceled
    }

    pub fn deferred_this_iteration(&self) -> bool {
        self.now_deferred && !self.was_deferred
    }

    pub fn deferred_earlier(&self) -> bool {
        self.now_deferred && self.was_deferred
    }

    /// Done, canceled, or deferred: states that disarm the iteration-deadline
    /// risk badge.
    pub fn is_settled(&self) -> bool {
        self.now_done || self.now_canceled || self.now_deferred
    }
}

// ---------------------------------------------------------------------------
// Snapshot — one iteration's record set
// ---------------------------------------------------------------------------

/// One iteration's immutable record set. Read-only once the iteration closed;
/// the badge classifier consumes two adjacent snapshots (N and N−1) at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub iteration: u32,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<TrackedItem>,
    #[serde(default)]
    pub dependencies: Vec<DependencyItem>,
}

impl Snapshot {
    pub fn new(iteration: u32) -> Self {
        Self {
            iteration,
            captured_at: None,
            items: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn item(&self, key: &str) -> Option<&TrackedItem> {
        self.items.iter().find(|i| i.key == key)
    }

    pub fn dependency(&self, key: &str) -> Option<&DependencyItem> {
        self.dependencies.iter().find(|d| d.key == key)
    }

    pub fn dependencies_of<'a>(
        &'a self,
        parent_key: &'a str,
    ) -> impl Iterator<Item = &'a DependencyItem> {
        self.dependencies
            .iter()
            .filter(move |d| d.parent_key == parent_key)
    }
}

// ---------------------------------------------------------------------------
// ClassificationRecord / ClassificationSet — the derived badge cache
// ---------------------------------------------------------------------------

/// Why governance filtering dropped an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    /// The item's own governance flag says exclude.
    ExplicitFlag,
    /// The parent item's governance flag says exclude.
    ParentFlag,
    /// The category tag matches the policy exclusion set and no bypass applies.
    Category,
}

/// Derived classification for one (item, iteration) pair: the cached output
/// of the badge classifier. Recomputed wholesale, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    pub key: String,
    pub badge: Badge,
    /// Human-readable status note for the rendering layer.
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub closed_this_iteration: bool,
    #[serde(default)]
    pub already_closed: bool,
    #[serde(default)]
    pub deferred_this_iteration: bool,
    #[serde(default)]
    pub already_deferred: bool,
    #[serde(default)]
    pub canceled_this_iteration: bool,
    #[serde(default)]
    pub already_canceled: bool,
    /// The target iteration falls due this iteration while the item is still
    /// open. Layered on top of whatever primary badge applies.
    #[serde(default)]
    pub iteration_risk: bool,
    /// Why the item qualified, in display order.
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Governance resolution stamped at classification time.
    pub included: bool,
    #[serde(default)]
    pub excluded_reason: Option<ExclusionReason>,
}

impl ClassificationRecord {
    /// A record with no badge and neutral flags.
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            badge: Badge::None,
            note: String::new(),
            closed_this_iteration: false,
            already_closed: false,
            deferred_this_iteration: false,
            already_deferred: false,
            canceled_this_iteration: false,
            already_canceled: false,
            iteration_risk: false,
            reasons: Vec::new(),
            included: true,
            excluded_reason: None,
        }
    }

    /// `true` when the parent counts as visibly changed for dependency
    /// visibility: a NEW/CHG badge or a this-iteration closure/deferral.
    /// The at-risk badge alone never qualifies.
    pub fn has_visible_change(&self) -> bool {
        matches!(self.badge, Badge::New | Badge::Chg)
            || self.closed_this_iteration
            || self.deferred_this_iteration
    }

    /// `true` when the record carries any real change this iteration: a
    /// NEW/CHG/DONE/DEF badge, a this-iteration closure, deferral, or
    /// cancellation, or the iteration-risk flag.
    pub fn has_real_change(&self) -> bool {
        matches!(
            self.badge,
            Badge::New | Badge::Chg | Badge::Done | Badge::Def
        ) || self.closed_this_iteration
            || self.deferred_this_iteration
            || self.canceled_this_iteration
            || self.iteration_risk
    }
}

/// The full classification cache payload for one iteration.
///
/// Models recompute-and-overwrite: a set is regenerated as a whole and the
/// last writer wins; no partial updates exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSet {
    pub iteration: u32,
    /// `true` when no prior snapshot existed at computation time.
    #[serde(default)]
    pub baseline: bool,
    pub computed_at: DateTime<Utc>,
    /// Keyed by item key. BTreeMap keeps serialization and iteration stable.
    #[serde(default)]
    pub records: BTreeMap<String, ClassificationRecord>,
}

impl ClassificationSet {
    pub fn new(iteration: u32, baseline: bool) -> Self {
        Self {
            iteration,
            baseline,
            computed_at: Utc::now(),
            records: BTreeMap::new(),
        }
    }

    pub fn record(&self, key: &str) -> Option<&ClassificationRecord> {
        self.records.get(key)
    }

    pub fn insert(&mut self, record: ClassificationRecord) {
        self.records.insert(record.key.clone(), record);
    }

    /// Record count per badge, in cascade order, zero counts omitted.
    pub fn badge_tally(&self) -> Vec<(Badge, usize)> {
        Badge::ALL
            .iter()
            .filter_map(|badge| {
                let n = self.records.values().filter(|r| r.badge == *badge).count();
                (n > 0).then_some((*badge, n))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ChangeDetail — the transient field-level diff
// ---------------------------------------------------------------------------

/// Direction of a target-iteration move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationShift {
    /// Moved to a numerically earlier iteration.
    PulledIn,
    /// Moved to a numerically later iteration.
    PushedOut,
}

/// A plain before/after pair for one tracked field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub before: String,
    pub after: String,
}

impl FieldDelta {
    pub fn new(before: impl Into<String>, after: impl Into<String>) -> Self {
        Self {
            before: before.into(),
            after: after.into(),
        }
    }
}

/// Risk-rating move with its directional flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDelta {
    pub before: RiskRating,
    pub after: RiskRating,
    /// Amber/red moved back to green.
    pub mitigated: bool,
    /// Green or blank moved to amber/red.
    pub newly_at_risk: bool,
}

/// Commitment move with its directional flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentDelta {
    pub before: Commitment,
    pub after: Commitment,
    /// Moved into the committed superset.
    pub newly_committed: bool,
    /// Moved out of the committed superset.
    pub decommitted: bool,
}

/// Field-level diff for one displayed item. Transient: recomputed per run,
/// never persisted, and independent of upstream visibility decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_iteration: Option<FieldDelta>,
    /// `None` when the target did not move or either label failed numeric
    /// extraction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration_shift: Option<IterationShift>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_rating: Option<RatingDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_note: Option<FieldDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency_team: Option<FieldDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_version: Option<FieldDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_increment: Option<FieldDelta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<CommitmentDelta>,
}

impl ChangeDetail {
    /// `true` when any tracked field changed.
    pub fn has_changes(&self) -> bool {
        self.target_iteration.is_some()
            || self.risk_rating.is_some()
            || self.risk_note.is_some()
            || self.dependency_team.is_some()
            || self.fix_version.is_some()
            || self.program_increment.is_some()
            || self.commitment.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Error taxonomy ---

    #[test]
    fn error_display_missing_snapshot() {
        let err = EpicdiffError::MissingSnapshot { iteration: 4 };
        assert_eq!(err.to_string(), "no snapshot recorded for iteration 4");
    }

    #[test]
    fn error_display_missing_classification_names_remediation() {
        let err = EpicdiffError::MissingClassification { iteration: 2 };
        let msg = err.to_string();
        assert!(msg.contains("iteration 2"));
        assert!(msg.contains("run classification"));
    }

    #[test]
    fn precondition_classification() {
        assert!(EpicdiffError::MissingSnapshot { iteration: 1 }.is_precondition());
        assert!(EpicdiffError::MissingClassification { iteration: 1 }.is_precondition());
        assert!(!EpicdiffError::Policy("bad".into()).is_precondition());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!EpicdiffError::from(io).is_precondition());
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: EpicdiffError = json_err.into();
        assert!(matches!(err, EpicdiffError::Json(_)));
    }

    // --- Badge ---

    #[test]
    fn badge_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Badge::New).unwrap(), "\"NEW\"");
        assert_eq!(serde_json::to_string(&Badge::Chg).unwrap(), "\"CHG\"");
        assert_eq!(serde_json::to_string(&Badge::AtRisk).unwrap(), "\"ATRISK\"");
        assert_eq!(serde_json::to_string(&Badge::Def).unwrap(), "\"DEF\"");
        assert_eq!(
            serde_json::to_string(&Badge::Canceled).unwrap(),
            "\"CANCELED\""
        );
    }

    #[test]
    fn badge_deserializes_uppercase() {
        let badge: Badge = serde_json::from_str("\"OVERDUE\"").unwrap();
        assert_eq!(badge, Badge::Overdue);
    }

    #[test]
    fn badge_label_round_trip() {
        for badge in Badge::ALL {
            let json = serde_json::to_string(&badge).unwrap();
            assert_eq!(json, format!("\"{}\"", badge.label()));
        }
    }

    #[test]
    fn badge_is_set_excludes_none() {
        assert!(Badge::New.is_set());
        assert!(Badge::Overdue.is_set());
        assert!(!Badge::None.is_set());
    }

    // --- RiskRating ---

    #[test]
    fn rating_severity_ordering() {
        assert!(RiskRating::Blank < RiskRating::Green);
        assert!(RiskRating::Green < RiskRating::Amber);
        assert!(RiskRating::Amber < RiskRating::Red);
    }

    #[test]
    fn rating_at_risk_is_amber_or_red() {
        assert!(RiskRating::Amber.is_at_risk());
        assert!(RiskRating::Red.is_at_risk());
        assert!(!RiskRating::Green.is_at_risk());
        assert!(!RiskRating::Blank.is_at_risk());
    }

    // --- Commitment ---

    #[test]
    fn commitment_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Commitment::CommittedAfterPlan).unwrap(),
            "\"committed-after-plan\""
        );
        assert_eq!(
            serde_json::to_string(&Commitment::NotCommitted).unwrap(),
            "\"not-committed\""
        );
    }

    #[test]
    fn committed_superset() {
        assert!(Commitment::Committed.is_committed());
        assert!(Commitment::CommittedAfterPlan.is_committed());
        assert!(!Commitment::NotCommitted.is_committed());
        assert!(!Commitment::Blank.is_committed());
    }

    #[test]
    fn traded_counts_as_deferred() {
        assert!(Commitment::Deferred.is_deferred());
        assert!(Commitment::Traded.is_deferred());
        assert!(!Commitment::Canceled.is_deferred());
        assert!(Commitment::Canceled.is_canceled());
    }

    // --- Status vocabulary ---

    #[test]
    fn done_statuses_case_insensitive() {
        assert!(is_done_status("Done"));
        assert!(is_done_status("CLOSED"));
        assert!(is_done_status("  resolved "));
        assert!(!is_done_status("In Progress"));
        assert!(!is_done_status(""));
    }

    #[test]
    fn pending_statuses_recognized() {
        assert!(is_pending_status("Pending Acceptance"));
        assert!(is_pending_status("awaiting acceptance"));
        assert!(!is_pending_status("Open"));
    }

    #[test]
    fn closing_is_done_or_pending() {
        assert!(is_closing_status("Done"));
        assert!(is_closing_status("Pending Approval"));
        assert!(!is_closing_status("Open"));
    }

    // --- DependencyItem transitions ---

    fn dep(status: &str, commitment: Commitment) -> DependencyItem {
        let mut d = DependencyItem::new("D-1", "E-1");
        d.status = status.to_string();
        d.commitment = commitment;
        d
    }

    #[test]
    fn observe_previous_first_seen() {
        let mut d = dep("Done", Commitment::Committed);
        d.observe_previous(None);
        assert!(d.now_done);
        assert!(!d.was_done);
        assert!(d.done_this_iteration());
        assert!(!d.done_earlier());
    }

    #[test]
    fn observe_previous_done_continuation() {
        let prev = dep("Closed", Commitment::Committed);
        let mut d = dep("Closed", Commitment::Committed);
        d.observe_previous(Some(&prev));
        assert!(d.done_earlier());
        assert!(!d.done_this_iteration());
    }

    #[test]
    fn observe_previous_cancellation_transition() {
        let prev = dep("Open", Commitment::Committed);
        let mut d = dep("Open", Commitment::Canceled);
        d.observe_previous(Some(&prev));
        assert!(d.canceled_this_iteration());
        assert!(!d.canceled_earlier());
    }

    #[test]
    fn observe_previous_deferral_via_trade() {
        let prev = dep("Open", Commitment::Traded);
        let mut d = dep("Open", Commitment::Traded);
        d.observe_previous(Some(&prev));
        assert!(d.deferred_earlier());
        assert!(!d.deferred_this_iteration());
    }

    #[test]
    fn settled_covers_done_canceled_deferred() {
        let mut done = dep("Done", Commitment::Committed);
        done.observe_previous(None);
        assert!(done.is_settled());

        let mut open = dep("Open", Commitment::Committed);
        open.observe_previous(None);
        assert!(!open.is_settled());

        let mut deferred = dep("Open", Commitment::Deferred);
        deferred.observe_previous(None);
        assert!(deferred.is_settled());
    }

    // --- Snapshot ---

    #[test]
    fn snapshot_lookups() {
        let mut snap = Snapshot::new(3);
        snap.items.push(TrackedItem::new("E-1"));
        snap.items.push(TrackedItem::new("E-2"));
        snap.dependencies.push(DependencyItem::new("D-1", "E-1"));
        snap.dependencies.push(DependencyItem::new("D-2", "E-1"));
        snap.dependencies.push(DependencyItem::new("D-3", "E-2"));

        assert!(snap.item("E-1").is_some());
        assert!(snap.item("E-9").is_none());
        assert!(snap.dependency("D-3").is_some());
        assert_eq!(snap.dependencies_of("E-1").count(), 2);
        assert_eq!(snap.dependencies_of("E-2").count(), 1);
        assert_eq!(snap.dependencies_of("E-9").count(), 0);
    }

    #[test]
    fn snapshot_deserializes_with_defaults() {
        let snap: Snapshot = serde_json::from_str(r#"{"iteration": 2}"#).unwrap();
        assert_eq!(snap.iteration, 2);
        assert!(snap.items.is_empty());
        assert!(snap.dependencies.is_empty());
        assert!(snap.captured_at.is_none());
    }

    // --- ClassificationRecord ---

    #[test]
    fn empty_record_neutral() {
        let rec = ClassificationRecord::empty("E-1");
        assert_eq!(rec.badge, Badge::None);
        assert!(rec.included);
        assert!(rec.excluded_reason.is_none());
        assert!(!rec.has_real_change());
        assert!(!rec.has_visible_change());
    }

    #[test]
    fn visible_change_excludes_at_risk_badge() {
        let mut rec = ClassificationRecord::empty("E-1");
        rec.badge = Badge::AtRisk;
        assert!(!rec.has_visible_change());

        rec.badge = Badge::Chg;
        assert!(rec.has_visible_change());

        rec.badge = Badge::None;
        rec.deferred_this_iteration = true;
        assert!(rec.has_visible_change());
    }

    #[test]
    fn real_change_includes_iteration_risk() {
        let mut rec = ClassificationRecord::empty("E-1");
        rec.iteration_risk = true;
        assert!(rec.has_real_change());
        assert!(!rec.has_visible_change());
    }

    #[test]
    fn fresh_cancellation_is_real_change_but_continuation_is_not() {
        let mut rec = ClassificationRecord::empty("E-1");
        rec.badge = Badge::Canceled;
        rec.canceled_this_iteration = true;
        assert!(rec.has_real_change());

        rec.canceled_this_iteration = false;
        rec.already_canceled = true;
        assert!(!rec.has_real_change());
    }

    // --- ClassificationSet ---

    #[test]
    fn set_insert_and_lookup() {
        let mut set = ClassificationSet::new(2, false);
        let mut rec = ClassificationRecord::empty("E-1");
        rec.badge = Badge::Done;
        set.insert(rec);

        assert_eq!(set.record("E-1").unwrap().badge, Badge::Done);
        assert!(set.record("E-2").is_none());
        assert!(!set.baseline);
    }

    #[test]
    fn badge_tally_skips_zero_counts() {
        let mut set = ClassificationSet::new(1, true);
        for key in ["E-1", "E-2"] {
            let mut rec = ClassificationRecord::empty(key);
            rec.badge = Badge::New;
            set.insert(rec);
        }
        let mut rec = ClassificationRecord::empty("E-3");
        rec.badge = Badge::Done;
        set.insert(rec);

        let tally = set.badge_tally();
        assert_eq!(tally, vec![(Badge::New, 2), (Badge::Done, 1)]);
    }

    #[test]
    fn set_serialization_is_stable() {
        let mut set = ClassificationSet::new(2, false);
        set.insert(ClassificationRecord::empty("E-2"));
        set.insert(ClassificationRecord::empty("E-1"));

        let json = serde_json::to_string(&set).unwrap();
        // BTreeMap serializes keys sorted, independent of insertion order.
        let e1 = json.find("\"E-1\"").unwrap();
        let e2 = json.find("\"E-2\"").unwrap();
        assert!(e1 < e2);
    }

    // --- ChangeDetail ---

    #[test]
    fn change_detail_default_has_no_changes() {
        assert!(!ChangeDetail::default().has_changes());
    }

    #[test]
    fn change_detail_any_field_counts() {
        let detail = ChangeDetail {
            risk_note: Some(FieldDelta::new("", "slipping")),
            ..ChangeDetail::default()
        };
        assert!(detail.has_changes());
    }

    #[test]
    fn change_detail_skips_absent_fields_in_json() {
        let detail = ChangeDetail {
            commitment: Some(CommitmentDelta {
                before: Commitment::Committed,
                after: Commitment::Deferred,
                newly_committed: false,
                decommitted: true,
            }),
            ..ChangeDetail::default()
        };
        let json = serde_json::to_string(&detail).unwrap();
        assert!(json.contains("commitment"));
        assert!(!json.contains("risk_rating"));
    }

    #[test]
    fn iteration_shift_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&IterationShift::PulledIn).unwrap(),
            "\"pulled_in\""
        );
        assert_eq!(
            serde_json::to_string(&IterationShift::PushedOut).unwrap(),
            "\"pushed_out\""
        );
    }
}

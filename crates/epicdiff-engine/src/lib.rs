//! Report pipeline: classification, filtering, visibility, and grouping.
//!
//! This crate implements the core epicdiff report stages: badge
//! classification over snapshot pairs, governance filtering, changes-only
//! narrowing, the dependency visibility table, orphan pruning, change
//! details, bypass re-inclusion, and grouping, plus the JSON-backed stores
//! that feed them.

pub mod bypass;
pub mod changes;
pub mod classify;
pub mod detail;
pub mod engine;
pub mod governance;
pub mod grouping;
pub mod label;
pub mod prune;
pub mod store;
pub mod visibility;

pub use bypass::{bypass_dependency_badges, bypass_record};
pub use changes::{apply_changes_only, include_item};
pub use classify::{classify_item, classify_snapshot};
pub use detail::build_detail;
pub use engine::{
    DependencyEntry, Report, ReportEngine, ReportEntry, ReportGroup, ReportOptions, ReportSummary,
};
pub use governance::{apply_governance, GovernanceOutcome, GovernancePolicy};
pub use grouping::{group_entries, GroupBy, OrderingPolicy, UNGROUPED};
pub use label::{label_is_iteration, parse_iteration_label};
pub use prune::is_orphan;
pub use store::{
    load_policy, ClassificationStore, JsonDataStore, MemoryStore, ReportPolicy, SnapshotSource,
};
pub use visibility::{resolve_dependency, DepVisibility, HideReason};

//! Report assembly: the stage driver.
//!
//! Runs the fixed stage order on one iteration pair: classify (or read the
//! cache), governance filter, changes-only filter, dependency resolution,
//! orphan pruning, change details, bypass re-inclusion, grouping. Everything
//! is synchronous and single-threaded; a report run never mutates stored
//! snapshots and never writes the classification cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use epicdiff_types::{
    Badge, ChangeDetail, ClassificationRecord, ClassificationSet, DependencyItem, EpicdiffError,
    ExclusionReason, Result, Snapshot, TrackedItem,
};

use crate::bypass::{bypass_dependency_badges, bypass_record};
use crate::changes::apply_changes_only;
use crate::classify::classify_snapshot;
use crate::detail::build_detail;
use crate::governance::{apply_governance, GovernancePolicy};
use crate::grouping::{group_entries, GroupBy, OrderingPolicy};
use crate::prune::is_orphan;
use crate::store::{ClassificationStore, SnapshotSource};
use crate::visibility::resolve_dependency;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Per-run report switches. Defaults produce the regular changes-only report.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Show every retained item; skips the changes-only filter and the
    /// orphan pruner.
    pub show_all: bool,
    /// Keep carried-over at-risk items in a changes-only report.
    pub include_at_risk: bool,
    pub group_by: GroupBy,
    pub ordering: OrderingPolicy,
}

/// A dependency row that survived visibility resolution, with its display
/// badges in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub item: DependencyItem,
    pub badges: Vec<Badge>,
}

/// One report row: the item, its classification, its iteration-over-iteration
/// details, and its visible dependencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub item: TrackedItem,
    pub record: ClassificationRecord,
    pub detail: ChangeDetail,
    pub dependencies: Vec<DependencyEntry>,
}

/// A named group of report rows; rows are key-ordered within the group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportGroup {
    pub key: String,
    pub entries: Vec<ReportEntry>,
}

/// Roll-up counts over the rows that made it into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_items: usize,
    pub total_dependencies: usize,
    pub group_count: usize,
    /// Badge counts in cascade order; zero counts are omitted.
    pub badges: Vec<(Badge, usize)>,
}

/// A fully assembled iteration report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub iteration: u32,
    /// First recorded iteration: no prior snapshot, every item is new.
    pub baseline: bool,
    pub generated_at: DateTime<Utc>,
    pub groups: Vec<ReportGroup>,
    /// Audit list of governance exclusions, parent items and their
    /// dependencies alike.
    pub excluded: Vec<(String, ExclusionReason)>,
    pub summary: ReportSummary,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn summarize(groups: &[ReportGroup]) -> ReportSummary {
    let total_items: usize = groups.iter().map(|g| g.entries.len()).sum();
    let total_dependencies: usize = groups
        .iter()
        .flat_map(|g| g.entries.iter())
        .map(|e| e.dependencies.len())
        .sum();
    let mut badges = Vec::new();
    for badge in Badge::ALL {
        let count = groups
            .iter()
            .flat_map(|g| g.entries.iter())
            .filter(|e| e.record.badge == badge)
            .count();
        if count > 0 {
            badges.push((badge, count));
        }
    }
    ReportSummary {
        total_items,
        total_dependencies,
        group_count: groups.len(),
        badges,
    }
}

// ---------------------------------------------------------------------------
// ReportEngine
// ---------------------------------------------------------------------------

/// The stage driver. Borrows its two collaborators and owns the governance
/// policy for the run.
pub struct ReportEngine<'a> {
    snapshots: &'a dyn SnapshotSource,
    cache: &'a dyn ClassificationStore,
    policy: GovernancePolicy,
}

impl<'a> ReportEngine<'a> {
    pub fn new(
        snapshots: &'a dyn SnapshotSource,
        cache: &'a dyn ClassificationStore,
        policy: GovernancePolicy,
    ) -> Self {
        Self {
            snapshots,
            cache,
            policy,
        }
    }

    fn previous_snapshot(&self, iteration: u32) -> Result<Option<Snapshot>> {
        if iteration == 0 {
            return Ok(None);
        }
        self.snapshots.snapshot(iteration - 1)
    }

    /// Classify one iteration against its predecessor and overwrite the cache.
    ///
    /// The snapshot for `iteration` must exist; a missing predecessor makes
    /// this the baseline iteration.
    pub fn classify_iteration(&self, iteration: u32) -> Result<ClassificationSet> {
        let current = self
            .snapshots
            .snapshot(iteration)?
            .ok_or(EpicdiffError::MissingSnapshot { iteration })?;
        let previous = self.previous_snapshot(iteration)?;

        let set = classify_snapshot(&current, previous.as_ref(), &self.policy);
        self.cache.write(&set)?;
        Ok(set)
    }

    /// Assemble the report for one iteration.
    ///
    /// A changes-only report (the default) requires the classification cache;
    /// baseline and show-all reports classify in memory when the cache is
    /// absent, without persisting the result.
    pub fn build_report(&self, iteration: u32, options: &ReportOptions) -> Result<Report> {
        // Stage 0: load the snapshot pair and derive dependency transitions.
        let mut current = self
            .snapshots
            .snapshot(iteration)?
            .ok_or(EpicdiffError::MissingSnapshot { iteration })?;
        let previous = self.previous_snapshot(iteration)?;
        let baseline = previous.is_none();

        for dep in &mut current.dependencies {
            let prior = previous.as_ref().and_then(|s| s.dependency(&dep.key));
            dep.observe_previous(prior);
        }

        // Dependencies whose parent never appears are dropped wholesale; the
        // count is the only trace they leave.
        let unparented = current
            .dependencies
            .iter()
            .filter(|d| current.item(&d.parent_key).is_none())
            .count();
        if unparented > 0 {
            tracing::debug!(
                count = unparented,
                "Dropping dependencies with no parent item in the snapshot"
            );
        }

        let skip_changes = options.show_all || baseline;

        // Stage 1: classification, cached or recomputed in memory.
        let set = match self.cache.read(iteration)? {
            Some(set) => set,
            None if skip_changes => classify_snapshot(&current, previous.as_ref(), &self.policy),
            None => return Err(EpicdiffError::MissingClassification { iteration }),
        };

        // Stage 2: governance filter.
        let outcome = apply_governance(&current, &set, &self.policy);
        let excluded = outcome.excluded;

        // Stage 3: changes-only filter.
        let flow = if skip_changes {
            outcome.retained
        } else {
            apply_changes_only(outcome.retained, &set, options.include_at_risk)
        };

        // Stages 4-6: dependency visibility, orphan pruning, change details.
        let mut entries: Vec<ReportEntry> = Vec::new();
        for item in flow {
            let record = set
                .record(&item.key)
                .cloned()
                .unwrap_or_else(|| ClassificationRecord::empty(&item.key));

            let mut dependencies = Vec::new();
            let mut visible: Vec<&DependencyItem> = Vec::new();
            for dep in current.dependencies_of(&item.key) {
                let vis = resolve_dependency(dep, &record, iteration);
                if vis.should_show {
                    visible.push(dep);
                    dependencies.push(DependencyEntry {
                        item: dep.clone(),
                        badges: vis.badges,
                    });
                }
            }

            if !skip_changes && is_orphan(&item, &record, &visible) {
                tracing::debug!(key = %item.key, "Pruned unchanged item");
                continue;
            }

            let detail = build_detail(&item, previous.as_ref().and_then(|s| s.item(&item.key)));
            entries.push(ReportEntry {
                item,
                record,
                detail,
                dependencies,
            });
        }

        // Stage 7: bypass re-inclusion, after filtering and pruning.
        for item in outcome.bypass {
            let record = bypass_record(&item, iteration);
            let dependencies = current
                .dependencies_of(&item.key)
                .map(|dep| DependencyEntry {
                    badges: bypass_dependency_badges(dep, iteration),
                    item: dep.clone(),
                })
                .collect();
            entries.push(ReportEntry {
                item,
                record,
                detail: ChangeDetail::default(),
                dependencies,
            });
        }

        // Stage 8: grouping. Key order within groups keeps runs deterministic.
        entries.sort_by(|a, b| a.item.key.cmp(&b.item.key));
        let groups: Vec<ReportGroup> = group_entries(
            entries,
            |e: &ReportEntry| options.group_by.key_for(&e.item),
            &options.ordering,
        )
        .into_iter()
        .map(|(key, entries)| ReportGroup { key, entries })
        .collect();

        let summary = summarize(&groups);
        tracing::debug!(
            iteration,
            baseline,
            groups = summary.group_count,
            items = summary.total_items,
            "Report built"
        );

        Ok(Report {
            iteration,
            baseline,
            generated_at: Utc::now(),
            groups,
            excluded,
            summary,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use epicdiff_types::{Commitment, RiskRating};

    fn item(key: &str) -> TrackedItem {
        let mut it = TrackedItem::new(key);
        it.status = "Open".to_string();
        it.portfolio = "Core".to_string();
        it
    }

    fn snapshot(iteration: u32, items: Vec<TrackedItem>, deps: Vec<DependencyItem>) -> Snapshot {
        let mut snap = Snapshot::new(iteration);
        snap.items = items;
        snap.dependencies = deps;
        snap
    }

    fn engine(store: &MemoryStore) -> ReportEngine<'_> {
        ReportEngine::new(store, store, GovernancePolicy::default())
    }

    fn report_keys(report: &Report) -> Vec<String> {
        report
            .groups
            .iter()
            .flat_map(|g| g.entries.iter())
            .map(|e| e.item.key.clone())
            .collect()
    }

    fn entry<'r>(report: &'r Report, key: &str) -> &'r ReportEntry {
        report
            .groups
            .iter()
            .flat_map(|g| g.entries.iter())
            .find(|e| e.item.key == key)
            .unwrap_or_else(|| panic!("Expected {key} in the report"))
    }

    // Test 1: Missing snapshot is a precondition failure with remediation.
    #[test]
    fn missing_snapshot_is_a_precondition_failure() {
        let store = MemoryStore::new();
        let err = engine(&store)
            .build_report(5, &ReportOptions::default())
            .unwrap_err();

        assert!(err.is_precondition());
        match err {
            EpicdiffError::MissingSnapshot { iteration } => assert_eq!(iteration, 5),
            other => panic!("Expected MissingSnapshot, got: {other:?}"),
        }
    }

    // Test 2: Classification persists to the cache and overwrites prior runs.
    #[test]
    fn classify_writes_the_cache() {
        let store = MemoryStore::new();
        store.add_snapshot(snapshot(1, vec![item("E-1")], vec![]));

        let set = engine(&store).classify_iteration(1).unwrap();
        assert!(set.baseline);

        let cached = store.read(1).unwrap().unwrap();
        assert_eq!(cached.records.len(), 1);
        assert_eq!(cached.record("E-1").unwrap().badge, Badge::New);
    }

    // Test 3: A changes-only report without the cache refuses to run.
    #[test]
    fn changes_only_without_cache_is_a_precondition_failure() {
        let store = MemoryStore::new();
        store.add_snapshot(snapshot(1, vec![item("E-1")], vec![]));
        store.add_snapshot(snapshot(2, vec![item("E-1")], vec![]));

        let err = engine(&store)
            .build_report(2, &ReportOptions::default())
            .unwrap_err();

        assert!(err.is_precondition());
        let msg = err.to_string();
        assert!(
            msg.contains("run classification"),
            "Expected remediation in the message, got: {msg}"
        );
    }

    // Test 4: Baseline reports classify in memory; everything lands as NEW.
    #[test]
    fn baseline_report_classifies_in_memory() {
        let store = MemoryStore::new();
        store.add_snapshot(snapshot(1, vec![item("E-1"), item("E-2")], vec![]));

        let report = engine(&store)
            .build_report(1, &ReportOptions::default())
            .unwrap();

        assert!(report.baseline);
        assert_eq!(report_keys(&report), vec!["E-1", "E-2"]);
        assert_eq!(entry(&report, "E-1").record.badge, Badge::New);
        // The in-memory set is not persisted.
        assert!(store.read(1).unwrap().is_none());
    }

    // Test 5: Show-all likewise classifies live when the cache is absent.
    #[test]
    fn show_all_report_classifies_in_memory() {
        let store = MemoryStore::new();
        store.add_snapshot(snapshot(1, vec![item("E-1")], vec![]));
        store.add_snapshot(snapshot(2, vec![item("E-1")], vec![]));

        let options = ReportOptions {
            show_all: true,
            ..ReportOptions::default()
        };
        let report = engine(&store).build_report(2, &options).unwrap();

        assert!(!report.baseline);
        assert_eq!(report_keys(&report), vec!["E-1"]);
        assert_eq!(entry(&report, "E-1").record.badge, Badge::None);
    }

    // Test 6: Quiet items are pruned from the changes-only report but kept
    // under show-all.
    #[test]
    fn quiet_item_pruned_unless_show_all() {
        let store = MemoryStore::new();
        store.add_snapshot(snapshot(1, vec![item("E-1"), item("E-2")], vec![]));
        let mut changed = item("E-1");
        changed.fix_version = "2.4".to_string();
        store.add_snapshot(snapshot(2, vec![changed, item("E-2")], vec![]));

        let eng = engine(&store);
        eng.classify_iteration(2).unwrap();

        let report = eng.build_report(2, &ReportOptions::default()).unwrap();
        assert_eq!(report_keys(&report), vec!["E-1"]);
        assert_eq!(entry(&report, "E-1").record.badge, Badge::Chg);

        let all = ReportOptions {
            show_all: true,
            ..ReportOptions::default()
        };
        let report = eng.build_report(2, &all).unwrap();
        assert_eq!(report_keys(&report), vec!["E-1", "E-2"]);
    }

    // Test 7: An at-risk surviving dependency anchors a carried cancellation;
    // without one the row prunes, and dependencies never outlive their parent.
    #[test]
    fn at_risk_dependency_anchors_carried_cancellation() {
        let store = MemoryStore::new();
        let mut c1 = item("E-1");
        c1.commitment = Commitment::Canceled;
        let mut c2 = item("E-2");
        c2.commitment = Commitment::Canceled;

        let mut amber_dep = DependencyItem::new("D-1", "E-1");
        amber_dep.status = "Open".to_string();
        amber_dep.risk_rating = RiskRating::Amber;
        let mut green_dep = DependencyItem::new("D-2", "E-2");
        green_dep.status = "Open".to_string();

        let items = vec![c1, c2];
        let deps = vec![amber_dep, green_dep];
        store.add_snapshot(snapshot(1, items.clone(), deps.clone()));
        store.add_snapshot(snapshot(2, items, deps));

        let eng = engine(&store);
        eng.classify_iteration(2).unwrap();
        let report = eng.build_report(2, &ReportOptions::default()).unwrap();

        // E-1's amber dependency defeats the pruner; E-2 prunes and takes
        // its green dependency with it.
        assert_eq!(report_keys(&report), vec!["E-1"]);
        assert_eq!(entry(&report, "E-1").dependencies[0].item.key, "D-1");
        assert_eq!(report.summary.total_dependencies, 1);
    }

    // Test 8: A cancellation is reported the iteration it happens, then the
    // carried row prunes away.
    #[test]
    fn canceled_continuation_prunes_after_first_report() {
        let store = MemoryStore::new();
        let mut canceled = item("E-1");
        canceled.commitment = Commitment::Canceled;

        store.add_snapshot(snapshot(1, vec![item("E-1"), item("E-2")], vec![]));
        store.add_snapshot(snapshot(2, vec![canceled.clone(), item("E-2")], vec![]));
        store.add_snapshot(snapshot(3, vec![canceled, item("E-2")], vec![]));

        let eng = engine(&store);

        eng.classify_iteration(2).unwrap();
        let report = eng.build_report(2, &ReportOptions::default()).unwrap();
        assert!(report_keys(&report).contains(&"E-1".to_string()));
        assert_eq!(entry(&report, "E-1").record.badge, Badge::Canceled);

        eng.classify_iteration(3).unwrap();
        let report = eng.build_report(3, &ReportOptions::default()).unwrap();
        assert!(!report_keys(&report).contains(&"E-1".to_string()));
    }

    // Test 9: Bypass portfolios reappear with a plain badge and deadline-only
    // dependency badges, even with nothing changed.
    #[test]
    fn bypass_items_rejoin_with_plain_badges() {
        let store = MemoryStore::new();
        let mut strategic = item("S-1");
        strategic.portfolio = "Strategic Alpha".to_string();
        let mut dep = DependencyItem::new("D-1", "S-1");
        dep.status = "Open".to_string();
        dep.target_iteration = "Iteration 2".to_string();

        store.add_snapshot(snapshot(1, vec![strategic.clone()], vec![dep.clone()]));
        store.add_snapshot(snapshot(2, vec![strategic], vec![dep]));

        let eng = engine(&store);
        eng.classify_iteration(2).unwrap();
        let report = eng.build_report(2, &ReportOptions::default()).unwrap();

        let entry = entry(&report, "S-1");
        assert_eq!(entry.record.badge, Badge::None);
        assert!(!entry.record.iteration_risk);
        assert_eq!(entry.dependencies[0].badges, vec![Badge::Overdue]);
    }

    // Test 10: Governance exclusions land in the audit list, not the groups.
    #[test]
    fn excluded_items_land_in_the_audit_list() {
        let store = MemoryStore::new();
        let mut ktlo = item("E-9");
        ktlo.category = "KTLO".to_string();
        store.add_snapshot(snapshot(1, vec![item("E-1"), ktlo], vec![]));

        let report = engine(&store)
            .build_report(1, &ReportOptions::default())
            .unwrap();

        assert_eq!(report_keys(&report), vec!["E-1"]);
        assert_eq!(
            report.excluded,
            vec![("E-9".to_string(), ExclusionReason::Category)]
        );
    }

    // Test 11: Two runs over the same inputs produce identical groups.
    #[test]
    fn report_is_deterministic() {
        let store = MemoryStore::new();
        let mut changed = item("E-1");
        changed.risk_note = "slipping".to_string();
        store.add_snapshot(snapshot(1, vec![item("E-1"), item("E-2")], vec![]));
        store.add_snapshot(snapshot(2, vec![changed, item("E-2")], vec![]));

        let eng = engine(&store);
        eng.classify_iteration(2).unwrap();

        let first = eng.build_report(2, &ReportOptions::default()).unwrap();
        let second = eng.build_report(2, &ReportOptions::default()).unwrap();

        assert_eq!(
            serde_json::to_value(&first.groups).unwrap(),
            serde_json::to_value(&second.groups).unwrap()
        );
        assert_eq!(first.summary, second.summary);
    }

    // Test 12: The summary tallies badges over the rows actually shown, in
    // cascade order.
    #[test]
    fn summary_tallies_shown_badges() {
        let store = MemoryStore::new();
        let mut changed = item("E-1");
        changed.fix_version = "2.4".to_string();
        let mut done = item("E-2");
        done.status = "Done".to_string();
        let before = vec![item("E-1"), item("E-2"), item("E-3")];
        store.add_snapshot(snapshot(1, before, vec![]));
        store.add_snapshot(snapshot(2, vec![changed, done, item("E-3")], vec![]));

        let eng = engine(&store);
        eng.classify_iteration(2).unwrap();
        let report = eng.build_report(2, &ReportOptions::default()).unwrap();

        // E-3 is quiet and filtered out; the other two tally.
        assert_eq!(report.summary.total_items, 2);
        assert_eq!(report.summary.group_count, 1);
        assert_eq!(
            report.summary.badges,
            vec![(Badge::Done, 1), (Badge::Chg, 1)]
        );
    }
}

//! Report grouping and ordering.
//!
//! The final entry set is partitioned by a caller-specified key and the
//! groups are ordered alphabetically or by an explicit rank map. Ranks tie
//! and unranked keys fall back to alphabetical, unranked keys sorting last.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use epicdiff_types::{EpicdiffError, TrackedItem};

/// Bucket label for items whose grouping field is blank.
pub const UNGROUPED: &str = "(none)";

/// Grouping key for the final report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Portfolio,
    Category,
    Initiative,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Portfolio => "portfolio",
            GroupBy::Category => "category",
            GroupBy::Initiative => "initiative",
        }
    }

    /// The group key for one item; blank fields collect under [`UNGROUPED`].
    pub fn key_for(&self, item: &TrackedItem) -> String {
        let raw = match self {
            GroupBy::Portfolio => item.portfolio.clone(),
            GroupBy::Category => item.category.clone(),
            GroupBy::Initiative => item.initiative.clone().unwrap_or_default(),
        };
        if raw.trim().is_empty() {
            UNGROUPED.to_string()
        } else {
            raw
        }
    }
}

impl FromStr for GroupBy {
    type Err = EpicdiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "portfolio" => Ok(GroupBy::Portfolio),
            "category" => Ok(GroupBy::Category),
            "initiative" => Ok(GroupBy::Initiative),
            other => Err(EpicdiffError::Policy(format!(
                "unknown group key '{other}' (expected portfolio, category, or initiative)"
            ))),
        }
    }
}

/// How group keys are ordered in the report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "ranks", rename_all = "lowercase")]
pub enum OrderingPolicy {
    #[default]
    Alphabetical,
    /// Explicit ranks; lower ranks first.
    Ranked(BTreeMap<String, u32>),
}

impl OrderingPolicy {
    pub fn sort_keys(&self, keys: &mut [String]) {
        match self {
            OrderingPolicy::Alphabetical => keys.sort(),
            OrderingPolicy::Ranked(ranks) => keys.sort_by(|a, b| {
                let ra = ranks.get(a).copied().unwrap_or(u32::MAX);
                let rb = ranks.get(b).copied().unwrap_or(u32::MAX);
                ra.cmp(&rb).then_with(|| a.cmp(b))
            }),
        }
    }
}

/// Partition entries into ordered groups.
///
/// Within-group order is the caller's input order; group order follows the
/// policy.
pub fn group_entries<T>(
    entries: Vec<T>,
    key_of: impl Fn(&T) -> String,
    ordering: &OrderingPolicy,
) -> Vec<(String, Vec<T>)> {
    let mut buckets: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for entry in entries {
        buckets.entry(key_of(&entry)).or_default().push(entry);
    }
    let mut keys: Vec<String> = buckets.keys().cloned().collect();
    ordering.sort_keys(&mut keys);
    keys.into_iter()
        .filter_map(|key| buckets.remove(&key).map(|group| (key, group)))
        .collect()
}

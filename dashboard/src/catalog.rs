use std::collections::{BTreeMap, BTreeSet};

use crate::records::NormalizedRecord;

pub type FunctionId = String;

/// Every distinct function name, sorted.
pub fn all_functions(records: &[NormalizedRecord]) -> Vec<FunctionId> {
    records
        .iter()
        .map(|r| r.function_name.clone())
        .collect::<BTreeSet<_>>() // de-dupe + sort
        .into_iter()
        .collect()
}

pub fn call_counts(records: &[NormalizedRecord]) -> BTreeMap<FunctionId, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.function_name.clone()).or_insert(0) += 1;
    }
    counts
}

/// Functions called at least `min_calls` times. `min_calls <= 0` keeps
/// everything.
pub fn functions_above_threshold(records: &[NormalizedRecord], min_calls: i64) -> Vec<FunctionId> {
    if min_calls <= 0 {
        return all_functions(records);
    }
    call_counts(records)
        .into_iter()
        .filter(|(_, count)| *count as i64 >= min_calls)
        .map(|(name, _)| name)
        .collect()
}

/// An empty `enabled` set means every function is enabled.
pub fn is_enabled(enabled: &BTreeSet<FunctionId>, id: &str) -> bool {
    enabled.is_empty() || enabled.contains(id)
}

pub fn enabled_functions(qualified: &[FunctionId], enabled: &BTreeSet<FunctionId>) -> Vec<FunctionId> {
    qualified
        .iter()
        .filter(|id| is_enabled(enabled, id))
        .cloned()
        .collect()
}

pub fn toggle(enabled: &BTreeSet<FunctionId>, id: &str) -> BTreeSet<FunctionId> {
    let mut next = enabled.clone();
    if !next.remove(id) {
        next.insert(id.to_owned());
    }
    next
}

/// Carries the enabled set across a catalog change: functions that are new
/// since `previous` become enabled, functions gone from `current` are
/// dropped, and functions present in both keep their state.
pub fn reconcile(
    previous: &[FunctionId],
    current: &[FunctionId],
    enabled: &BTreeSet<FunctionId>,
) -> BTreeSet<FunctionId> {
    let previous: BTreeSet<&str> = previous.iter().map(String::as_str).collect();
    current
        .iter()
        .filter(|id| !previous.contains(id.as_str()) || is_enabled(enabled, id))
        .cloned()
        .collect()
}

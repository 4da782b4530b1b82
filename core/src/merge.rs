//! Structural merge policies used by import and sync reconciliation.
//!
//! All three policies are pure functions of `(current, incoming)`. Merges
//! rebuild only the maps they actually change, so merging data that is
//! already present returns `current` itself (same reference) and callers
//! can skip the commit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::path::Path;
use crate::value::{Map, Value};


// ---------------------------------------------------------------------------
// MergeStrategy
// ---------------------------------------------------------------------------

/// How an incoming tree is combined with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// The incoming tree wins wholesale.
    #[default]
    Replace,
    /// Recursive union; incoming scalars and sequences overwrite.
    Merge,
    /// Recursive union that never overwrites an existing local value.
    SkipConflicts,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Replace => "replace",
            MergeStrategy::Merge => "merge",
            MergeStrategy::SkipConflicts => "skip-conflicts",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(MergeStrategy::Replace),
            "merge" => Ok(MergeStrategy::Merge),
            "skip-conflicts" | "skip_conflicts" => Ok(MergeStrategy::SkipConflicts),
            other => Err(format!("unknown merge strategy '{}'", other)),
        }
    }
}


// ---------------------------------------------------------------------------
// MergeOutcome
// ---------------------------------------------------------------------------

/// Result tree plus the dotted paths where a local value was kept over a
/// differing incoming one. `conflicts` is only ever non-empty for
/// [`MergeStrategy::SkipConflicts`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub value: Value,
    pub conflicts: Vec<String>,
}

/// Run the given policy.
pub fn apply(strategy: MergeStrategy, current: &Value, incoming: &Value) -> MergeOutcome {
    match strategy {
        MergeStrategy::Replace => MergeOutcome {
            value: replace(current, incoming),
            conflicts: Vec::new(),
        },
        MergeStrategy::Merge => MergeOutcome {
            value: deep_merge(current, incoming),
            conflicts: Vec::new(),
        },
        MergeStrategy::SkipConflicts => merge_skip_conflicts(current, incoming),
    }
}


// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// The incoming tree, verbatim. Returns `current` when the two are
/// already equal so an identical replace is detectable as a no-op.
pub fn replace(current: &Value, incoming: &Value) -> Value {
    if current == incoming {
        current.clone()
    } else {
        incoming.clone()
    }
}

/// Recursive union. Maps on both sides merge key by key; anything else
/// in `incoming` (scalars, atoms, whole sequences) replaces the local
/// value. Keys only present locally are kept.
pub fn deep_merge(current: &Value, incoming: &Value) -> Value {
    let (Some(local), Some(remote)) = (current.as_map(), incoming.as_map()) else {
        return replace(current, incoming);
    };

    let mut rebuilt: Option<Map> = None;
    for (key, remote_value) in remote {
        let next = match local.get(key) {
            Some(local_value) if local_value.is_map() && remote_value.is_map() => {
                deep_merge(local_value, remote_value)
            }
            _ => remote_value.clone(),
        };
        if local.get(key).is_some_and(|existing| *existing == next) {
            continue;
        }
        rebuilt
            .get_or_insert_with(|| local.clone())
            .insert(key.clone(), next);
    }

    match rebuilt {
        Some(map) => Value::from_map(map),
        None => current.clone(),
    }
}

/// Recursive union that keeps local values on disagreement and reports
/// each such path, in traversal order.
///
/// A key absent locally adopts the incoming value. A map meeting a
/// non-map (an atom, a sequence, a scalar) is a conflict at that path;
/// the two are never partially merged.
pub fn merge_skip_conflicts(current: &Value, incoming: &Value) -> MergeOutcome {
    let mut conflicts = Vec::new();
    let value = skip_walk(current, incoming, &Path::root(), &mut conflicts);
    MergeOutcome { value, conflicts }
}

fn skip_walk(current: &Value, incoming: &Value, at: &Path, conflicts: &mut Vec<String>) -> Value {
    let (Some(local), Some(remote)) = (current.as_map(), incoming.as_map()) else {
        if current != incoming {
            conflicts.push(at.to_dotted());
        }
        return current.clone();
    };

    let mut rebuilt: Option<Map> = None;
    for (key, remote_value) in remote {
        let next = match local.get(key) {
            None => remote_value.clone(),
            Some(local_value) => {
                let child = at.child(key);
                if local_value.is_map() && remote_value.is_map() {
                    skip_walk(local_value, remote_value, &child, conflicts)
                } else {
                    if local_value != remote_value {
                        conflicts.push(child.to_dotted());
                    }
                    continue;
                }
            }
        };
        if local.get(key).is_some_and(|existing| *existing == next) {
            continue;
        }
        rebuilt
            .get_or_insert_with(|| local.clone())
            .insert(key.clone(), next);
    }

    match rebuilt {
        Some(map) => Value::from_map(map),
        None => current.clone(),
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(raw: serde_json::Value) -> Value {
        raw.into()
    }

    #[test]
    fn strategy_parse_and_display() {
        for s in [MergeStrategy::Replace, MergeStrategy::Merge, MergeStrategy::SkipConflicts] {
            assert_eq!(s.as_str().parse::<MergeStrategy>().unwrap(), s);
        }
        assert!("union".parse::<MergeStrategy>().is_err());
        assert_eq!(
            serde_json::to_string(&MergeStrategy::SkipConflicts).unwrap(),
            "\"skip-conflicts\""
        );
    }

    #[test]
    fn replace_takes_incoming() {
        let cur = tree(json!({"a": 1, "b": 2}));
        let inc = tree(json!({"c": 3}));
        assert_eq!(replace(&cur, &inc), inc);
    }

    #[test]
    fn replace_identical_keeps_reference() {
        let cur = tree(json!({"a": 1}));
        let inc = tree(json!({"a": 1}));
        assert!(replace(&cur, &inc).same(&cur));
    }

    #[test]
    fn merge_overwrites_and_preserves() {
        let cur = tree(json!({"x": 1, "y": 2}));
        let inc = tree(json!({"x": 5}));
        assert_eq!(deep_merge(&cur, &inc), tree(json!({"x": 5, "y": 2})));
    }

    #[test]
    fn merge_recurses_into_maps() {
        let cur = tree(json!({"ui": {"theme": "dark", "font": {"size": 12, "family": "mono"}}}));
        let inc = tree(json!({"ui": {"font": {"size": 14}}, "new": true}));
        assert_eq!(
            deep_merge(&cur, &inc),
            tree(json!({"ui": {"theme": "dark", "font": {"size": 14, "family": "mono"}}, "new": true}))
        );
    }

    #[test]
    fn merge_replaces_sequences_whole() {
        let cur = tree(json!({"list": [1, 2, 3]}));
        let inc = tree(json!({"list": [9]}));
        assert_eq!(deep_merge(&cur, &inc), tree(json!({"list": [9]})));
    }

    #[test]
    fn merge_identical_is_idempotent_by_reference() {
        let cur = tree(json!({"a": {"b": [1, 2]}, "c": "x"}));
        let inc = tree(json!({"a": {"b": [1, 2]}, "c": "x"}));
        assert!(deep_merge(&cur, &inc).same(&cur));
    }

    #[test]
    fn merge_shares_untouched_branches() {
        let cur = tree(json!({"a": {"b": 1}, "keep": {"deep": 1}}));
        let inc = tree(json!({"a": {"b": 2}}));
        let out = deep_merge(&cur, &inc);
        assert!(out.get_key("keep").unwrap().same(cur.get_key("keep").unwrap()));
    }

    #[test]
    fn skip_conflicts_keeps_local_and_reports() {
        let cur = tree(json!({"x": 2}));
        let inc = tree(json!({"x": 9}));
        let out = merge_skip_conflicts(&cur, &inc);
        assert_eq!(out.value, tree(json!({"x": 2})));
        assert_eq!(out.conflicts, vec!["x"]);
    }

    #[test]
    fn skip_conflicts_adopts_missing_keys() {
        let cur = tree(json!({"a": {"b": 1}}));
        let inc = tree(json!({"a": {"c": 2}, "d": 3}));
        let out = merge_skip_conflicts(&cur, &inc);
        assert_eq!(out.value, tree(json!({"a": {"b": 1, "c": 2}, "d": 3})));
        assert!(out.conflicts.is_empty());
    }

    #[test]
    fn skip_conflicts_equal_values_are_not_conflicts() {
        let cur = tree(json!({"a": 1, "l": [1, 2]}));
        let inc = tree(json!({"a": 1, "l": [1, 2]}));
        let out = merge_skip_conflicts(&cur, &inc);
        assert!(out.conflicts.is_empty());
        assert!(out.value.same(&cur));
    }

    #[test]
    fn skip_conflicts_reports_in_traversal_order() {
        let cur = tree(json!({"a": 1, "n": {"p": 1, "q": 2}, "z": 1}));
        let inc = tree(json!({"z": 2, "n": {"q": 3, "p": 4}, "a": 5}));
        let out = merge_skip_conflicts(&cur, &inc);
        assert_eq!(out.conflicts, vec!["z", "n.q", "n.p", "a"]);
        assert_eq!(out.value, cur);
    }

    #[test]
    fn skip_conflicts_map_vs_atom_is_conflict() {
        let mut map = Map::new();
        map.insert("when".into(), Value::atom("date", json!("2024-01-01")));
        let cur = Value::from_map(map);
        let inc = tree(json!({"when": {"year": 2024}}));
        let out = merge_skip_conflicts(&cur, &inc);
        assert_eq!(out.conflicts, vec!["when"]);
        assert!(out.value.same(&cur));
    }

    #[test]
    fn skip_conflicts_null_local_is_a_value() {
        let cur = tree(json!({"a": null}));
        let inc = tree(json!({"a": 1}));
        let out = merge_skip_conflicts(&cur, &inc);
        assert_eq!(out.conflicts, vec!["a"]);
    }

    #[test]
    fn apply_dispatches() {
        let cur = tree(json!({"x": 1, "y": 2}));
        let inc = tree(json!({"x": 5}));
        assert_eq!(apply(MergeStrategy::Replace, &cur, &inc).value, inc);
        assert_eq!(
            apply(MergeStrategy::Merge, &cur, &inc).value,
            tree(json!({"x": 5, "y": 2}))
        );
        let skipped = apply(MergeStrategy::SkipConflicts, &cur, &inc);
        assert_eq!(skipped.value, cur);
        assert_eq!(skipped.conflicts, vec!["x"]);
        assert!(apply(MergeStrategy::Merge, &cur, &inc).conflicts.is_empty());
    }
}

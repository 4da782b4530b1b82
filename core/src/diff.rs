//! State diff computation: compare two snapshots and produce a flat,
//! ordered list of leaf-level changes.
//!
//! Used for dirty tracking against the initial snapshot and by the CLI
//! `diff` command. Branches that are the same reference on both sides
//! are skipped without being walked.

use serde::Serialize;

use crate::path::Path;
use crate::value::Value;


// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// A single difference at one dotted path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    Added { path: String, value: Value },
    Removed { path: String, value: Value },
    Changed { path: String, old: Value, new: Value },
}

impl Change {
    pub fn path(&self) -> &str {
        match self {
            Change::Added { path, .. } | Change::Removed { path, .. } | Change::Changed { path, .. } => {
                path
            }
        }
    }
}


// ---------------------------------------------------------------------------
// StateDiff
// ---------------------------------------------------------------------------

/// Every change between two snapshots, old-side keys first, then keys
/// only present on the new side.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StateDiff {
    pub changes: Vec<Change>,
}

impl StateDiff {
    /// Compute the diff between two snapshots.
    pub fn compute(old: &Value, new: &Value) -> Self {
        let mut changes = Vec::new();
        walk(old, new, &Path::root(), &mut changes);
        StateDiff { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Dotted paths of every change, in diff order.
    pub fn paths(&self) -> Vec<String> {
        self.changes.iter().map(|c| c.path().to_string()).collect()
    }

    /// Produce a human-readable one-line summary.
    pub fn summary(&self) -> String {
        let mut added = 0;
        let mut removed = 0;
        let mut changed = 0;
        for change in &self.changes {
            match change {
                Change::Added { .. } => added += 1,
                Change::Removed { .. } => removed += 1,
                Change::Changed { .. } => changed += 1,
            }
        }

        let mut parts = Vec::new();
        if added > 0 {
            parts.push(format!("{} added", added));
        }
        if removed > 0 {
            parts.push(format!("{} removed", removed));
        }
        if changed > 0 {
            parts.push(format!("{} changed", changed));
        }
        if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

fn walk(old: &Value, new: &Value, at: &Path, changes: &mut Vec<Change>) {
    if old.same(new) {
        return;
    }
    let (Some(old_map), Some(new_map)) = (old.as_map(), new.as_map()) else {
        if old != new {
            changes.push(Change::Changed {
                path: at.to_dotted(),
                old: old.clone(),
                new: new.clone(),
            });
        }
        return;
    };

    for (key, old_value) in old_map {
        let child = at.child(key);
        match new_map.get(key) {
            None => changes.push(Change::Removed {
                path: child.to_dotted(),
                value: old_value.clone(),
            }),
            Some(new_value) => walk(old_value, new_value, &child, changes),
        }
    }
    for (key, new_value) in new_map {
        if !old_map.contains_key(key) {
            changes.push(Change::Added {
                path: at.child(key).to_dotted(),
                value: new_value.clone(),
            });
        }
    }
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

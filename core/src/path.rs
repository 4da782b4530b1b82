//! Dotted path parser and tree resolution.
//!
//! Paths like `editor.font.size` address a location in a state tree.
//! Reads never fail: a segment that does not resolve to a map key yields
//! `None`. Writes return a new tree, cloning only the maps along the path
//! and sharing every other branch with the input.

use std::fmt;
use std::sync::Arc;

use crate::value::{Map, Value};


/// A parsed dotted path. The empty path addresses the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse a dotted string. Segments are trimmed and empty segments
    /// dropped, so `" a..b "` and `"a.b"` are the same path.
    pub fn parse(input: &str) -> Self {
        let segments = input
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Path { segments }
    }

    pub fn root() -> Self {
        Path::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// This path extended by one key.
    pub fn child(&self, key: &str) -> Path {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Path { segments }
    }

    /// Format back to a dotted string (`""` for the root).
    pub fn to_dotted(&self) -> String {
        self.segments.join(".")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dotted())
    }
}

impl From<&str> for Path {
    fn from(input: &str) -> Self {
        Path::parse(input)
    }
}


// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Read the value at `path`. Empty path returns the whole tree.
pub fn get<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    get_path(tree, &Path::parse(path))
}

/// Read the value at an already-parsed path.
///
/// Only maps are walked into; sequences and atoms end the walk.
pub fn get_path<'a>(tree: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut node = tree;
    for segment in path.segments() {
        node = node.as_map()?.get(segment)?;
    }
    Some(node)
}


// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Return a new tree with `value` stored at `path`.
///
/// The root cannot be replaced through this call: an empty path returns
/// the input unchanged.
pub fn set(tree: &Value, path: &str, value: Value) -> Value {
    set_path(tree, &Path::parse(path), value)
}

pub fn set_path(tree: &Value, path: &Path, value: Value) -> Value {
    match path.segments().split_first() {
        None => tree.clone(),
        Some((head, rest)) => assign(tree, head, rest, value),
    }
}

fn assign(node: &Value, head: &str, rest: &[String], value: Value) -> Value {
    // Missing or non-map intermediates become empty maps.
    let mut map: Map = node.as_map().cloned().unwrap_or_default();
    let next = match rest.split_first() {
        None => value,
        Some((next_head, next_rest)) => match map.get(head) {
            Some(child) => assign(child, next_head, next_rest, value),
            None => assign(&Value::Null, next_head, next_rest, value),
        },
    };
    map.insert(head.to_string(), next);
    Value::Map(Arc::new(map))
}

/// Return a new tree with the key at `path` removed.
///
/// When nothing exists at `path` the input is returned as-is (same
/// reference), so callers can detect the no-op with [`Value::same`].
pub fn remove(tree: &Value, path: &str) -> Value {
    remove_path(tree, &Path::parse(path))
}

pub fn remove_path(tree: &Value, path: &Path) -> Value {
    match path.segments().split_first() {
        None => tree.clone(),
        Some((head, rest)) => detach(tree, head, rest).unwrap_or_else(|| tree.clone()),
    }
}

fn detach(node: &Value, head: &str, rest: &[String]) -> Option<Value> {
    let map = node.as_map()?;
    let mut next = map.clone();
    match rest.split_first() {
        None => {
            next.shift_remove(head)?;
        }
        Some((next_head, next_rest)) => {
            let child = detach(map.get(head)?, next_head, next_rest)?;
            next.insert(head.to_string(), child);
        }
    }
    Some(Value::from_map(next))
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
    fn parse_trims_and_drops_empty_segments() {
        let p = Path::parse(" a .. b. ");
        assert_eq!(p.segments(), &["a".to_string(), "b".to_string()]);
        assert_eq!(p.to_dotted(), "a.b");
    }

    #[test]
    fn parse_empty_is_root() {
        assert!(Path::parse("").is_root());
        assert!(Path::parse(" . ").is_root());
    }

    #[test]
    fn child_extends_path() {
        assert_eq!(Path::root().child("a").child("b").to_string(), "a.b");
    }

    #[test]
    fn get_nested() {
        let t = tree(json!({"a": {"b": {"c": 3}}}));
        assert_eq!(get(&t, "a.b.c"), Some(&Value::from(3)));
    }

    #[test]
    fn get_root() {
        let t = tree(json!({"a": 1}));
        assert!(get(&t, "").unwrap().same(&t));
    }

    #[test]
    fn get_missing_is_absent() {
        let t = tree(json!({"a": {"b": 1}}));
        assert!(get(&t, "a.x").is_none());
        assert!(get(&t, "a.b.c").is_none());
        assert!(get(&t, "z.y.x").is_none());
    }

    #[test]
    fn get_does_not_walk_into_arrays() {
        let t = tree(json!({"list": [{"a": 1}]}));
        assert!(get(&t, "list.0").is_none());
        assert!(get(&t, "list.0.a").is_none());
    }

    #[test]
    fn get_does_not_walk_into_atoms() {
        let mut map = Map::new();
        map.insert("at".into(), Value::atom("date", json!({"year": 2024})));
        let t = Value::from_map(map);
        assert!(get(&t, "at").is_some());
        assert!(get(&t, "at.year").is_none());
    }

    #[test]
    fn get_after_set_returns_value() {
        let t = tree(json!({"a": {"b": 1}, "c": [1, 2]}));
        for path in ["a.b", "a.z", "c", "new.deep.path", "c.x"] {
            let v = Value::from("v");
            let next = set(&t, path, v.clone());
            assert_eq!(get(&next, path), Some(&v), "path {path}");
        }
    }

    #[test]
    fn set_creates_missing_intermediates() {
        let t = tree(json!({}));
        let next = set(&t, "x.y.z", Value::from(1));
        assert_eq!(next, tree(json!({"x": {"y": {"z": 1}}})));
    }

    #[test]
    fn set_replaces_non_map_intermediate() {
        let t = tree(json!({"x": 5}));
        let next = set(&t, "x.y", Value::from(1));
        assert_eq!(next, tree(json!({"x": {"y": 1}})));
    }

    #[test]
    fn set_empty_path_returns_input() {
        let t = tree(json!({"a": 1}));
        let next = set(&t, "", Value::from(2));
        assert!(next.same(&t));
    }

    #[test]
    fn set_leaves_input_untouched() {
        let t = tree(json!({"a": {"b": 1}}));
        let _ = set(&t, "a.b", Value::from(2));
        assert_eq!(t, tree(json!({"a": {"b": 1}})));
    }

    #[test]
    fn set_shares_untouched_branches() {
        let t = tree(json!({"a": {"b": 1}, "other": {"deep": [1, 2, 3]}}));
        let next = set(&t, "a.b", Value::from(2));
        assert!(get(&next, "other").unwrap().same(get(&t, "other").unwrap()));
        assert!(!get(&next, "a").unwrap().same(get(&t, "a").unwrap()));
    }

    #[test]
    fn set_keeps_key_position() {
        let t = tree(json!({"a": 1, "b": 2, "c": 3}));
        let next = set(&t, "b", Value::from(20));
        let keys: Vec<&String> = next.as_map().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn remove_leaf() {
        let t = tree(json!({"a": {"b": 1, "c": 2}}));
        let next = remove(&t, "a.b");
        assert_eq!(next, tree(json!({"a": {"c": 2}})));
    }

    #[test]
    fn remove_missing_returns_same_tree() {
        let t = tree(json!({"a": {"b": 1}}));
        assert!(remove(&t, "a.x").same(&t));
        assert!(remove(&t, "q.r").same(&t));
        assert!(remove(&t, "").same(&t));
    }
}

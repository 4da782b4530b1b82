//! Built-in actions available to `sst dispatch`.
//!
//! Both take either a bare path string or `{"path": ..}` as payload;
//! `increment` also accepts `"by"` (default 1).

use settings_store::{ActionContext, BoxError, StoreBuilder, Value};


pub const NAMES: &[&str] = &["toggle", "increment"];

pub fn register(builder: StoreBuilder) -> StoreBuilder {
    builder.action("toggle", toggle).action("increment", increment)
}


/// Flip a boolean. A missing or null value becomes `true`.
async fn toggle(ctx: ActionContext, payload: Value) -> Result<Value, BoxError> {
    let path = payload_path(&payload)?;
    let next = match ctx.get(&path) {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(other) => {
            return Err(format!("cannot toggle {} at '{}'", other.type_name(), path).into())
        }
    };
    ctx.set(&path, next);
    Ok(Value::from(next))
}

/// Add `by` to a number. A missing or null value counts as zero.
async fn increment(ctx: ActionContext, payload: Value) -> Result<Value, BoxError> {
    let path = payload_path(&payload)?;
    let by = payload.get_key("by").cloned().unwrap_or(Value::from(1));
    let current = ctx.get(&path).unwrap_or(Value::Null);

    let next = match (&current, by.as_i64(), current.as_i64()) {
        (Value::Null, Some(step), _) => Value::from(step),
        (_, Some(step), Some(n)) => match n.checked_add(step) {
            Some(sum) => Value::from(sum),
            None => return Err(format!("overflow incrementing '{}'", path).into()),
        },
        _ => {
            let step = by
                .as_f64()
                .ok_or_else(|| format!("'by' must be a number, got {}", by.type_name()))?;
            let n = match &current {
                Value::Null => 0.0,
                other => other.as_f64().ok_or_else(|| {
                    format!("cannot increment {} at '{}'", other.type_name(), path)
                })?,
            };
            Value::from(n + step)
        }
    };
    ctx.set(&path, next.clone());
    Ok(next)
}

fn payload_path(payload: &Value) -> Result<String, BoxError> {
    let path = match payload {
        Value::String(path) => Some(path.as_str()),
        Value::Map(_) => payload.get_key("path").and_then(Value::as_str),
        _ => None,
    };
    match path {
        Some(path) if !path.trim().is_empty() => Ok(path.to_string()),
        _ => Err("payload must be a path or {\"path\": \"..\"}".into()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use settings_store::Store;

    fn store(initial: serde_json::Value) -> Store {
        register(Store::builder(initial)).build()
    }

    #[tokio::test]
    async fn toggle_flips_and_creates() {
        let store = store(json!({"editor": {"wrap": false}}));
        let out = store.dispatch("toggle", "editor.wrap").await.unwrap();
        assert_eq!(out, Value::from(true));
        assert_eq!(store.get("editor.wrap"), Some(Value::from(true)));

        store.dispatch("toggle", json!({"path": "fresh"})).await.unwrap();
        assert_eq!(store.get("fresh"), Some(Value::from(true)));
    }

    #[tokio::test]
    async fn toggle_rejects_non_bool() {
        let store = store(json!({"name": "x"}));
        let err = store.dispatch("toggle", "name").await.unwrap_err();
        assert_eq!(err.to_string(), "cannot toggle string at 'name'");
        assert_eq!(store.get("name"), Some(Value::from("x")));
    }

    #[tokio::test]
    async fn increment_integers_and_floats() {
        let store = store(json!({"n": 1, "ratio": 0.5}));
        store.dispatch("increment", "n").await.unwrap();
        assert_eq!(store.get("n"), Some(Value::from(2)));

        store
            .dispatch("increment", json!({"path": "n", "by": -5}))
            .await
            .unwrap();
        assert_eq!(store.get("n"), Some(Value::from(-3)));

        store
            .dispatch("increment", json!({"path": "ratio", "by": 0.25}))
            .await
            .unwrap();
        assert_eq!(store.get("ratio"), Some(Value::from(0.75)));

        store.dispatch("increment", "counter.hits").await.unwrap();
        assert_eq!(store.get("counter.hits"), Some(Value::from(1)));
    }

    #[tokio::test]
    async fn bad_payload_is_error() {
        let store = store(json!({}));
        assert!(store.dispatch("increment", Value::Null).await.is_err());
        assert!(store.dispatch("toggle", json!({"nope": 1})).await.is_err());
        assert!(store.dispatch("increment", json!([1])).await.is_err());
        assert_eq!(store.get_state(), Value::from(json!({})));
    }

    #[test]
    fn names_match_registered_actions() {
        let store = store(json!({}));
        let mut names: Vec<String> = NAMES.iter().map(|n| n.to_string()).collect();
        names.sort();
        assert_eq!(store.action_names(), names);
    }
}

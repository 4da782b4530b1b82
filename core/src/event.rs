//! Change events: one immutable record per committed state transition.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;


// ---------------------------------------------------------------------------
// TriggerKind
// ---------------------------------------------------------------------------

/// What caused a commit, without the per-trigger details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Set,
    Remove,
    SetState,
    Reset,
    Hydrate,
    Import,
    Sync,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Set => "set",
            TriggerKind::Remove => "remove",
            TriggerKind::SetState => "set_state",
            TriggerKind::Reset => "reset",
            TriggerKind::Hydrate => "hydrate",
            TriggerKind::Import => "import",
            TriggerKind::Sync => "sync",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


// ---------------------------------------------------------------------------
// ChangeTrigger
// ---------------------------------------------------------------------------

/// The trigger of a commit. Path-level triggers carry the touched path
/// and the values on either side of the write.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeTrigger {
    Set {
        path: String,
        value: Value,
        /// `None` when nothing existed at `path` before the write.
        previous_value: Option<Value>,
    },
    Remove {
        path: String,
        previous_value: Value,
    },
    SetState,
    Reset,
    Hydrate,
    Import,
    Sync,
}

impl ChangeTrigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            ChangeTrigger::Set { .. } => TriggerKind::Set,
            ChangeTrigger::Remove { .. } => TriggerKind::Remove,
            ChangeTrigger::SetState => TriggerKind::SetState,
            ChangeTrigger::Reset => TriggerKind::Reset,
            ChangeTrigger::Hydrate => TriggerKind::Hydrate,
            ChangeTrigger::Import => TriggerKind::Import,
            ChangeTrigger::Sync => TriggerKind::Sync,
        }
    }
}


// ---------------------------------------------------------------------------
// ChangeEvent
// ---------------------------------------------------------------------------

/// A committed transition: the trigger and both full snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub trigger: ChangeTrigger,
    pub state: Value,
    pub previous_state: Value,
}

impl ChangeEvent {
    pub fn kind(&self) -> TriggerKind {
        self.trigger.kind()
    }

    /// The path touched by a `set` or `remove`.
    pub fn path(&self) -> Option<&str> {
        match &self.trigger {
            ChangeTrigger::Set { path, .. } | ChangeTrigger::Remove { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The value written by a `set`.
    pub fn value(&self) -> Option<&Value> {
        match &self.trigger {
            ChangeTrigger::Set { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The value that was at the touched path before the write.
    pub fn previous_value(&self) -> Option<&Value> {
        match &self.trigger {
            ChangeTrigger::Set { previous_value, .. } => previous_value.as_ref(),
            ChangeTrigger::Remove { previous_value, .. } => Some(previous_value),
            _ => None,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_event_exposes_details() {
        let event = ChangeEvent {
            trigger: ChangeTrigger::Set {
                path: "a.b".into(),
                value: Value::from(2),
                previous_value: Some(Value::from(1)),
            },
            state: Value::empty_map(),
            previous_state: Value::empty_map(),
        };
        assert_eq!(event.kind(), TriggerKind::Set);
        assert_eq!(event.path(), Some("a.b"));
        assert_eq!(event.value(), Some(&Value::from(2)));
        assert_eq!(event.previous_value(), Some(&Value::from(1)));
    }

    #[test]
    fn bulk_event_has_no_path_details() {
        let event = ChangeEvent {
            trigger: ChangeTrigger::Import,
            state: Value::empty_map(),
            previous_state: Value::empty_map(),
        };
        assert_eq!(event.path(), None);
        assert_eq!(event.value(), None);
        assert_eq!(event.previous_value(), None);
    }

    #[test]
    fn trigger_kind_serde() {
        let json = serde_json::to_string(&TriggerKind::SetState).unwrap();
        assert_eq!(json, "\"set_state\"");
        assert_eq!(TriggerKind::Hydrate.to_string(), "hydrate");
    }
}

use thiserror::Error as ThisError;

/// Error type adapters, codecs and action handlers hand back to the store.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Errors surfaced to the immediate caller of a store operation.
///
/// Absent paths, no-op writes and redundant imports are not errors, and
/// per-adapter push failures never reach the caller of a write.
#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("failed to decode imported settings: {0}")]
    ImportDecode(#[source] BoxError),

    #[error("imported settings must be an object, got {0}")]
    ImportShape(&'static str),

    #[error("imported settings failed validation")]
    ImportValidation,

    #[error("settings pulled from '{0}' failed validation")]
    SyncValidation(String),

    #[error("pull from '{adapter}' failed: {source}")]
    SyncPull {
        adapter: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to load persisted settings: {0}")]
    Hydrate(#[source] BoxError),

    #[error("no such action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Action(BoxError),

    #[error("failed to export settings: {0}")]
    Export(#[source] BoxError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_error_is_transparent() {
        let err = StoreError::Action("disk full".into());
        assert_eq!(err.to_string(), "disk full");
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            StoreError::UnknownAction("missing-action".into()).to_string(),
            "no such action: missing-action"
        );
        assert_eq!(
            StoreError::ImportShape("array").to_string(),
            "imported settings must be an object, got array"
        );
    }
}

//! Import and export of whole settings trees.

use std::fmt;

use super::{CommitPlan, Store};
use crate::codec::{Codec, JsonCodec};
use crate::error::StoreError;
use crate::event::ChangeTrigger;
use crate::merge::{self, MergeStrategy};
use crate::value::Value;


/// What `import_settings` receives: text to decode, or a tree that is
/// already structured.
#[derive(Debug, Clone)]
pub enum ImportSource {
    Text(String),
    Value(Value),
}

impl From<&str> for ImportSource {
    fn from(text: &str) -> Self {
        ImportSource::Text(text.to_string())
    }
}

impl From<String> for ImportSource {
    fn from(text: String) -> Self {
        ImportSource::Text(text)
    }
}

impl From<Value> for ImportSource {
    fn from(value: Value) -> Self {
        ImportSource::Value(value)
    }
}


/// Options for [`Store::import_settings`]. Defaults: replace strategy,
/// no validation, JSON decoding.
#[derive(Default)]
pub struct ImportOptions<'a> {
    strategy: MergeStrategy,
    validate: Option<Box<dyn Fn(&Value) -> bool + 'a>>,
    codec: Option<&'a dyn Codec>,
}

impl<'a> ImportOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Reject candidates the predicate returns false for.
    pub fn validate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + 'a,
    {
        self.validate = Some(Box::new(predicate));
        self
    }

    /// Decode textual sources with `codec` instead of JSON.
    pub fn codec(mut self, codec: &'a dyn Codec) -> Self {
        self.codec = Some(codec);
        self
    }
}

impl fmt::Debug for ImportOptions<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportOptions")
            .field("strategy", &self.strategy)
            .field("validate", &self.validate.is_some())
            .field("codec", &self.codec.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    /// Whether the import produced a commit.
    pub changed: bool,
    pub strategy: MergeStrategy,
    /// Paths where a local value was kept. Empty unless the strategy is
    /// skip-conflicts.
    pub conflicts: Vec<String>,
}


impl Store {
    /// Encode the current snapshot as pretty JSON.
    pub fn export_settings(&self) -> Result<String, StoreError> {
        self.export_with(&JsonCodec::default())
    }

    pub fn export_with(&self, codec: &dyn Codec) -> Result<String, StoreError> {
        codec.encode(&self.get_state()).map_err(StoreError::Export)
    }

    /// Decode, check and merge `source` into the current snapshot.
    ///
    /// The merged tree is committed with trigger `import` unless it is
    /// value-equal to the current snapshot. Conflicts are reported whether
    /// or not a commit happened.
    pub fn import_settings(
        &self,
        source: impl Into<ImportSource>,
        options: ImportOptions<'_>,
    ) -> Result<ImportOutcome, StoreError> {
        let candidate = match source.into() {
            ImportSource::Text(text) => {
                let json = JsonCodec::default();
                let codec: &dyn Codec = match options.codec {
                    Some(codec) => codec,
                    None => &json,
                };
                codec.decode(&text).map_err(StoreError::ImportDecode)?
            }
            ImportSource::Value(value) => value,
        };

        if !candidate.is_map() {
            return Err(StoreError::ImportShape(candidate.type_name()));
        }
        if let Some(validate) = &options.validate {
            if !validate(&candidate) {
                return Err(StoreError::ImportValidation);
            }
        }

        let strategy = options.strategy;
        let mut conflicts = Vec::new();
        let changed = self.commit_with(CommitPlan::LOCAL, |current| {
            let outcome = merge::apply(strategy, current, &candidate);
            conflicts = outcome.conflicts;
            if outcome.value == *current {
                None
            } else {
                Some((outcome.value, ChangeTrigger::Import))
            }
        });
        if !conflicts.is_empty() {
            tracing::debug!(count = conflicts.len(), "import kept local values");
        }

        Ok(ImportOutcome {
            changed,
            strategy,
            conflicts,
        })
    }
}

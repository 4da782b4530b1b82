//! Text encodings for export, import and file persistence.
//!
//! Any `Codec` must round-trip: `decode(encode(v)) == v` for every tree
//! made of maps, sequences, strings, numbers, booleans and null.
//!
//! Atoms are outside that law. They encode as their bare payload and
//! decode as ordinary values, so the atom kind does not survive a round
//! trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::value::Value;

/// An encoder/decoder pair for state trees.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String, BoxError>;
    fn decode(&self, text: &str) -> Result<Value, BoxError>;
}


// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// The canonical encoding. Pretty-printed unless `compact` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pub compact: bool,
}

impl JsonCodec {
    pub fn compact() -> Self {
        JsonCodec { compact: true }
    }
}

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<String, BoxError> {
        let text = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(text)
    }

    fn decode(&self, text: &str) -> Result<Value, BoxError> {
        Ok(serde_json::from_str(text)?)
    }
}


// ---------------------------------------------------------------------------
// YAML
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn encode(&self, value: &Value) -> Result<String, BoxError> {
        Ok(serde_yaml::to_string(value)?)
    }

    fn decode(&self, text: &str) -> Result<Value, BoxError> {
        Ok(serde_yaml::from_str(text)?)
    }
}


// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

/// Named codec selection, as used in configuration files and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
        }
    }

    /// Guess a format from a file extension; anything unknown is JSON.
    pub fn from_extension(path: &std::path::Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

impl Codec for Format {
    fn encode(&self, value: &Value) -> Result<String, BoxError> {
        match self {
            Format::Json => JsonCodec::default().encode(value),
            Format::Yaml => YamlCodec.encode(value),
        }
    }

    fn decode(&self, text: &str) -> Result<Value, BoxError> {
        match self {
            Format::Json => JsonCodec::default().decode(text),
            Format::Yaml => YamlCodec.decode(text),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            other => Err(format!("unknown format '{}'", other)),
        }
    }
}

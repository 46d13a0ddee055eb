//! The slate data set: a flat map of field names to scalar values.
//!
//! Production metadata arrives as a flat JSON object (`{"shot": "010_0040",
//! "version": 3, ...}`) and is extended over the pipeline's lifetime by the
//! metadata extractor (`timecode`, `resolution_width`, `resolution_height`)
//! and the template compiler (`*_optional` keys). Values are typed so the
//! compiler can decide truthiness without guessing:
//!
//! | JSON | [`Value`] | falsy when |
//! |---|---|---|
//! | string | `Text` | empty |
//! | integer | `Integer` | `0` |
//! | float | `Float` | `0.0` |
//! | bool | `Bool` | `false` |
//!
//! Nested objects, arrays and `null` are rejected at load time: templates can
//! only reference top-level keys.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

pub const TIMECODE: &str = "timecode";
pub const FPS: &str = "fps";
pub const RESOLUTION_WIDTH: &str = "resolution_width";
pub const RESOLUTION_HEIGHT: &str = "resolution_height";
pub const THUMBNAIL: &str = "thumbnail";

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("slate data must be a JSON object")]
    NotObject,
    #[error("slate data key '{0}' must be a string, number or bool")]
    NotScalar(String),
    #[error("invalid assignment '{0}': expected key=value")]
    InvalidAssignment(String),
}

/// A scalar data value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Parse a command-line value: integer, float, `true`/`false`, else text.
    pub fn parse_loose(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<i64>() {
            return Value::Integer(n);
        }
        match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => return Value::Float(f),
            _ => {}
        }
        match raw {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Text(raw.to_string()),
        }
    }

    fn from_json(key: &str, value: serde_json::Value) -> Result<Self, DataError> {
        match value {
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::String(s) => Ok(Value::Text(s)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Integer)
                .or_else(|| n.as_f64().map(Value::Float))
                .ok_or_else(|| DataError::NotScalar(key.to_string())),
            _ => Err(DataError::NotScalar(key.to_string())),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Field values for one slate.
///
/// Each slate job owns its own `SlateData`; parallel jobs clone the base set
/// rather than share it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlateData {
    fields: BTreeMap<String, Value>,
}

impl SlateData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a flat JSON object.
    pub fn from_json_str(json: &str) -> Result<Self, DataError> {
        let raw: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(map) = raw else {
            return Err(DataError::NotObject);
        };
        let mut data = Self::new();
        for (key, value) in map {
            let value = Value::from_json(&key, value)?;
            data.fields.insert(key, value);
        }
        Ok(data)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Set `key` only when it is not present yet.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Apply a `key=value` assignment from the command line.
    pub fn assign(&mut self, assignment: &str) -> Result<(), DataError> {
        let (key, value) = assignment
            .split_once('=')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| DataError::InvalidAssignment(assignment.to_string()))?;
        self.set(key.trim(), Value::parse_loose(value));
        Ok(())
    }

    /// Missing keys count as falsy.
    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_truthy)
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.set(RESOLUTION_WIDTH, width);
        self.set(RESOLUTION_HEIGHT, height);
        tracing::debug!("New resolution set up: {width}x{height}");
    }

    /// The stored resolution, if both dimensions are positive integers.
    pub fn resolution(&self) -> Option<(u32, u32)> {
        let dim = |key| {
            self.get(key)
                .and_then(Value::as_i64)
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
        };
        Some((dim(RESOLUTION_WIDTH)?, dim(RESOLUTION_HEIGHT)?))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

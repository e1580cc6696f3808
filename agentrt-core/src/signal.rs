//! Signal envelope (C1) — the immutable message every agent receives.
//!
//! Field-level compatible with CloudEvents v1.0.2; framework extensions are
//! namespaced `jido_*` on the wire (see DESIGN.md open question 3).

use crate::error::ValidationError;
use crate::id::SignalId;
use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Dispatch configuration overriding the server default for a single `Emit`.
pub type DispatchConfig = serde_json::Value;

/// An immutable message envelope delivered to an agent.
///
/// Identity is `id`: two signals with the same id are considered the same
/// signal regardless of other field values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Unique identifier for this signal.
    pub id: SignalId,
    /// Origin path (who/what produced this signal).
    pub source: String,
    /// Dotted hierarchical type key, e.g. `"user.123.created"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional subject further qualifying `kind`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// ISO-8601 timestamp, if supplied by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    /// MIME type of `data`, if meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_content_type: Option<String>,
    /// A URI identifying the schema that `data` conforms to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_schema: Option<String>,
    /// Arbitrary payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Pre-built work list, bypassing signal→action routing.
    #[serde(
        default,
        rename = "jido_instructions",
        skip_serializing_if = "Option::is_none"
    )]
    pub instructions: Option<Vec<Instruction>>,
    /// Framework options, string-keyed.
    #[serde(default, rename = "jido_opts")]
    pub opts: HashMap<String, serde_json::Value>,
    /// Dispatch override for any `Emit` directives this signal produces.
    #[serde(
        default,
        rename = "jido_dispatch",
        skip_serializing_if = "Option::is_none"
    )]
    pub dispatch: Option<DispatchConfig>,
    /// Free-form metadata.
    #[serde(default, rename = "jido_metadata")]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Correlates this signal with a broader unit of work.
    #[serde(
        default,
        rename = "jido_correlation_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub correlation_id: Option<String>,
    /// The id of the signal or event that caused this one.
    #[serde(
        default,
        rename = "jido_causation_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub causation_id: Option<String>,
}

impl Signal {
    /// Build a new signal with a generated id and empty framework fields.
    pub fn new(source: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: SignalId::generate(),
            source: source.into(),
            kind: kind.into(),
            subject: None,
            time: None,
            data_content_type: None,
            data_schema: None,
            data: serde_json::Value::Null,
            instructions: None,
            opts: HashMap::new(),
            dispatch: None,
            metadata: HashMap::new(),
            correlation_id: None,
            causation_id: None,
        }
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// Attach a correlation id.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Build a synthetic signal caused by this one, inheriting correlation.
    pub fn caused(&self, source: impl Into<String>, kind: impl Into<String>) -> Self {
        let mut s = Signal::new(source, kind);
        s.causation_id = Some(self.id.as_str().to_string());
        s.correlation_id = self.correlation_id.clone();
        s
    }

    /// Validate the envelope per §3/§4.1 edge cases.
    ///
    /// Checks `kind` is non-empty, within an implementation-defined length
    /// limit, and composed only of `[A-Za-z0-9_.]` segments.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_signal_type(&self.kind)
    }
}

/// Implementation-defined upper bound on signal type length.
pub const MAX_SIGNAL_TYPE_LEN: usize = 512;

/// Validate a dotted signal/pattern type string per §4.1's character rules.
pub fn validate_signal_type(kind: &str) -> Result<(), ValidationError> {
    if kind.is_empty() {
        return Err(ValidationError::EmptySignalType);
    }
    if kind.len() > MAX_SIGNAL_TYPE_LEN {
        return Err(ValidationError::InvalidSignalType(kind.to_string()));
    }
    let valid = kind
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err(ValidationError::InvalidSignalType(kind.to_string()));
    }
    if kind.split('.').any(|segment| segment.is_empty()) {
        return Err(ValidationError::InvalidSignalType(kind.to_string()));
    }
    Ok(())
}

//! Batch invocation inputs and results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CapabilityName;
use crate::error::Result;

/// One entry of a batch invocation.
///
/// The name is kept as sent so that a malformed name fails only its own
/// item; [`InvocationItem::capability_name`] validates it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationItem {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input: Option<Value>,
}

impl InvocationItem {
    /// Creates an item without an input payload.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: None,
        }
    }

    /// Attaches an input payload.
    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = Some(input);
        self
    }

    /// Returns the capability name as sent.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates the name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidCapabilityName`] when the name is blank,
    /// too long, or contains control characters.
    pub fn capability_name(&self) -> Result<CapabilityName> {
        CapabilityName::new(self.name.clone())
    }

    /// Returns the raw input payload, if any.
    #[must_use]
    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    /// Returns the input payload, substituting an empty object when absent.
    #[must_use]
    pub fn input_or_empty(&self) -> Value {
        self.input
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

/// Outcome of a single invocation. A batch always yields one per input item,
/// in input order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    name: String,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl InvocationResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(name: impl Into<String>, result: Value) -> Self {
        Self {
            name: name.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Creates a failed result carrying the error message.
    #[must_use]
    pub fn failure(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Returns the capability name the result belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` when the invocation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the result payload of a successful invocation.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Returns the error message of a failed invocation.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

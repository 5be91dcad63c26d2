// ============================================================================
// spark-live - Errors
// Error type, error-as-value helpers and panic containment
// ============================================================================

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use super::types::Value;

/// Errors produced by the live runtime.
///
/// Errors are either returned from fallible operations or stored as data in a
/// field (`Value::Error`), which is how computed fields and rejected futures
/// report failure to their dependents.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LiveError {
    #[error("`{key}` is not callable")]
    NotCallable { key: String },

    #[error("index {index} is out of bounds for a sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("computing `{key}` failed: {message}")]
    Compute { key: String, message: String },

    #[error("{0}")]
    Raised(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

impl LiveError {
    /// Build a `Raised` error from anything printable.
    pub fn raised(message: impl Into<String>) -> Self {
        LiveError::Raised(message.into())
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        LiveError::Rejected(message.into())
    }

    /// Wrap into a field value.
    pub fn into_value(self) -> Value {
        Value::Error(Rc::new(self))
    }
}

pub type Result<T> = std::result::Result<T, LiveError>;

// =============================================================================
// NO THROW
// =============================================================================

/// Run `f`, turning both an `Err` and a panic into an error value.
///
/// # Example
///
/// ```
/// use spark_live::{no_throw, LiveError, Value};
///
/// let ok = no_throw(|| Ok(Value::from(2)));
/// assert_eq!(ok, Value::from(2));
///
/// let failed = no_throw(|| Err(LiveError::raised("boom")));
/// assert!(failed.is_error());
/// ```
pub fn no_throw(f: impl FnOnce() -> Result<Value>) -> Value {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(err)) => err.into_value(),
        Err(payload) => LiveError::Raised(panic_message(payload.as_ref())).into_value(),
    }
}

/// Render a panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("non-string panic payload")
    }
}

// =============================================================================
// TESTS
// =============================================================================

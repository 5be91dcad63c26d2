// ============================================================================
// spark-live - Equality Functions
// The strict equality used by trapped writes
// ============================================================================

use std::rc::Rc;

use crate::core::types::Value;

// =============================================================================
// SAFE FLOAT EQUALITY
// =============================================================================

/// Safe equality for f64 values.
/// Handles NaN correctly: NaN == NaN returns true, so re-writing NaN to a
/// field is not a change.
///
/// # Example
/// ```
/// use spark_live::reactivity::equality::safe_equals_f64;
///
/// assert!(safe_equals_f64(&1.0, &1.0));
/// assert!(!safe_equals_f64(&1.0, &2.0));
/// assert!(safe_equals_f64(&f64::NAN, &f64::NAN));
/// ```
pub fn safe_equals_f64(a: &f64, b: &f64) -> bool {
    if a.is_nan() {
        return b.is_nan();
    }
    a == b
}

// =============================================================================
// STRICT EQUALITY (Default)
// =============================================================================

/// Strict equality between two values.
///
/// Scalars and strings compare by content; lists, errors, futures, subjects
/// and actions compare by identity. Values of different variants are never
/// equal (`Int(1)` is not `Float(1.0)`).
///
/// # Example
/// ```
/// use spark_live::{reactivity::equality::strict_equals, Value};
///
/// assert!(strict_equals(&Value::from(1), &Value::from(1)));
/// assert!(!strict_equals(&Value::from(1), &Value::from(1.0)));
///
/// let list = Value::list(vec![Value::from(1)]);
/// assert!(strict_equals(&list, &list.clone()));
/// assert!(!strict_equals(&list, &Value::list(vec![Value::from(1)])));
/// ```
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Unset, Value::Unset) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => safe_equals_f64(x, y),
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
        (Value::Error(x), Value::Error(y)) => Rc::ptr_eq(x, y),
        (Value::Pending(x), Value::Pending(y)) => x.ptr_eq(y),
        (Value::Subject(x), Value::Subject(y)) => x.ptr_eq(y),
        (Value::Action(x), Value::Action(y)) => x.ptr_eq(y),
        _ => false,
    }
}

/// Element-wise strict equality for value slices.
///
/// Used to compare whole sequences (e.g. a live view against its source)
/// without requiring the slices to share identity.
pub fn equals_slice(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_equals(x, y))
}

// =============================================================================
// TESTS
// =============================================================================

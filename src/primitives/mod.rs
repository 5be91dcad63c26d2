// ============================================================================
// spark-live - Primitives Module
// The observable surface and live bindings between records
// ============================================================================

pub mod live_object;
pub mod observable;

// Re-export for convenience
pub use live_object::{ComputeFn, FieldStore, FieldTarget, LiveObject, PlainRecord, Transform};
pub use observable::Observable;

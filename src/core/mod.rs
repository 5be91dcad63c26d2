// ============================================================================
// spark-live - Core Module
// Fundamental types, errors, subjects and the thread-local runtime context
// ============================================================================

pub mod constants;
pub mod context;
pub mod error;
pub mod keys;
pub mod subject;
pub mod types;

// Re-export commonly used items
pub use context::{is_batching, is_flushing, queued_tasks, set_max_flush_passes, with_context, RuntimeContext, TaskKey};
pub use error::{no_throw, LiveError, Result};
pub use keys::{Key, Keys};
pub use subject::{Subject, WeakSubject};
pub use types::{Action, Event, Handler, Value};

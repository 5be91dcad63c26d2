// ============================================================================
// spark-live - Reactivity Module
// Event dispatch, property traps, scheduling and pending values
// ============================================================================

pub mod equality;
pub mod events;
pub mod pending;
pub mod scheduling;
pub mod traps;

pub use events::{emit, trigger, EventRegistry};
pub use pending::{pending, Pending, Resolver};
pub use scheduling::{batch, defer, schedule, tick};
pub use traps::{set_value, trap_property, TrapStore};

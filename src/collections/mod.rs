// ============================================================================
// spark-live - Live Collections
// Sequences whose mutations are observable
// ============================================================================
//
// A LiveArray reports every mutation twice: once as the call itself (named
// after the mutator) and once translated into element-level `$add` and
// `$remove` events. Live views (map, live_sort) are built on the call
// events; live iteration (for_each, for_exit) on the element events.
// ============================================================================

mod live_array;

pub use live_array::{Compare, Generator, LiveArray};

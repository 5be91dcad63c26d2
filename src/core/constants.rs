// ============================================================================
// spark-live - Constants
// Reserved event names and runtime defaults
// ============================================================================

// =============================================================================
// RESERVED EVENT NAMES
// =============================================================================

/// Wildcard type: handlers registered here observe every event on a subject
pub const WILDCARD: &str = "*";

/// Fired after any trapped field changes, alongside the field's own event
pub const SET: &str = "$set";

/// Fired by live arrays for every item entering the sequence
pub const ADD: &str = "$add";

/// Fired by live arrays for every item leaving the sequence
pub const REMOVE: &str = "$remove";

/// Coalesced aggregate notification, delivered on the next tick
pub const CHANGE: &str = "$change";

/// Prefix for the manual invalidation channel of a computed field
pub const OUTDATE_PREFIX: &str = "outdate:";

/// Prefix marking a key as a pure event channel (never trapped)
pub const CHANNEL_PREFIX: char = '$';

// =============================================================================
// LIVE ARRAY MUTATORS
// =============================================================================
//
// Each mutating call on a live array reports itself as an action event under
// these names, with payload [List(arguments), returned, key, context].
// =============================================================================

pub const APPEND: &str = "append";
pub const REMOVE_LAST: &str = "remove_last";
pub const REMOVE_FIRST: &str = "remove_first";
pub const INSERT_FIRST: &str = "insert_first";
pub const SPLICE_RANGE: &str = "splice_range";

/// All mutator names, declared as event channels on the live array prototype
pub const MUTATORS: [&str; 5] = [APPEND, REMOVE_LAST, REMOVE_FIRST, INSERT_FIRST, SPLICE_RANGE];

// =============================================================================
// SCHEDULER TASK NAMES
// =============================================================================

/// Task name used to coalesce `$change` notifications per subject
pub const CHANGE_TASK: &str = "change";

/// Task name used to coalesce live-sort passes per view
pub const RESORT_TASK: &str = "resort";

// =============================================================================
// DEFAULTS
// =============================================================================

/// Maximum scheduler drain passes per tick before the flush gives up.
///
/// Tasks left over stay queued and run on the next tick.
pub const MAX_FLUSH_PASSES: u32 = 1000;

// =============================================================================
// TESTS
// =============================================================================

// ============================================================================
// spark-live - Observable Records and Live Collections for Rust
// ============================================================================
//
// Trap-based reactive state: subscribing to a field moves it behind a trap,
// so every later write (or action call) is reported to its handlers. On top
// of that sit live bindings between records, computed fields, and live
// arrays whose projections and sorted views follow their source.
// ============================================================================

#[macro_use]
mod macros;

pub mod collections;
pub mod core;
pub mod primitives;
pub mod reactivity;

// Re-export core items at crate root for ergonomic access
pub use core::constants;
pub use core::context::{
    is_batching, is_flushing, queued_tasks, set_max_flush_passes, with_context, RuntimeContext,
    TaskKey,
};
pub use core::error::{no_throw, LiveError, Result};
pub use core::keys::{Key, Keys};
pub use core::subject::{Subject, WeakSubject};
pub use core::types::{Action, Event, Handler, Value, WeakHandler};

// Re-export primitives
pub use primitives::live_object::{
    ComputeFn, FieldStore, FieldTarget, LiveObject, PlainRecord, Transform,
};
pub use primitives::observable::Observable;

// Re-export reactivity functions
pub use reactivity::equality::{equals_slice, safe_equals_f64, strict_equals};
pub use reactivity::events::{emit, EventRegistry};
pub use reactivity::pending::{pending, Pending, Resolver};
pub use reactivity::scheduling::{batch, defer, schedule, tick};

// Re-export collections
pub use collections::{Compare, Generator, LiveArray};

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn constants_are_distinct_channels() {
        for name in [constants::SET, constants::ADD, constants::REMOVE, constants::CHANGE] {
            assert!(Key::from(name).is_channel(), "{name} should be a channel");
        }
        assert!(!Key::from(constants::APPEND).is_channel());
        assert_eq!(constants::MUTATORS.len(), 5);
    }

    #[test]
    fn record_macro_builds_ordered_fields() {
        let base = record! { "a" => 1 };
        let child = record! { base; "b" => 2, "c" => "x" };
        assert_eq!(child.get("a"), Value::from(1));
        assert_eq!(child.keys(), vec![Key::from("b"), Key::from("c")]);
        assert!(record!().keys().is_empty());
    }

    #[test]
    fn field_writes_notify_after_subscription_only() {
        let user = Subject::new();
        user.assign("name", "Ada");

        let seen = Rc::new(RefCell::new(Vec::new()));
        user.on("name", cloned!(seen => move |e| seen.borrow_mut().push(e.value())));

        assert_eq!(user.get("name"), Value::from("Ada"));
        user.assign("name", "Grace");
        user.assign("name", "Grace");
        assert_eq!(*seen.borrow(), vec![Value::from("Grace")]);
    }

    #[test]
    fn computed_field_follows_its_dependencies() {
        let rect = record! { "w" => 2, "h" => 3 };
        rect.define("area", ["w", "h"], |r| {
            Ok(Value::from(r.get("w").as_int().unwrap_or(0) * r.get("h").as_int().unwrap_or(0)))
        });
        assert_eq!(rect.get("area"), Value::from(6));

        rect.assign("w", 5);
        assert_eq!(rect.get("area"), Value::from(15));
    }

    #[test]
    fn bound_record_updates_a_plain_target() {
        let settings = Subject::new();
        let view = PlainRecord::new();
        settings.push("theme", &view);

        settings.assign("theme", "dark");
        assert_eq!(view.get("theme"), Value::from("dark"));
    }

    #[test]
    fn live_array_views_stay_in_sync() {
        let source: LiveArray = [3, 1, 2].into_iter().collect();
        let doubled = source.map_with(|v| Value::from(v.as_int().unwrap_or(0) * 2));
        let sorted = source.live_sort(|a, b| a.as_int().cmp(&b.as_int()));

        source.append(0);
        source.remove_first();

        let as_ints = |a: &LiveArray| a.values().iter().filter_map(Value::as_int).collect::<Vec<_>>();
        assert_eq!(as_ints(&doubled), vec![2, 4, 0]);
        assert_eq!(as_ints(&sorted), vec![0, 1, 2]);
    }

    #[test]
    fn batch_collapses_change_notifications() {
        let list = LiveArray::new();
        let changes = Rc::new(Cell::new(0));
        list.on(constants::CHANGE, cloned!(changes => move |_| changes.set(changes.get() + 1)));

        batch(|| {
            list.append(1);
            list.append(2);
            list.insert_first(0);
        });
        assert_eq!(changes.get(), 1);
        assert!(!is_batching());
        assert_eq!(queued_tasks(), 0);
    }
}

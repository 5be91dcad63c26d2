// ============================================================================
// spark-live - Observable
// Subscribe / unsubscribe / fire / relay on top of the event registry
// ============================================================================
//
// Observable is a mixin trait: implementors only say which subject they are,
// and get the whole event surface. Subscribing to a field or action name traps
// it as a side effect, so handlers see every later write or call.
// ============================================================================

use crate::core::constants::{CHANGE, CHANGE_TASK};
use crate::core::context::TaskKey;
use crate::core::keys::{Key, Keys};
use crate::core::subject::{Relay, Subject};
use crate::core::types::{Event, Handler, Value};
use crate::reactivity::events::emit;
use crate::reactivity::scheduling::schedule;
use crate::reactivity::traps::trap_property;

// =============================================================================
// OBSERVABLE TRAIT
// =============================================================================

/// Event capabilities shared by every observable type.
///
/// # Example
///
/// ```
/// use spark_live::{Observable, Subject, Value};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let point = Subject::new();
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let sink = log.clone();
/// point.on("$set", move |e| sink.borrow_mut().push((e.key(), e.value())));
/// point.trap(["x", "y"]);
///
/// point.assign("x", 1);
/// point.assign("y", 2);
/// assert_eq!(log.borrow().len(), 2);
/// assert_eq!(log.borrow()[1].1, Value::from(2));
/// ```
pub trait Observable {
    /// The subject carrying this observable's state.
    fn subject(&self) -> &Subject;

    /// Register `handler` for each of `types`, trapping every non-channel
    /// name first. Registering the same handler twice is a no-op.
    fn subscribe(&self, types: impl Into<Keys>, handler: &Handler) {
        let subject = self.subject();
        for key in types.into() {
            trap_property(subject, &key);
            subject.events_mut().put(key, handler.clone());
        }
    }

    /// Subscribe a closure to one type, returning the handler for a later
    /// `unsubscribe`.
    fn on(&self, event_type: impl Into<Key>, f: impl Fn(&Event) + 'static) -> Handler {
        let handler = Handler::new(f);
        let key: Key = event_type.into();
        self.subscribe(key, &handler);
        handler
    }

    /// The record form of `subscribe`: one handler per type.
    fn subscribe_map<K: Into<Key>>(&self, pairs: impl IntoIterator<Item = (K, Handler)>) {
        for (key, handler) in pairs {
            let key: Key = key.into();
            self.subscribe(key, &handler);
        }
    }

    /// Remove `handler` from each of `types`, or every handler of those types
    /// when `handler` is `None`.
    fn unsubscribe(&self, types: impl Into<Keys>, handler: Option<&Handler>) {
        let mut events = self.subject().events_mut();
        for key in types.into() {
            events.delete(&key, handler);
        }
    }

    /// Remove every handler registered on this subject.
    fn unsubscribe_all(&self) {
        self.subject().events_mut().clear();
    }

    /// Trap names without subscribing anything.
    fn trap(&self, types: impl Into<Keys>) {
        let subject = self.subject();
        for key in types.into() {
            trap_property(subject, &key);
        }
    }

    /// Trigger each of `types` with `args`, without touching any trap.
    fn fire(&self, types: impl Into<Keys>, args: &[Value]) {
        let subject = self.subject();
        for key in types.into() {
            emit(subject, &key, args);
        }
    }

    /// Subscribe `handler` on `source`, recording the subscription on this
    /// subject so it can be torn down with `unrelay` / `unrelay_all`.
    fn relay(&self, source: &impl Observable, types: impl Into<Keys>, handler: &Handler) {
        let weak = source.subject().downgrade();
        for key in types.into() {
            source.subscribe(key.clone(), handler);
            self.subject().relays_mut().push(Relay {
                source: weak.clone(),
                event_type: key,
                handler: handler.clone(),
            });
        }
    }

    /// Undo relays registered through this subject on `source` for `types`:
    /// only `handler`, or every relayed handler when `None`.
    fn unrelay(&self, source: &impl Observable, types: impl Into<Keys>, handler: Option<&Handler>) {
        let source = source.subject();
        let types = types.into();
        let removed: Vec<Relay> = {
            let mut relays = self.subject().relays_mut();
            let (removed, kept): (Vec<Relay>, Vec<Relay>) = std::mem::take(&mut *relays).into_iter().partition(|relay| {
                relay.source.upgrade().is_some_and(|s| s.ptr_eq(source))
                    && types.iter().any(|t| *t == relay.event_type)
                    && handler.is_none_or(|h| h.ptr_eq(&relay.handler))
            });
            *relays = kept;
            removed
        };

        let mut events = source.events_mut();
        for relay in removed {
            events.delete(&relay.event_type, Some(&relay.handler));
        }
    }

    /// Undo every relay registered through this subject.
    fn unrelay_all(&self) {
        let relays = std::mem::take(&mut *self.subject().relays_mut());
        for relay in relays {
            if let Some(source) = relay.source.upgrade() {
                source.events_mut().delete(&relay.event_type, Some(&relay.handler));
            }
        }
    }

    /// Release resources held by the observable. No-op by default.
    fn destroy(&self) {}

    /// Schedule one `$change` notification for the next tick. Requests made
    /// before it runs collapse into it.
    fn change(&self) {
        let subject = self.subject();
        let weak = subject.downgrade();
        schedule(TaskKey::new(subject.id(), CHANGE_TASK), move || {
            if let Some(subject) = weak.upgrade() {
                emit(&subject, &Key::from(CHANGE), &[]);
            }
        });
    }
}

impl Observable for Subject {
    fn subject(&self) -> &Subject {
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactivity::scheduling::tick;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn counter() -> (Rc<Cell<u32>>, Handler) {
        let count = Rc::new(Cell::new(0));
        let sink = count.clone();
        (count, Handler::new(move |_| sink.set(sink.get() + 1)))
    }

    #[test]
    fn subscribe_traps_the_field() {
        let subject = Subject::new();
        subject.assign("foo", 1);
        let (count, handler) = counter();
        subject.subscribe("foo", &handler);

        assert!(subject.is_trapped(&Key::from("foo")));
        subject.assign("foo", 2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn subscribe_many_types_at_once() {
        let subject = Subject::new();
        let (count, handler) = counter();
        subject.subscribe(["a", "b"], &handler);

        subject.assign("a", 1);
        subject.assign("b", 1);
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn subscribe_map_registers_each_pair() {
        let subject = Subject::new();
        let (a_count, a) = counter();
        let (b_count, b) = counter();
        subject.subscribe_map([("a", a), ("b", b)]);

        subject.assign("b", 1);
        assert_eq!((a_count.get(), b_count.get()), (0, 1));
    }

    #[test]
    fn unsubscribe_one_or_all() {
        let subject = Subject::new();
        let (first_count, first) = counter();
        let (second_count, second) = counter();
        subject.subscribe("x", &first);
        subject.subscribe("x", &second);

        subject.unsubscribe("x", Some(&first));
        subject.assign("x", 1);
        assert_eq!((first_count.get(), second_count.get()), (0, 1));

        subject.unsubscribe("x", None);
        subject.assign("x", 2);
        assert_eq!(second_count.get(), 1);

        subject.subscribe(["x", "y"], &first);
        subject.unsubscribe_all();
        subject.assign("y", 1);
        assert_eq!(first_count.get(), 0);
    }

    #[test]
    fn fire_does_not_trap() {
        let subject = Subject::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        subject.on("$ping", move |e| *sink.borrow_mut() = e.args.clone());

        subject.fire("$ping", &[Value::from("bar")]);
        assert_eq!(*seen.borrow(), vec![Value::from("bar")]);
        assert!(subject.keys().is_empty());
    }

    #[test]
    fn relay_subscribes_on_the_source() {
        let source = Subject::new();
        let listener = Subject::new();
        let (count, handler) = counter();
        listener.relay(&source, "x", &handler);

        source.assign("x", 1);
        assert_eq!(count.get(), 1);

        listener.unrelay(&source, "x", None);
        source.assign("x", 2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn unrelay_leaves_foreign_handlers_alone() {
        let source = Subject::new();
        let listener = Subject::new();
        let (own_count, own) = counter();
        let (relayed_count, relayed) = counter();
        source.subscribe("x", &own);
        listener.relay(&source, "x", &relayed);

        listener.unrelay_all();
        source.assign("x", 1);
        assert_eq!((own_count.get(), relayed_count.get()), (1, 0));
    }

    #[test]
    fn change_coalesces_within_a_tick() {
        let subject = Subject::new();
        let (count, handler) = counter();
        subject.subscribe("$change", &handler);

        subject.change();
        subject.change();
        subject.change();
        assert_eq!(count.get(), 0);

        tick();
        assert_eq!(count.get(), 1);
    }
}

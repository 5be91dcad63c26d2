// ============================================================================
// spark-live - Event Registry
// Per-subject handler sets with delegation-aware, failure-isolated dispatch
// ============================================================================
//
// Every subject owns one registry: event type -> insertion-ordered set of
// unique handlers. Dispatch walks the subject's parent chain, so handlers
// registered on an ancestor (a shared prototype) observe events triggered on
// its descendants, with the descendant as the event context.
//
// Dispatch order for one trigger:
//   1. the ancestor chain, root-most first
//   2. local handlers for the exact type
//   3. local wildcard ("*") handlers
// ============================================================================

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::core::error::panic_message;
use crate::core::keys::Key;
use crate::core::subject::Subject;
use crate::core::types::{Event, Handler, Value};

// =============================================================================
// EVENT REGISTRY
// =============================================================================

/// Handlers registered on one subject, keyed by event type.
#[derive(Default, Debug)]
pub struct EventRegistry {
    handlers: HashMap<Key, Vec<Handler>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every handler of every type.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Register `handler` for `event_type`. Registering the same handler
    /// twice for one type is a no-op.
    pub fn put(&mut self, event_type: Key, handler: Handler) {
        let set = self.handlers.entry(event_type).or_default();
        if !set.iter().any(|h| h.ptr_eq(&handler)) {
            set.push(handler);
        }
    }

    /// Remove one handler, or the whole type when `handler` is `None`.
    pub fn delete(&mut self, event_type: &Key, handler: Option<&Handler>) {
        match handler {
            None => {
                self.handlers.remove(event_type);
            }
            Some(handler) => {
                if let Some(set) = self.handlers.get_mut(event_type) {
                    set.retain(|h| !h.ptr_eq(handler));
                    if set.is_empty() {
                        self.handlers.remove(event_type);
                    }
                }
            }
        }
    }

    /// Snapshot of the handlers for a type.
    ///
    /// Dispatch iterates the snapshot, so handlers may (un)subscribe while an
    /// event is being delivered without disturbing the current delivery.
    pub fn handlers(&self, event_type: &Key) -> Vec<Handler> {
        self.handlers.get(event_type).cloned().unwrap_or_default()
    }

    pub fn contains(&self, event_type: &Key, handler: &Handler) -> bool {
        self.handlers
            .get(event_type)
            .is_some_and(|set| set.iter().any(|h| h.ptr_eq(handler)))
    }

    /// Number of handlers registered for a type.
    pub fn count(&self, event_type: &Key) -> usize {
        self.handlers.get(event_type).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// =============================================================================
// TRIGGER
// =============================================================================

/// Deliver `event_type` with `args` to every handler registered on `provider`
/// and its ancestors, with `context` as the event receiver.
///
/// Handlers run synchronously. A panicking handler is logged and skipped; it
/// neither stops its siblings nor unwinds into the caller.
pub fn trigger(provider: &Subject, context: &Subject, event_type: &Key, args: &[Value]) {
    if let Some(parent) = provider.parent() {
        trigger(parent, context, event_type, args);
    }

    let (typed, wildcard) = {
        let registry = provider.events();
        let typed = registry.handlers(event_type);
        let wildcard = if event_type.is_wildcard() {
            Vec::new()
        } else {
            registry.handlers(&Key::wildcard())
        };
        (typed, wildcard)
    };

    if typed.is_empty() && wildcard.is_empty() {
        return;
    }

    let event = Event {
        event_type: event_type.clone(),
        context: context.clone(),
        args: args.to_vec(),
    };
    really_trigger(&event, &typed);
    really_trigger(&event, &wildcard);
}

/// Trigger an event on a subject, starting from the subject itself.
pub fn emit(subject: &Subject, event_type: &Key, args: &[Value]) {
    trigger(subject, subject, event_type, args);
}

fn really_trigger(event: &Event, handlers: &[Handler]) {
    for handler in handlers {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler.call(event))) {
            tracing::warn!(
                event = %event.event_type,
                subject = event.context.id(),
                "event handler panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

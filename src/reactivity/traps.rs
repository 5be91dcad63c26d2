// ============================================================================
// spark-live - Property Traps
// Shadow store and the interception of field writes and action calls
// ============================================================================
//
// Trapping a field moves its value into the subject's TrapStore. From then on
// reads come from the store and writes go through `set_value`, which fires
// the field's own event and `$set`. Trapping an action replaces it with a
// locked wrapper that reports every call (arguments and result) as an event.
//
// Sequences trap all of their positions at once: the whole content moves into
// the shadow sequence, and `reconcile_sequence_traps` keeps the installed trap
// count equal to the shadow length after every mutation.
// ============================================================================

use std::collections::HashMap;

use crate::core::constants::SET;
use crate::core::keys::Key;
use crate::core::subject::Subject;
use crate::core::types::{Action, Value};
use crate::reactivity::equality::strict_equals;
use crate::reactivity::events::emit;
use crate::reactivity::pending::Pending;

// =============================================================================
// TRAP STORE
// =============================================================================

/// Shadow values of one subject's trapped fields.
#[derive(Default, Debug)]
pub struct TrapStore {
    values: HashMap<Key, Value>,
    sequence: Option<Vec<Value>>,
    installed: usize,
}

impl TrapStore {
    pub fn get(&self, key: &Key) -> Option<Value> {
        match (key, &self.sequence) {
            (Key::Index(i), Some(shadow)) => shadow.get(*i).cloned(),
            _ => self.values.get(key).cloned(),
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        match (key, &self.sequence) {
            (Key::Index(i), Some(shadow)) => *i < shadow.len(),
            _ => self.values.contains_key(key),
        }
    }

    /// Store a shadow value. Sequence positions past the end are refused.
    pub fn write(&mut self, key: &Key, value: Value) -> bool {
        match (key, &mut self.sequence) {
            (Key::Index(i), Some(shadow)) => match shadow.get_mut(*i) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => {
                self.values.insert(key.clone(), value);
                true
            }
        }
    }

    /// Whether sequence traps are installed.
    pub fn is_live(&self) -> bool {
        self.sequence.is_some()
    }

    pub fn sequence(&self) -> Option<&[Value]> {
        self.sequence.as_deref()
    }

    pub(crate) fn sequence_mut(&mut self) -> Option<&mut Vec<Value>> {
        self.sequence.as_mut()
    }

    /// Number of sequence positions currently trapped.
    pub fn installed(&self) -> usize {
        self.installed
    }

    /// Number of trapped named fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.sequence.is_none()
    }
}

// =============================================================================
// TRAP INSTALLATION
// =============================================================================

/// Trap `key` on `target`: actions get a call-reporting wrapper, anything
/// else (including a missing field) gets a shadow-store trap.
///
/// Event channels are never trapped.
pub fn trap_property(target: &Subject, key: &Key) {
    if target.is_event_channel(key) {
        return;
    }
    match target.get(key) {
        Value::Action(action) => trap_function(target, key, action),
        _ => trap_value(target, key),
    }
}

/// Move the current value of `key` into the shadow store. No-op when the key
/// is already trapped on `target` or one of its ancestors.
pub fn trap_value(target: &Subject, key: &Key) {
    if target.is_sequence() && key.as_index().is_some() {
        setup_sequence_traps(target);
        return;
    }
    if target.is_trapped(key) {
        return;
    }

    let current = target.take_plain(key).unwrap_or_else(|| target.get(key));
    target.traps_mut().write(key, current);
    target.note_key(key);

    tracing::trace!(subject = target.id(), key = %key, "trapped field");
}

/// Replace the action at `key` with a wrapper reporting each call to `key`
/// subscribers. An action is wrapped at most once.
pub fn trap_function(target: &Subject, key: &Key, action: Action) {
    if action.is_trapped() {
        return;
    }

    let name = key.clone();
    let wrapper = Action::trapped(move |context, args| call_function(context, &name, &action, args));
    target.write_plain(key.clone(), Value::Action(wrapper));

    tracing::trace!(subject = target.id(), key = %key, "trapped action");
}

/// Invoke `wrapped`, then fire `key` with `[arguments, result, key, context]`.
///
/// When the result is pending, the event fires once it settles, carrying the
/// settled value.
pub fn call_function(context: &Subject, key: &Key, wrapped: &Action, args: &[Value]) -> Value {
    let returned = wrapped.invoke(context, args);

    match &returned {
        Value::Pending(pending) => {
            let context = context.clone();
            let key = key.clone();
            let args = args.to_vec();
            pending.then(move |settled| notify_call(&context, &key, args, settled.clone()));
        }
        _ => notify_call(context, key, args.to_vec(), returned.clone()),
    }

    returned
}

/// Fire the call event for `key` on `context`.
pub(crate) fn notify_call(context: &Subject, key: &Key, args: Vec<Value>, returned: Value) {
    emit(
        context,
        key,
        &[Value::list(args), returned, key.to_value(), Value::from(context)],
    );
}

// =============================================================================
// WRITES
// =============================================================================

/// Write a trapped field and notify.
///
/// With `check`, a value strictly equal to the current one is dropped without
/// touching the store or firing anything. Otherwise the shadow store is
/// updated, then `key` and `$set` fire with `[value, old, key, target]`.
///
/// Returns whether the write happened.
pub fn set_value(target: &Subject, key: &Key, value: Value, check: bool) -> bool {
    let old = target.get(key);
    if check && strict_equals(&value, &old) {
        return false;
    }

    let written = target.traps_mut().write(key, value.clone());
    if !written {
        tracing::debug!(subject = target.id(), key = %key, "index write past the end");
        return false;
    }
    target.note_key(key);

    let args = [value.clone(), old, key.to_value(), Value::from(target)];
    emit(target, key, &args);
    emit(target, &Key::from(SET), &args);

    if let Value::Pending(pending) = &value {
        auto_update(target, key, pending);
    }
    true
}

/// Once `pending` settles, write the settled value into `key` if the field
/// still holds that same pending value.
fn auto_update(target: &Subject, key: &Key, pending: &Pending) {
    let weak = target.downgrade();
    let key = key.clone();
    let expected = pending.clone();

    pending.then(move |settled| {
        let Some(target) = weak.upgrade() else {
            return;
        };
        let still_waiting = target
            .get(&key)
            .as_pending()
            .is_some_and(|current| current.ptr_eq(&expected));

        if still_waiting {
            set_value(&target, &key, settled.clone(), false);
        } else {
            tracing::debug!(
                subject = target.id(),
                key = %key,
                "discarding stale resolution"
            );
        }
    });
}

// =============================================================================
// SEQUENCES
// =============================================================================

/// Move a sequence's positions into the shadow store and trap them all.
/// Returns false when the traps were already installed.
pub fn setup_sequence_traps(target: &Subject) -> bool {
    if target.traps().is_live() {
        return false;
    }

    let items = target.take_items();
    let len = items.len();
    {
        let mut store = target.traps_mut();
        store.sequence = Some(items);
        store.installed = len;
    }

    tracing::trace!(subject = target.id(), len, "installed sequence traps");
    true
}

/// Align the installed trap count with the shadow length after a mutation.
///
/// Positions past the new end lose their traps together with their per-index
/// event handlers; positions gained are trapped.
pub fn reconcile_sequence_traps(target: &Subject) {
    let (installed, len) = {
        let store = target.traps();
        (store.installed, store.sequence.as_ref().map_or(0, Vec::len))
    };

    if len < installed {
        let mut events = target.events_mut();
        for index in len..installed {
            events.delete(&Key::Index(index), None);
        }
    }
    target.traps_mut().installed = len;

    debug_assert_eq!(target.traps().installed, target.seq_len());
    tracing::trace!(subject = target.id(), installed, len, "reconciled sequence traps");
}

// =============================================================================
// TESTS
// =============================================================================

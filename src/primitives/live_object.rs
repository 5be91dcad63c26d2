// ============================================================================
// spark-live - Live Object
// Field bindings between subjects and dependency-tracked computed fields
// ============================================================================
//
// Bindings:
// - push / pull: one field, one direction, kept in sync on every change
// - export / import / pick: batch forms over a key list
// - link: pick, then export both ways
//
// Computed fields:
// - define / custom_define: recompute a field whenever a dependency changes
// - compute: force recomputation through the field's outdate channel
//
// Binding handlers capture their targets weakly and read their source from
// the event context, so two linked subjects never keep each other alive.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::core::error::{panic_message, LiveError, Result};
use crate::core::keys::{Key, Keys};
use crate::core::subject::{Subject, WeakSubject};
use crate::core::types::{Handler, Value};
use crate::primitives::observable::Observable;
use crate::reactivity::events::emit;
use crate::reactivity::traps::{set_value, trap_property};

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// Value mapping applied by a binding on its way to the target.
pub type Transform = Rc<dyn Fn(&Value) -> Value>;

/// Body of a computed field. Receives the subject the field lives on.
pub type ComputeFn = Rc<dyn Fn(&Subject) -> Result<Value>>;

fn apply(transform: &Option<Transform>, value: Value) -> Value {
    match transform {
        Some(f) => f(&value),
        None => value,
    }
}

// =============================================================================
// FIELD STORES
// =============================================================================

/// Anything a binding can read from or write to.
///
/// Subjects are live stores: writes go through their traps and bindings to
/// them are registered as relays. Plain records are passive: writes are
/// silent and pulling from one is a one-shot copy.
pub trait FieldStore {
    fn has_field(&self, key: &Key) -> bool;

    fn read_field(&self, key: &Key) -> Value;

    fn write_field(&self, key: &Key, value: Value);

    /// The live subject behind this store, if any.
    fn as_subject(&self) -> Option<&Subject> {
        None
    }

    /// A handle a binding can keep to write into this store later.
    fn to_target(&self) -> FieldTarget;
}

impl FieldStore for Subject {
    fn has_field(&self, key: &Key) -> bool {
        self.has(key)
    }

    fn read_field(&self, key: &Key) -> Value {
        self.get(key)
    }

    fn write_field(&self, key: &Key, value: Value) {
        self.assign(key, value);
    }

    fn as_subject(&self) -> Option<&Subject> {
        Some(self)
    }

    fn to_target(&self) -> FieldTarget {
        FieldTarget::Live(self.downgrade())
    }
}

/// Where a binding writes.
#[derive(Clone, Debug)]
pub enum FieldTarget {
    Live(WeakSubject),
    Plain(PlainRecord),
}

impl FieldTarget {
    pub fn write(&self, key: &Key, value: Value) {
        match self {
            FieldTarget::Live(weak) => {
                if let Some(subject) = weak.upgrade() {
                    subject.assign(key, value);
                }
            }
            FieldTarget::Plain(record) => record.write_field(key, value),
        }
    }
}

/// A passive record with no events, shared by handle.
///
/// ```
/// use spark_live::{LiveObject, PlainRecord, Subject, Value};
///
/// let form = PlainRecord::new();
/// let user = Subject::new();
/// user.push("name", &form);
///
/// user.assign("name", "Grace");
/// assert_eq!(form.get("name"), Value::from("Grace"));
/// ```
#[derive(Clone, Default)]
pub struct PlainRecord {
    fields: Rc<RefCell<Vec<(Key, Value)>>>,
}

impl PlainRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        self.fields
            .borrow()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default()
    }

    pub fn set(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let mut fields = self.fields.borrow_mut();
        match fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => fields.push((key, value)),
        }
    }

    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.fields.borrow().iter().any(|(k, _)| *k == key)
    }

    pub fn keys(&self) -> Vec<Key> {
        self.fields.borrow().iter().map(|(k, _)| k.clone()).collect()
    }
}

impl fmt::Debug for PlainRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.fields.borrow().iter().map(|(k, v)| (k.clone(), v.clone())))
            .finish()
    }
}

impl FieldStore for PlainRecord {
    fn has_field(&self, key: &Key) -> bool {
        self.has(key)
    }

    fn read_field(&self, key: &Key) -> Value {
        self.get(key)
    }

    fn write_field(&self, key: &Key, value: Value) {
        self.set(key, value);
    }

    fn to_target(&self) -> FieldTarget {
        FieldTarget::Plain(self.clone())
    }
}

// =============================================================================
// LIVE OBJECT TRAIT
// =============================================================================

/// Bindings and computed fields for observable records.
///
/// # Example
///
/// ```
/// use spark_live::{LiveObject, Subject, Value};
///
/// let square = Subject::new();
/// square.define("area", "length", |this| {
///     let length = this.get("length").as_int().unwrap_or(0);
///     Ok(Value::from(length * length))
/// });
/// assert_eq!(square.get("area"), Value::Unset);
///
/// square.assign("length", 4);
/// assert_eq!(square.get("area"), Value::from(16));
/// ```
pub trait LiveObject: Observable {
    // =========================================================================
    // PUSH / PULL
    // =========================================================================

    /// Keep `target[key]` equal to `self[key]`.
    fn push(&self, key: impl Into<Key>, target: &impl FieldStore) {
        let key = key.into();
        self.push_as(key.clone(), target, key, None);
    }

    /// Keep `target[target_key]` equal to `transform(self[key])`, writing it
    /// once right away.
    ///
    /// When the target is another subject, the subscription is a relay
    /// registered through the target, so `target.unrelay_all()` drops it.
    fn push_as(
        &self,
        key: impl Into<Key>,
        target: &impl FieldStore,
        target_key: impl Into<Key>,
        transform: Option<Transform>,
    ) {
        let key = key.into();
        let target_key = target_key.into();
        let sink = target.to_target();

        let deliver: Rc<dyn Fn(&Subject)> = {
            let key = key.clone();
            Rc::new(move |source: &Subject| {
                let value = apply(&transform, source.get(&key));
                sink.write(&target_key, value);
            })
        };
        let handler = {
            let deliver = deliver.clone();
            Handler::new(move |e| deliver(&e.context))
        };

        let subject = self.subject();
        match target.as_subject() {
            Some(live) if !live.ptr_eq(subject) => live.relay(subject, key.clone(), &handler),
            _ => self.subscribe(key.clone(), &handler),
        }

        if subject.has(&key) {
            deliver(subject);
        }
    }

    /// Keep `self[key]` equal to `source[key]`.
    fn pull(&self, key: impl Into<Key>, source: &impl FieldStore) {
        let key = key.into();
        self.pull_as(key.clone(), source, key, None);
    }

    /// Keep `self[key]` equal to `transform(source[source_key])`.
    ///
    /// A live source drives the binding through its own `push`; a plain
    /// source is copied once, when it has the field.
    fn pull_as(
        &self,
        key: impl Into<Key>,
        source: &impl FieldStore,
        source_key: impl Into<Key>,
        transform: Option<Transform>,
    ) {
        let key = key.into();
        let source_key = source_key.into();

        match source.as_subject() {
            Some(live) => live.push_as(source_key, self.subject(), key, transform),
            None => {
                if source.has_field(&source_key) {
                    let value = apply(&transform, source.read_field(&source_key));
                    self.subject().assign(key, value);
                }
            }
        }
    }

    // =========================================================================
    // EXPORT / IMPORT / PICK / LINK
    // =========================================================================

    /// `push` every key to `target`.
    fn export(&self, target: &impl FieldStore, keys: impl Into<Keys>, transform: Option<Transform>) {
        for key in keys.into() {
            self.push_as(key.clone(), target, key, transform.clone());
        }
    }

    /// `pull` every key `source` has.
    fn import(&self, source: &impl FieldStore, keys: impl Into<Keys>, transform: Option<Transform>) {
        for key in keys.into() {
            if source.has_field(&key) {
                self.pull_as(key.clone(), source, key, transform.clone());
            }
        }
    }

    /// Copy every key `source` has, once.
    fn pick(&self, source: &impl FieldStore, keys: impl Into<Keys>, transform: Option<Transform>) {
        for key in keys.into() {
            if source.has_field(&key) {
                let value = apply(&transform, source.read_field(&key));
                self.subject().assign(key, value);
            }
        }
    }

    /// Bind `keys` both ways between `self` and `target`.
    ///
    /// `self` first takes the target's current values; after that, the last
    /// writer wins. Equal writes are dropped by the traps, which is what stops
    /// the two bindings from feeding each other forever.
    fn link(&self, target: &impl LiveObject, keys: impl Into<Keys>) {
        let keys = keys.into();
        self.pick(target.subject(), keys.clone(), None);
        self.export(target.subject(), keys.clone(), None);
        target.export(self.subject(), keys, None);
    }

    // =========================================================================
    // COMPUTED FIELDS
    // =========================================================================

    /// Computed field that short-circuits on error or pending dependencies.
    fn define(
        &self,
        key: impl Into<Key>,
        dependencies: impl Into<Keys>,
        compute: impl Fn(&Subject) -> Result<Value> + 'static,
    ) {
        self.custom_define(key, dependencies, compute, true);
    }

    /// Computed field recomputed whenever a dependency changes or
    /// `compute(key)` is called.
    ///
    /// - any dependency unset: the field becomes `Unset`
    /// - with `safe`, the first error or pending dependency becomes the
    ///   field's value without running `compute`
    /// - an `Err` or a panic from `compute` becomes the field's error value
    ///
    /// The field is evaluated right away unless the subject is a prototype.
    fn custom_define(
        &self,
        key: impl Into<Key>,
        dependencies: impl Into<Keys>,
        compute: impl Fn(&Subject) -> Result<Value> + 'static,
        safe: bool,
    ) {
        let key = key.into();
        let dependencies = dependencies.into();
        let compute: ComputeFn = Rc::new(compute);

        let handler = {
            let key = key.clone();
            let dependencies = dependencies.clone();
            let compute = compute.clone();
            Handler::new(move |e| evaluate(&e.context, &key, &dependencies, &compute, safe))
        };

        let subject = self.subject();
        self.subscribe(dependencies.clone(), &handler);
        subject.events_mut().put(Key::outdate(&key), handler);

        if !subject.is_prototype() {
            evaluate(subject, &key, &dependencies, &compute, safe);
        }
    }

    /// Recompute computed fields now.
    fn compute(&self, keys: impl Into<Keys>) {
        let subject = self.subject();
        for key in keys.into() {
            emit(subject, &Key::outdate(&key), &[]);
        }
    }

    // =========================================================================
    // FORCED WRITES
    // =========================================================================

    /// Write and notify even when the value is unchanged.
    fn set(&self, keys: impl Into<Keys>, value: impl Into<Value>) {
        let subject = self.subject();
        let value = value.into();
        for key in keys.into() {
            trap_property(subject, &key);
            set_value(subject, &key, value.clone(), false);
        }
    }

    /// The record form of `set`.
    fn set_many<K: Into<Key>, V: Into<Value>>(&self, pairs: impl IntoIterator<Item = (K, V)>) {
        for (key, value) in pairs {
            let key: Key = key.into();
            self.set(key, value);
        }
    }
}

impl LiveObject for Subject {}

fn evaluate(context: &Subject, key: &Key, dependencies: &Keys, compute: &ComputeFn, safe: bool) {
    let mut blocked = None;
    for dependency in dependencies {
        let value = context.get(dependency);
        if value.is_unset() {
            context.assign(key.clone(), Value::Unset);
            return;
        }
        if safe && blocked.is_none() && (value.is_error() || value.is_pending()) {
            blocked = Some(value);
        }
    }

    let value = match blocked {
        Some(value) => value,
        None => match catch_unwind(AssertUnwindSafe(|| compute(context))) {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => err.into_value(),
            Err(payload) => LiveError::Compute {
                key: key.to_string(),
                message: panic_message(payload.as_ref()),
            }
            .into_value(),
        },
    };
    context.assign(key.clone(), value);
}

// =============================================================================
// TESTS
// =============================================================================

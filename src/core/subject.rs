// ============================================================================
// spark-live - Subject
// Identity handle for anything that can be observed
// ============================================================================
//
// A subject owns its side tables as explicit fields: the event registry, the
// trap store (shadow values of trapped fields), the untrapped plain fields,
// and the relays registered through it. Delegation is an explicit parent
// reference; reads and event dispatch walk it.
// ============================================================================

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use super::context::with_context;
use super::error::{LiveError, Result};
use super::keys::{Key, Keys};
use super::types::{Action, Handler, Value};
use crate::reactivity::events::EventRegistry;
use crate::reactivity::traps::{self, TrapStore};

// =============================================================================
// INNER
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SubjectKind {
    Record,
    Sequence,
}

/// A subscription registered on another subject through this one.
pub(crate) struct Relay {
    pub source: WeakSubject,
    pub event_type: Key,
    pub handler: Handler,
}

pub(crate) struct SubjectInner {
    id: u64,
    parent: Option<Subject>,
    prototype: bool,
    kind: SubjectKind,
    events: RefCell<EventRegistry>,
    traps: RefCell<TrapStore>,
    fields: RefCell<HashMap<Key, Value>>,
    order: RefCell<Vec<Key>>,
    items: RefCell<Vec<Value>>,
    channels: RefCell<HashSet<Key>>,
    relays: RefCell<Vec<Relay>>,
}

// =============================================================================
// SUBJECT
// =============================================================================

/// A record or sequence that can be observed.
///
/// Cloning a `Subject` clones the handle; both clones refer to the same
/// subject. Equality of subjects is identity (`ptr_eq`).
///
/// # Example
///
/// ```
/// use spark_live::{Observable, Subject, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let user = Subject::new();
/// let writes = Rc::new(Cell::new(0));
/// let counter = writes.clone();
/// user.on("name", move |_| counter.set(counter.get() + 1));
///
/// user.assign("name", "Ada");
/// user.assign("name", "Ada");
/// assert_eq!(user.get("name"), Value::from("Ada"));
/// assert_eq!(writes.get(), 1);
/// ```
#[derive(Clone)]
pub struct Subject {
    inner: Rc<SubjectInner>,
}

/// Non-owning reference to a subject.
#[derive(Clone)]
pub struct WeakSubject {
    inner: Weak<SubjectInner>,
}

impl WeakSubject {
    pub fn upgrade(&self) -> Option<Subject> {
        self.inner.upgrade().map(|inner| Subject { inner })
    }
}

impl fmt::Debug for WeakSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(subject) => write!(f, "WeakSubject({})", subject.id()),
            None => f.write_str("WeakSubject(dropped)"),
        }
    }
}

impl Subject {
    fn build(parent: Option<Subject>, prototype: bool, kind: SubjectKind) -> Self {
        Self {
            inner: Rc::new(SubjectInner {
                id: with_context(|ctx| ctx.allocate_subject_id()),
                parent,
                prototype,
                kind,
                events: RefCell::new(EventRegistry::new()),
                traps: RefCell::new(TrapStore::default()),
                fields: RefCell::new(HashMap::new()),
                order: RefCell::new(Vec::new()),
                items: RefCell::new(Vec::new()),
                channels: RefCell::new(HashSet::new()),
                relays: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A fresh record with no parent.
    pub fn new() -> Self {
        Self::build(None, false, SubjectKind::Record)
    }

    /// A record delegating to `parent`: it inherits the parent's fields,
    /// traps and event handlers.
    pub fn with_parent(parent: &Subject) -> Self {
        Self::build(Some(parent.clone()), false, SubjectKind::Record)
    }

    /// A shared level meant to be the parent of many instances.
    ///
    /// Computed fields defined on a prototype are not evaluated eagerly, since
    /// the prototype itself carries no instance data.
    pub fn prototype() -> Self {
        Self::build(None, true, SubjectKind::Record)
    }

    pub(crate) fn sequence(parent: Option<&Subject>, items: Vec<Value>) -> Self {
        let subject = Self::build(parent.cloned(), false, SubjectKind::Sequence);
        *subject.inner.items.borrow_mut() = items;
        subject
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn parent(&self) -> Option<&Subject> {
        self.inner.parent.as_ref()
    }

    pub fn is_prototype(&self) -> bool {
        self.inner.prototype
    }

    pub fn is_sequence(&self) -> bool {
        self.inner.kind == SubjectKind::Sequence
    }

    pub fn ptr_eq(&self, other: &Subject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakSubject {
        WeakSubject {
            inner: Rc::downgrade(&self.inner),
        }
    }

    // =========================================================================
    // SIDE TABLES
    // =========================================================================

    pub(crate) fn events(&self) -> Ref<'_, EventRegistry> {
        self.inner.events.borrow()
    }

    pub(crate) fn events_mut(&self) -> RefMut<'_, EventRegistry> {
        self.inner.events.borrow_mut()
    }

    pub(crate) fn traps(&self) -> Ref<'_, TrapStore> {
        self.inner.traps.borrow()
    }

    pub(crate) fn traps_mut(&self) -> RefMut<'_, TrapStore> {
        self.inner.traps.borrow_mut()
    }

    pub(crate) fn relays_mut(&self) -> RefMut<'_, Vec<Relay>> {
        self.inner.relays.borrow_mut()
    }

    // =========================================================================
    // READS
    // =========================================================================

    fn get_own(&self, key: &Key) -> Option<Value> {
        if let Some(value) = self.inner.traps.borrow().get(key) {
            return Some(value);
        }
        match key {
            Key::Index(i) if self.is_sequence() => self.inner.items.borrow().get(*i).cloned(),
            _ => self.inner.fields.borrow().get(key).cloned(),
        }
    }

    /// Read a field: the shadow value if trapped, else the plain value, else
    /// whatever the parent chain holds. Missing fields read as `Unset`.
    pub fn get(&self, key: impl Into<Key>) -> Value {
        let key = key.into();
        let mut current = Some(self);
        while let Some(subject) = current {
            if let Some(value) = subject.get_own(&key) {
                return value;
            }
            current = subject.parent();
        }
        Value::Unset
    }

    /// Whether the field exists on this subject or along its parent chain.
    pub fn has(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        self.get_own(&key).is_some() || self.parent().is_some_and(|p| p.has(key))
    }

    /// Own named keys, in the order they were first defined.
    pub fn keys(&self) -> Vec<Key> {
        self.inner.order.borrow().clone()
    }

    /// Whether writes to `key` go through the trap layer.
    pub fn is_trapped(&self, key: &Key) -> bool {
        self.inner.traps.borrow().contains(key) || self.parent().is_some_and(|p| p.is_trapped(key))
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Assign a field, the way a plain field write would.
    ///
    /// Trapped fields go through the trap layer: the write is skipped when the
    /// value is strictly equal to the current one, otherwise the field's event
    /// and `$set` fire. Untrapped fields are written silently. Trapped actions
    /// are locked and refuse the write.
    pub fn assign(&self, key: impl Into<Key>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();

        if self.is_trapped(&key) {
            traps::set_value(self, &key, value, true);
            return;
        }

        if let Value::Action(action) = self.get(key.clone()) {
            if action.is_trapped() {
                tracing::debug!(subject = self.id(), key = %key, "refusing to overwrite a trapped action");
                return;
            }
        }

        self.write_plain(key, value);
    }

    pub(crate) fn write_plain(&self, key: Key, value: Value) -> bool {
        match key {
            Key::Index(i) if self.is_sequence() => {
                let mut items = self.inner.items.borrow_mut();
                let len = items.len();
                match items.get_mut(i) {
                    Some(slot) => {
                        *slot = value;
                        true
                    }
                    None => {
                        tracing::debug!(subject = self.id(), index = i, len, "index write past the end");
                        false
                    }
                }
            }
            key => {
                self.note_key(&key);
                self.inner.fields.borrow_mut().insert(key, value);
                true
            }
        }
    }

    /// Remove an own plain field, returning its value.
    pub(crate) fn take_plain(&self, key: &Key) -> Option<Value> {
        self.inner.fields.borrow_mut().remove(key)
    }

    pub(crate) fn note_key(&self, key: &Key) {
        if self.is_sequence() && key.as_index().is_some() {
            return;
        }
        let mut order = self.inner.order.borrow_mut();
        if !order.contains(key) {
            order.push(key.clone());
        }
    }

    // =========================================================================
    // ACTIONS
    // =========================================================================

    /// Install an action field.
    pub fn define_action(&self, key: impl Into<Key>, f: impl Fn(&Subject, &[Value]) -> Value + 'static) {
        self.assign(key, Action::new(f));
    }

    /// Invoke the action stored at `key` with this subject as receiver.
    ///
    /// Trapped actions report the call to `key` subscribers once the result
    /// is known.
    pub fn call(&self, key: impl Into<Key>, args: &[Value]) -> Result<Value> {
        let key = key.into();
        match self.get(key.clone()) {
            Value::Action(action) => Ok(action.invoke(self, args)),
            _ => Err(LiveError::NotCallable { key: key.to_string() }),
        }
    }

    // =========================================================================
    // EVENT CHANNELS
    // =========================================================================

    /// Declare names that are pure notification channels on this subject and
    /// its descendants: subscribing to them never installs a trap.
    pub fn declare_events(&self, types: impl Into<Keys>) {
        self.inner.channels.borrow_mut().extend(types.into());
    }

    pub fn is_event_channel(&self, key: &Key) -> bool {
        key.is_channel()
            || self.inner.channels.borrow().contains(key)
            || self.parent().is_some_and(|p| p.is_event_channel(key))
    }

    // =========================================================================
    // SEQUENCES
    // =========================================================================

    /// Public length of a sequence (the shadow length once live).
    pub(crate) fn seq_len(&self) -> usize {
        match self.inner.traps.borrow().sequence() {
            Some(shadow) => shadow.len(),
            None => self.inner.items.borrow().len(),
        }
    }

    pub(crate) fn seq_values(&self) -> Vec<Value> {
        match self.inner.traps.borrow().sequence() {
            Some(shadow) => shadow.to_vec(),
            None => self.inner.items.borrow().clone(),
        }
    }

    /// Mutate the sequence ground truth: the shadow once live, else the plain
    /// positions. `f` must not call back into the subject.
    pub(crate) fn with_sequence_mut<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let mut traps = self.inner.traps.borrow_mut();
        if let Some(shadow) = traps.sequence_mut() {
            return f(shadow);
        }
        drop(traps);
        f(&mut self.inner.items.borrow_mut())
    }

    pub(crate) fn take_items(&self) -> Vec<Value> {
        std::mem::take(&mut *self.inner.items.borrow_mut())
    }
}

impl Default for Subject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subject")
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent.as_ref().map(Subject::id))
            .field("keys", &*self.inner.order.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

// ============================================================================
// spark-live - LiveArray
// An observable sequence with live iteration, projection and sorting
// ============================================================================
//
// A LiveArray starts out as a plain sequence. The first live request
// (for_each, for_exit, map, live_sort) installs traps on every position: the
// content moves into the shadow store and each later mutation reconciles the
// trap count with the new length.
//
// Every mutator reports its call as an event named after it. A shared
// prototype translates those calls (and per-index `$set` writes) into
// `$add` / `$remove` events and schedules one coalesced `$change` per tick.
// ============================================================================

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::core::constants::{
    ADD, APPEND, CHANGE, INSERT_FIRST, MUTATORS, REMOVE, REMOVE_FIRST, REMOVE_LAST, RESORT_TASK,
    SET, SPLICE_RANGE,
};
use crate::core::context::TaskKey;
use crate::core::error::{no_throw, LiveError, Result};
use crate::core::keys::Key;
use crate::core::subject::{Subject, WeakSubject};
use crate::core::types::{Event, Handler, Value, WeakHandler};
use crate::primitives::observable::Observable;
use crate::reactivity::equality::strict_equals;
use crate::reactivity::events::emit;
use crate::reactivity::pending::Pending;
use crate::reactivity::scheduling::schedule;
use crate::reactivity::traps::{notify_call, reconcile_sequence_traps, setup_sequence_traps};

/// Projection applied by a live `map`.
pub type Generator = Rc<dyn Fn(&Value) -> Value>;

/// Ordering used by `sort` and `live_sort`.
pub type Compare = Rc<dyn Fn(&Value, &Value) -> Ordering>;

// =============================================================================
// SHARED PROTOTYPE
// =============================================================================

thread_local! {
    static PROTOTYPE: Subject = build_prototype();
}

fn prototype() -> Subject {
    PROTOTYPE.with(Subject::clone)
}

fn build_prototype() -> Subject {
    let proto = Subject::prototype();
    proto.declare_events(MUTATORS);

    proto.on(SET, |e| {
        if let Some(Key::Index(index)) = e.key() {
            emit(&e.context, &Key::from(ADD), &[e.value(), Value::from(index)]);
            emit(&e.context, &Key::from(REMOVE), &[e.previous()]);
            e.context.change();
        }
    });

    proto.on(APPEND, |e| {
        let index = e.context.seq_len().saturating_sub(1);
        emit(&e.context, &Key::from(ADD), &[first_arg(e), Value::from(index)]);
        e.context.change();
    });

    proto.on(INSERT_FIRST, |e| {
        emit(&e.context, &Key::from(ADD), &[first_arg(e), Value::from(0)]);
        e.context.change();
    });

    let removed = |e: &Event| {
        emit(&e.context, &Key::from(REMOVE), &[e.returned()]);
        e.context.change();
    };
    proto.on(REMOVE_LAST, removed);
    proto.on(REMOVE_FIRST, removed);

    proto.on(SPLICE_RANGE, |e| {
        let args = e.call_args();
        let start = args.first().and_then(Value::as_int).unwrap_or(0) as usize;
        for (offset, item) in args.iter().skip(2).enumerate() {
            emit(&e.context, &Key::from(ADD), &[item.clone(), Value::from(start + offset)]);
        }
        let returned = e.returned();
        for item in returned.as_list().unwrap_or_default() {
            emit(&e.context, &Key::from(REMOVE), &[item.clone()]);
        }
        e.context.change();
    });

    proto
}

fn first_arg(e: &Event) -> Value {
    e.call_args().into_iter().next().unwrap_or_default()
}

/// A source-side handler that runs `f` against the view behind `weak`. Once
/// the view is gone, the handler unsubscribes itself from whichever subject
/// dispatched to it.
fn view_handler(weak: &WeakSubject, f: impl Fn(&LiveArray, &Event) + 'static) -> Handler {
    let this: Rc<OnceCell<WeakHandler>> = Rc::default();
    let handler = {
        let this = this.clone();
        let weak = weak.clone();
        Handler::new(move |e| match LiveArray::from_weak(&weak) {
            Some(view) => f(&view, e),
            None => {
                if let Some(handler) = this.get().and_then(WeakHandler::upgrade) {
                    e.context.unsubscribe(e.event_type.clone(), Some(&handler));
                }
            }
        })
    };
    let _ = this.set(handler.downgrade());
    handler
}

// =============================================================================
// LIVE ARRAY
// =============================================================================

/// An observable sequence.
///
/// Mutators behave like their `Vec` counterparts and additionally report the
/// call to subscribers. `$add` carries `[item, index]`, `$remove` carries
/// `[item]`, and `$change` fires once per tick after any mutation.
///
/// # Example
///
/// ```
/// use spark_live::{LiveArray, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let numbers = LiveArray::from_values(vec![Value::from(3)]);
/// let sum = Rc::new(Cell::new(0));
/// let total = sum.clone();
/// numbers.for_each(move |item, _, _| total.set(total.get() + item.as_int().unwrap_or(0)));
/// assert_eq!(sum.get(), 3);
///
/// numbers.append(5);
/// numbers.insert_first(2);
/// assert_eq!(sum.get(), 10);
/// ```
#[derive(Clone)]
pub struct LiveArray {
    subject: Subject,
}

impl LiveArray {
    /// Create an empty live array.
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }

    /// Create a live array holding `values`.
    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            subject: Subject::sequence(Some(&prototype()), values),
        }
    }

    /// View a sequence subject (such as an element stored in a `Value`) as a
    /// live array.
    pub fn from_subject(subject: &Subject) -> Option<Self> {
        subject.is_sequence().then(|| Self {
            subject: subject.clone(),
        })
    }

    fn from_weak(weak: &WeakSubject) -> Option<Self> {
        weak.upgrade().map(|subject| Self { subject })
    }

    // =========================================================================
    // PLAIN ACCESS
    // =========================================================================

    pub fn len(&self) -> usize {
        self.subject.seq_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, if in range.
    pub fn get(&self, index: usize) -> Option<Value> {
        (index < self.len()).then(|| self.subject.get(Key::Index(index)))
    }

    /// Write one position. Once live, a changed value fires the index event,
    /// `$set`, `$add` for the new value and `$remove` for the old one.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(LiveError::IndexOutOfBounds { index, len });
        }
        self.subject.assign(Key::Index(index), value);
        Ok(())
    }

    /// Snapshot of the current content.
    pub fn values(&self) -> Vec<Value> {
        self.subject.seq_values()
    }

    /// Whether an element is strictly equal to `item`.
    pub fn contains(&self, item: &Value) -> bool {
        self.values().iter().any(|v| strict_equals(v, item))
    }

    /// Whether position traps are installed.
    pub fn is_live(&self) -> bool {
        self.subject.traps().is_live()
    }

    fn setup_traps(&self) {
        setup_sequence_traps(&self.subject);
    }

    // =========================================================================
    // MUTATORS
    // =========================================================================

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let result = self.subject.with_sequence_mut(f);
        if self.is_live() {
            reconcile_sequence_traps(&self.subject);
        }
        result
    }

    fn report(&self, mutator: &str, args: Vec<Value>, returned: Value) {
        notify_call(&self.subject, &Key::from(mutator), args, returned);
    }

    /// Add `item` at the end. Returns the new length.
    pub fn append(&self, item: impl Into<Value>) -> usize {
        let item = item.into();
        let len = self.mutate(|seq| {
            seq.push(item.clone());
            seq.len()
        });
        self.report(APPEND, vec![item], Value::from(len));
        len
    }

    /// Remove and return the last element. An empty array reports nothing.
    pub fn remove_last(&self) -> Option<Value> {
        let removed = self.mutate(|seq| seq.pop());
        if let Some(item) = &removed {
            self.report(REMOVE_LAST, Vec::new(), item.clone());
        }
        removed
    }

    /// Remove and return the first element. An empty array reports nothing.
    pub fn remove_first(&self) -> Option<Value> {
        let removed = self.mutate(|seq| (!seq.is_empty()).then(|| seq.remove(0)));
        if let Some(item) = &removed {
            self.report(REMOVE_FIRST, Vec::new(), item.clone());
        }
        removed
    }

    /// Add `item` at the front. Returns the new length.
    pub fn insert_first(&self, item: impl Into<Value>) -> usize {
        let item = item.into();
        let len = self.mutate(|seq| {
            seq.insert(0, item.clone());
            seq.len()
        });
        self.report(INSERT_FIRST, vec![item], Value::from(len));
        len
    }

    /// Replace `delete_count` elements from `start` with `items`, returning
    /// the removed elements. Out-of-range bounds are clamped.
    pub fn splice_range(&self, start: usize, delete_count: usize, items: Vec<Value>) -> Vec<Value> {
        let (start, removed) = self.mutate(|seq| {
            let start = start.min(seq.len());
            let end = start + delete_count.min(seq.len() - start);
            let removed: Vec<Value> = seq.splice(start..end, items.iter().cloned()).collect();
            (start, removed)
        });

        let mut args = Vec::with_capacity(items.len() + 2);
        args.push(Value::from(start));
        args.push(Value::from(removed.len()));
        args.extend(items);
        self.report(SPLICE_RANGE, args, Value::list(removed.clone()));
        removed
    }

    // =========================================================================
    // LIVE ITERATION
    // =========================================================================

    /// Call `callback(item, index, array)` for every current element, then
    /// for every element added later.
    ///
    /// The returned value settles once every result of the initial pass has
    /// settled (immediately, unless some result is pending). Results of calls
    /// for later additions are discarded.
    pub fn for_each<F, R>(&self, callback: F) -> Pending
    where
        F: Fn(&Value, usize, &LiveArray) -> R + 'static,
        R: Into<Value>,
    {
        self.setup_traps();
        let callback = Rc::new(callback);

        let on_add = callback.clone();
        self.on(ADD, move |e| {
            let index = e.arg(1).as_int().unwrap_or(0) as usize;
            let array = LiveArray {
                subject: e.context.clone(),
            };
            on_add(&e.arg(0), index, &array);
        });

        let results = self
            .values()
            .iter()
            .enumerate()
            .map(|(index, item)| no_throw(|| Ok(callback(item, index, self).into())))
            .collect();
        Pending::all(results)
    }

    /// Call `callback(item, array)` for every element removed from now on.
    pub fn for_exit(&self, callback: impl Fn(&Value, &LiveArray) + 'static) {
        self.setup_traps();
        self.on(REMOVE, move |e| {
            let array = LiveArray {
                subject: e.context.clone(),
            };
            callback(&e.arg(0), &array);
        });
    }

    // =========================================================================
    // LIVE VIEWS
    // =========================================================================

    /// A live copy that mirrors every mutation of this array.
    pub fn map(&self) -> LiveArray {
        self.project(Rc::new(|v: &Value| v.clone()))
    }

    /// A live projection: `generator` applied to every element, kept in sync
    /// with every later mutation of this array.
    ///
    /// ```
    /// use spark_live::{LiveArray, Value};
    ///
    /// let source = LiveArray::from_values(vec![Value::from(1), Value::from(2)]);
    /// let doubled = source.map_with(|v| Value::from(v.as_int().unwrap_or(0) * 2));
    ///
    /// source.append(3);
    /// source.set(0, 10).unwrap();
    /// assert_eq!(doubled.values(), vec![Value::from(20), Value::from(4), Value::from(6)]);
    /// ```
    pub fn map_with(&self, generator: impl Fn(&Value) -> Value + 'static) -> LiveArray {
        self.project(Rc::new(generator))
    }

    fn project(&self, generator: Generator) -> LiveArray {
        let view = LiveArray::from_values(self.values().iter().map(|v| generator(v)).collect());
        let weak = view.subject.downgrade();

        let shrink = view_handler(&weak, |view, e| {
            match e.event_type.as_name() {
                Some(REMOVE_FIRST) => view.remove_first(),
                _ => view.remove_last(),
            };
        });
        view.relay(self, [REMOVE_FIRST, REMOVE_LAST], &shrink);

        let grow = {
            let generator = generator.clone();
            view_handler(&weak, move |view, e| {
                let item = generator(&first_arg(e));
                match e.event_type.as_name() {
                    Some(INSERT_FIRST) => view.insert_first(item),
                    _ => view.append(item),
                };
            })
        };
        view.relay(self, [INSERT_FIRST, APPEND], &grow);

        let splice = {
            let generator = generator.clone();
            view_handler(&weak, move |view, e| {
                let args = e.call_args();
                let start = args.first().and_then(Value::as_int).unwrap_or(0) as usize;
                let delete_count = args.get(1).and_then(Value::as_int).unwrap_or(0) as usize;
                let added = args.iter().skip(2).map(|v| generator(v)).collect();
                view.splice_range(start, delete_count, added);
            })
        };
        view.relay(self, SPLICE_RANGE, &splice);

        self.setup_traps();
        let mirror = view_handler(&weak, move |view, e| {
            let Some(Key::Index(index)) = e.key() else {
                return;
            };
            if view.set(index, generator(&e.value())).is_err() {
                tracing::debug!(view = view.subject.id(), index, "mirrored write past the end");
            }
        });
        view.relay(self, SET, &mirror);

        view
    }

    /// A sorted, independent copy. The array itself is never reordered.
    pub fn sort(&self, compare: impl Fn(&Value, &Value) -> Ordering) -> LiveArray {
        let mut values = self.values();
        values.sort_by(|a, b| compare(a, b));
        LiveArray::from_values(values)
    }

    /// A view that stays equal to the stable sort of this array.
    ///
    /// Additions and removals are applied to the view immediately, as one
    /// splice over the span that differs. Elements that compare equal keep
    /// their order in this array. Elements that are themselves observable
    /// are watched: their `$change` schedules one resort of the view for the
    /// next tick.
    pub fn live_sort(&self, compare: impl Fn(&Value, &Value) -> Ordering + 'static) -> LiveArray {
        let compare: Compare = Rc::new(compare);
        self.setup_traps();

        let view = self.sort(|a, b| compare(a, b));
        let weak = view.subject.downgrade();

        let resort = {
            let source = self.subject.downgrade();
            let compare = compare.clone();
            view_handler(&weak, move |view, _| {
                let weak = view.subject.downgrade();
                let source = source.clone();
                let compare = compare.clone();
                schedule(TaskKey::new(view.subject.id(), RESORT_TASK), move || {
                    if let (Some(view), Some(source)) = (LiveArray::from_weak(&weak), source.upgrade()) {
                        view.follow_sorted(&source.seq_values(), &compare);
                        view.change();
                    }
                });
            })
        };

        for item in view.values() {
            view.watch(&item, &resort);
        }

        let on_add = {
            let compare = compare.clone();
            let resort = resort.clone();
            view_handler(&weak, move |view, e| {
                view.follow_sorted(&e.context.seq_values(), &compare);
                view.watch(&e.arg(0), &resort);
            })
        };
        view.relay(self, ADD, &on_add);

        let on_remove = {
            let resort = resort.clone();
            view_handler(&weak, move |view, e| {
                view.follow_sorted(&e.context.seq_values(), &compare);
                let item = e.arg(0);
                if !view.contains(&item) {
                    view.unwatch(&item, &resort);
                }
            })
        };
        view.relay(self, REMOVE, &on_remove);

        view
    }

    /// Turn this view into the stable sort of `source` with one splice over
    /// the span between the common prefix and the common suffix.
    fn follow_sorted(&self, source: &[Value], compare: &Compare) {
        let mut target = source.to_vec();
        target.sort_by(|a, b| compare(a, b));
        let current = self.values();

        let prefix = current
            .iter()
            .zip(&target)
            .take_while(|(a, b)| strict_equals(a, b))
            .count();
        let suffix = current[prefix..]
            .iter()
            .rev()
            .zip(target[prefix..].iter().rev())
            .take_while(|(a, b)| strict_equals(a, b))
            .count();

        let delete_count = current.len() - prefix - suffix;
        let added = target[prefix..target.len() - suffix].to_vec();
        if delete_count > 0 || !added.is_empty() {
            self.splice_range(prefix, delete_count, added);
        }
    }

    fn watch(&self, item: &Value, resort: &Handler) {
        if let Some(element) = item.as_subject() {
            self.relay(element, CHANGE, resort);
        }
    }

    fn unwatch(&self, item: &Value, resort: &Handler) {
        if let Some(element) = item.as_subject() {
            self.unrelay(element, CHANGE, Some(resort));
        }
    }
}

impl Default for LiveArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Observable for LiveArray {
    fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Drop every relay this array registered, which detaches a live view
    /// from its source and from the elements it watches.
    fn destroy(&self) {
        self.unrelay_all();
    }
}

impl fmt::Debug for LiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values()).finish()
    }
}

impl<V: Into<Value>> FromIterator<V> for LiveArray {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from_values(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<Value>> for LiveArray {
    fn from(values: Vec<Value>) -> Self {
        Self::from_values(values)
    }
}

impl From<&LiveArray> for Value {
    fn from(array: &LiveArray) -> Self {
        Value::Subject(array.subject.clone())
    }
}

impl From<LiveArray> for Value {
    fn from(array: LiveArray) -> Self {
        Value::Subject(array.subject)
    }
}

// =============================================================================
// TESTS
// =============================================================================

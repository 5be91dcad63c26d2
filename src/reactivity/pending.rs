// ============================================================================
// spark-live - Pending Values
// A single-threaded future that settles once and notifies on the next tick
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::core::context::with_context;
use crate::core::error::LiveError;
use crate::core::types::Value;
use crate::reactivity::scheduling::defer;

type Callback = Box<dyn FnOnce(&Value)>;

enum State {
    Waiting(Vec<Callback>),
    Settled(Value),
}

struct PendingInner {
    id: u64,
    state: RefCell<State>,
}

/// A value that is not known yet.
///
/// A `Pending` settles exactly once, through its [`Resolver`]. Callbacks
/// registered with [`Pending::then`] run on the tick after settlement (or the
/// next tick, when registered on an already settled value). A rejection
/// settles with a `Value::Error`.
#[derive(Clone)]
pub struct Pending {
    inner: Rc<PendingInner>,
}

/// The settling side of a [`Pending`].
pub struct Resolver {
    pending: Pending,
}

/// Create a pending value and its resolver.
///
/// # Example
///
/// ```
/// use spark_live::{pending, tick, Value};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let (future, resolver) = pending();
/// let seen = Rc::new(RefCell::new(Value::Unset));
/// let sink = seen.clone();
/// future.then(move |v| *sink.borrow_mut() = v.clone());
///
/// resolver.resolve(Value::from(3));
/// assert_eq!(*seen.borrow(), Value::Unset);
/// tick();
/// assert_eq!(*seen.borrow(), Value::from(3));
/// ```
pub fn pending() -> (Pending, Resolver) {
    let pending = Pending::waiting();
    let resolver = Resolver {
        pending: pending.clone(),
    };
    (pending, resolver)
}

impl Pending {
    fn waiting() -> Self {
        Self {
            inner: Rc::new(PendingInner {
                id: with_context(|ctx| ctx.allocate_pending_id()),
                state: RefCell::new(State::Waiting(Vec::new())),
            }),
        }
    }

    /// An already settled value.
    pub fn resolved(value: impl Into<Value>) -> Self {
        let pending = Self::waiting();
        *pending.inner.state.borrow_mut() = State::Settled(value.into());
        pending
    }

    /// Settles once every pending element of `values` has settled, with the
    /// list of settled values in their original order. Elements that are not
    /// pending are taken as they are.
    pub fn all(values: Vec<Value>) -> Self {
        let waiting: Vec<(usize, Pending)> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_pending().map(|p| (i, p.clone())))
            .collect();

        if waiting.is_empty() {
            return Self::resolved(Value::list(values));
        }

        let (all, resolver) = pending();
        let results = Rc::new(RefCell::new(values));
        let remaining = Rc::new(Cell::new(waiting.len()));
        let resolver = Rc::new(RefCell::new(Some(resolver)));

        for (index, element) in waiting {
            let results = results.clone();
            let remaining = remaining.clone();
            let resolver = resolver.clone();
            element.then(move |settled| {
                results.borrow_mut()[index] = settled.clone();
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    let done = resolver.borrow_mut().take();
                    if let Some(resolver) = done {
                        resolver.resolve(Value::list(results.borrow().clone()));
                    }
                }
            });
        }
        all
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn ptr_eq(&self, other: &Pending) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.inner.state.borrow(), State::Settled(_))
    }

    /// The settled value, if any.
    pub fn value(&self) -> Option<Value> {
        match &*self.inner.state.borrow() {
            State::Settled(value) => Some(value.clone()),
            State::Waiting(_) => None,
        }
    }

    /// Run `f` with the settled value on a later tick.
    pub fn then(&self, f: impl FnOnce(&Value) + 'static) {
        let value = match &mut *self.inner.state.borrow_mut() {
            State::Waiting(callbacks) => {
                callbacks.push(Box::new(f));
                return;
            }
            State::Settled(value) => value.clone(),
        };
        defer(move || f(&value));
    }

    fn settle(&self, value: Value) {
        let callbacks = {
            let mut state = self.inner.state.borrow_mut();
            if let State::Settled(_) = &*state {
                return;
            }
            match std::mem::replace(&mut *state, State::Settled(value.clone())) {
                State::Waiting(callbacks) => callbacks,
                State::Settled(_) => Vec::new(),
            }
        };

        for callback in callbacks {
            let value = value.clone();
            defer(move || callback(&value));
        }
    }
}

impl fmt::Debug for Pending {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending")
            .field("id", &self.inner.id)
            .field("settled", &self.is_settled())
            .finish()
    }
}

impl Resolver {
    pub fn resolve(self, value: impl Into<Value>) {
        self.pending.settle(value.into());
    }

    pub fn reject(self, error: LiveError) {
        self.pending.settle(error.into_value());
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolver({})", self.pending.id())
    }
}

// =============================================================================
// TESTS
// =============================================================================

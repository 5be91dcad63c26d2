// ============================================================================
// spark-live - Type Definitions
// Dynamic values, actions, handlers and the event payload
// ============================================================================
//
// Subjects hold heterogeneous fields that bind to one another by name, so
// field contents are a tagged dynamic value rather than a type parameter.
// Reference-like variants (lists, errors, futures, subjects, actions) compare
// by identity, scalars by value. See reactivity::equality.
// ============================================================================

use std::fmt;
use std::rc::{Rc, Weak};

use super::error::LiveError;
use super::keys::Key;
use super::subject::Subject;
use crate::reactivity::equality::strict_equals;
use crate::reactivity::pending::Pending;

// =============================================================================
// VALUE
// =============================================================================

/// The content of a field, an event argument or an action result.
#[derive(Clone, Default)]
pub enum Value {
    /// Nothing assigned (also the sentinel for a computed field with an
    /// unset dependency).
    #[default]
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    /// An error carried as data.
    Error(Rc<LiveError>),
    /// A value that has not settled yet.
    Pending(Pending),
    /// A nested observable.
    Subject(Subject),
    /// A callable field.
    Action(Action),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Value::Pending(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to f64.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(&**s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&LiveError> {
        match self {
            Value::Error(err) => Some(&**err),
            _ => None,
        }
    }

    pub fn as_pending(&self) -> Option<&Pending> {
        match self {
            Value::Pending(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_subject(&self) -> Option<&Subject> {
        match self {
            Value::Subject(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Value::Action(a) => Some(a),
            _ => None,
        }
    }

    /// Decode a key previously encoded with `Key::to_value`.
    pub fn to_key(&self) -> Option<Key> {
        match self {
            Value::Str(s) => Some(Key::Name(s.clone())),
            Value::Int(i) if *i >= 0 => Some(Key::Index(*i as usize)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        strict_equals(self, other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => f.write_str("Unset"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
            Value::Error(err) => write!(f, "Error({err})"),
            Value::Pending(p) => write!(f, "Pending#{}", p.id()),
            Value::Subject(s) => write!(f, "Subject#{}", s.id()),
            Value::Action(a) => write!(f, "Action({})", if a.is_trapped() { "trapped" } else { "plain" }),
        }
    }
}

impl Key {
    /// Encode the key as an event argument.
    pub fn to_value(&self) -> Value {
        match self {
            Key::Name(name) => Value::Str(name.clone()),
            Key::Index(i) => Value::Int(*i as i64),
        }
    }
}

// -----------------------------------------------------------------------------
// Conversions
// -----------------------------------------------------------------------------

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unset
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

impl From<LiveError> for Value {
    fn from(err: LiveError) -> Self {
        err.into_value()
    }
}

impl From<Pending> for Value {
    fn from(p: Pending) -> Self {
        Value::Pending(p)
    }
}

impl From<Subject> for Value {
    fn from(s: Subject) -> Self {
        Value::Subject(s)
    }
}

impl From<&Subject> for Value {
    fn from(s: &Subject) -> Self {
        Value::Subject(s.clone())
    }
}

impl From<Action> for Value {
    fn from(a: Action) -> Self {
        Value::Action(a)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Unset)
    }
}

// =============================================================================
// ACTION
// =============================================================================

/// Signature of an action body: receiver and argument list in, result out.
pub type ActionFn = dyn Fn(&Subject, &[Value]) -> Value;

/// A callable field.
///
/// Trapping an action replaces it with a wrapper that reports each call as an
/// event; the `trapped` mark keeps an action from being wrapped twice.
#[derive(Clone)]
pub struct Action {
    body: Rc<ActionFn>,
    trapped: bool,
}

impl Action {
    pub fn new(f: impl Fn(&Subject, &[Value]) -> Value + 'static) -> Self {
        Self {
            body: Rc::new(f),
            trapped: false,
        }
    }

    pub(crate) fn trapped(f: impl Fn(&Subject, &[Value]) -> Value + 'static) -> Self {
        Self {
            body: Rc::new(f),
            trapped: true,
        }
    }

    pub fn is_trapped(&self) -> bool {
        self.trapped
    }

    pub fn invoke(&self, receiver: &Subject, args: &[Value]) -> Value {
        (self.body)(receiver, args)
    }

    pub fn ptr_eq(&self, other: &Action) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

// =============================================================================
// EVENT
// =============================================================================

/// What a handler receives: the event type, the receiver the event was
/// triggered on, and the argument list.
///
/// The receiver is always the subject the event was triggered on, even when
/// the handler itself was registered on an ancestor.
#[derive(Clone, Debug)]
pub struct Event {
    pub event_type: Key,
    pub context: Subject,
    pub args: Vec<Value>,
}

impl Event {
    /// Argument at `index`, `Unset` when absent.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// New value of a field write, or the argument list of an action call.
    pub fn value(&self) -> Value {
        self.arg(0)
    }

    /// Previous value of a field write, or the result of an action call.
    pub fn previous(&self) -> Value {
        self.arg(1)
    }

    /// The field or action key carried by write and call events.
    pub fn key(&self) -> Option<Key> {
        self.arg(2).to_key()
    }

    /// Arguments of an action call event.
    pub fn call_args(&self) -> Vec<Value> {
        self.arg(0).as_list().map(<[Value]>::to_vec).unwrap_or_default()
    }

    /// Result of an action call event.
    pub fn returned(&self) -> Value {
        self.arg(1)
    }
}

// =============================================================================
// HANDLER
// =============================================================================

/// An event handler, compared by identity.
///
/// Keep a clone around to unsubscribe that exact handler later.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Event)>);

impl Handler {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Handler(Rc::new(f))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn downgrade(&self) -> WeakHandler {
        WeakHandler(Rc::downgrade(&self.0))
    }
}

/// A handler reference that does not keep the closure alive.
#[derive(Clone)]
pub struct WeakHandler(Weak<dyn Fn(&Event)>);

impl WeakHandler {
    pub fn upgrade(&self) -> Option<Handler> {
        self.0.upgrade().map(Handler)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

// =============================================================================
// TESTS
// =============================================================================

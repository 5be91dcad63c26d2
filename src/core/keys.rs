// ============================================================================
// spark-live - Keys
// Field/index names and the argument-shape normalizer for key lists
// ============================================================================

use std::fmt;
use std::rc::Rc;

use super::constants::{CHANNEL_PREFIX, OUTDATE_PREFIX, WILDCARD};

// =============================================================================
// KEY
// =============================================================================

/// The name of a field, action or event on a subject.
///
/// Records use named keys; live arrays address their positions with
/// `Key::Index`. Event types share the same namespace as fields, which is
/// what lets a field write fire an event named after the field.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Name(Rc<str>),
    Index(usize),
}

impl Key {
    /// The wildcard event type.
    pub fn wildcard() -> Self {
        Key::Name(Rc::from(WILDCARD))
    }

    /// The manual invalidation channel for a computed field.
    pub fn outdate(key: &Key) -> Self {
        Key::Name(Rc::from(format!("{OUTDATE_PREFIX}{key}")))
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Key::Name(name) if &**name == WILDCARD)
    }

    /// Channels are notification-only names: they never get a trap.
    pub fn is_channel(&self) -> bool {
        match self {
            Key::Name(name) => {
                name.starts_with(CHANNEL_PREFIX)
                    || name.starts_with(OUTDATE_PREFIX)
                    || &**name == WILDCARD
            }
            Key::Index(_) => false,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Key::Name(name) => Some(&**name),
            Key::Index(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{i}"),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => write!(f, "{name:?}"),
            Key::Index(i) => write!(f, "[{i}]"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(Rc::from(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Rc::from(name))
    }
}

impl From<&String> for Key {
    fn from(name: &String) -> Self {
        Key::Name(Rc::from(name.as_str()))
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

// =============================================================================
// KEYS - ARGUMENT NORMALIZATION
// =============================================================================

/// One or many keys, normalized to a list.
///
/// Every multi-key operation accepts `impl Into<Keys>`, so callers can pass a
/// single key, an array or a vec without separate entry points.
///
/// ```
/// use spark_live::{Key, Keys};
///
/// let one: Keys = "foo".into();
/// let many: Keys = ["foo", "bar"].into();
/// assert_eq!(one.len(), 1);
/// assert_eq!(many.iter().cloned().collect::<Vec<Key>>(), vec![Key::from("foo"), Key::from("bar")]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Keys(Vec<Key>);

impl Keys {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Key> {
        self.0.iter()
    }
}

impl IntoIterator for Keys {
    type Item = Key;
    type IntoIter = std::vec::IntoIter<Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Keys {
    type Item = &'a Key;
    type IntoIter = std::slice::Iter<'a, Key>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Key> for Keys {
    fn from(key: Key) -> Self {
        Keys(vec![key])
    }
}

impl From<&Key> for Keys {
    fn from(key: &Key) -> Self {
        Keys(vec![key.clone()])
    }
}

impl From<&str> for Keys {
    fn from(name: &str) -> Self {
        Keys(vec![Key::from(name)])
    }
}

impl From<String> for Keys {
    fn from(name: String) -> Self {
        Keys(vec![Key::from(name)])
    }
}

impl From<usize> for Keys {
    fn from(index: usize) -> Self {
        Keys(vec![Key::Index(index)])
    }
}

impl<K: Into<Key>, const N: usize> From<[K; N]> for Keys {
    fn from(keys: [K; N]) -> Self {
        Keys(keys.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Key>> From<Vec<K>> for Keys {
    fn from(keys: Vec<K>) -> Self {
        Keys(keys.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Key> + Clone> From<&[K]> for Keys {
    fn from(keys: &[K]) -> Self {
        Keys(keys.iter().cloned().map(Into::into).collect())
    }
}

impl FromIterator<Key> for Keys {
    fn from_iter<I: IntoIterator<Item = Key>>(iter: I) -> Self {
        Keys(iter.into_iter().collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

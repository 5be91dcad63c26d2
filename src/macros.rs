// ============================================================================
// spark-live - Ergonomic Macros
// ============================================================================

/// Helper macro to clone variables into a move closure.
///
/// Handlers and compute functions are `'static`, so everything they touch
/// has to be cloned in first.
///
/// # Usage
///
/// ```rust
/// use spark_live::{cloned, Observable, Subject};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let user = Subject::new();
/// let seen = Rc::new(Cell::new(0));
///
/// user.on("age", cloned!(seen => move |_| seen.set(seen.get() + 1)));
/// user.assign("age", 31);
/// assert_eq!(seen.get(), 1);
/// ```
#[macro_export]
macro_rules! cloned {
    ($($n:ident),+ => $e:expr) => {
        {
            $( let $n = $n.clone(); )+
            $e
        }
    };
}

/// Build a subject from `key => value` pairs.
///
/// Fields are assigned in order, so `keys()` lists them as written. An
/// optional `parent;` prefix sets the prototype chain.
///
/// # Usage
///
/// ```rust
/// use spark_live::{record, Key, Value};
///
/// let defaults = record! { "theme" => "dark" };
/// let prefs = record! { defaults; "font" => "mono", "size" => 12 };
///
/// assert_eq!(prefs.get("theme"), Value::from("dark"));
/// assert_eq!(prefs.keys(), vec![Key::from("font"), Key::from("size")]);
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::Subject::new()
    };
    ($parent:expr; $($key:expr => $value:expr),* $(,)?) => {
        {
            let subject = $crate::Subject::with_parent(&$parent);
            $( subject.assign($key, $value); )*
            subject
        }
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        {
            let subject = $crate::Subject::new();
            $( subject.assign($key, $value); )+
            subject
        }
    };
}

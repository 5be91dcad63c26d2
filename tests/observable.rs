use spark_live::{
    cloned, tick, Event, Handler, Key, LiveError, Observable, Subject, Value,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn recorder() -> (Rc<RefCell<Vec<Vec<Value>>>>, Handler) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let handler = Handler::new(cloned!(log => move |e: &Event| log.borrow_mut().push(e.args.clone())));
    (log, handler)
}

#[test]
fn test_write_payload_is_value_old_key_target() {
    let user = Subject::new();
    user.assign("name", "Ada");
    let (log, handler) = recorder();
    user.subscribe("name", &handler);

    user.assign("name", "Grace");

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0][0], Value::from("Grace"));
    assert_eq!(log[0][1], Value::from("Ada"));
    assert_eq!(log[0][2], Value::from("name"));
    assert_eq!(log[0][3], Value::from(&user));
}

#[test]
fn test_equal_writes_are_silent() {
    let user = Subject::new();
    let (log, handler) = recorder();
    user.subscribe(["age", "$set"], &handler);

    user.assign("age", 3);
    user.assign("age", 3);
    user.assign("age", 3.0);

    // 3 then 3.0: different variants, so the second write counts
    assert_eq!(log.borrow().len(), 4);
}

#[test]
fn test_wildcard_runs_after_typed_handlers() {
    let subject = Subject::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    subject.on("*", cloned!(order => move |e| order.borrow_mut().push(format!("*:{}", e.event_type))));
    subject.on("x", cloned!(order => move |_| order.borrow_mut().push("x".to_string())));

    subject.assign("x", 1);

    assert_eq!(
        *order.borrow(),
        vec!["x".to_string(), "*:x".to_string(), "*:$set".to_string()]
    );
}

#[test]
fn test_handlers_on_a_parent_see_the_child_as_context() {
    let proto = Subject::prototype();
    let contexts = Rc::new(RefCell::new(Vec::new()));
    proto.on("score", cloned!(contexts => move |e| contexts.borrow_mut().push(e.context.id())));

    let a = Subject::with_parent(&proto);
    let b = Subject::with_parent(&proto);
    a.assign("score", 1);
    b.assign("score", 2);

    assert_eq!(*contexts.borrow(), vec![a.id(), b.id()]);
    assert_eq!(proto.get("score"), Value::Unset);
}

#[test]
fn test_parent_handlers_run_before_own_handlers() {
    let proto = Subject::prototype();
    let child = Subject::with_parent(&proto);
    let order = Rc::new(RefCell::new(Vec::new()));
    child.on("x", cloned!(order => move |_| order.borrow_mut().push("child")));
    proto.on("x", cloned!(order => move |_| order.borrow_mut().push("parent")));

    child.assign("x", 1);
    assert_eq!(*order.borrow(), vec!["parent", "child"]);
}

#[test]
fn test_action_calls_are_reported_with_result() {
    let counter = Subject::new();
    counter.assign("count", 0);
    counter.define_action("add", |this, args| {
        let next = this.get("count").as_int().unwrap_or(0) + args[0].as_int().unwrap_or(0);
        this.assign("count", next);
        Value::from(next)
    });
    let (log, handler) = recorder();
    counter.subscribe("add", &handler);

    assert_eq!(counter.call("add", &[Value::from(5)]), Ok(Value::from(5)));

    let log = log.borrow();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0][0].as_list(), Some(&[Value::from(5)][..]));
    assert_eq!(log[0][1], Value::from(5));
    assert_eq!(log[0][2], Value::from("add"));
}

#[test]
fn test_calling_a_plain_field_fails() {
    let subject = Subject::new();
    subject.assign("x", 1);
    assert_eq!(
        subject.call("x", &[]),
        Err(LiveError::NotCallable { key: "x".to_string() })
    );
}

#[test]
fn test_trapped_actions_cannot_be_replaced() {
    let subject = Subject::new();
    subject.define_action("ping", |_, _| Value::from("pong"));
    subject.trap("ping");

    subject.assign("ping", 1);
    assert_eq!(subject.call("ping", &[]), Ok(Value::from("pong")));
}

#[test]
fn test_declared_channels_are_never_trapped() {
    let subject = Subject::new();
    subject.declare_events("tick");
    let (log, handler) = recorder();
    subject.subscribe("tick", &handler);

    subject.assign("tick", 1);
    assert!(log.borrow().is_empty());
    assert!(!subject.is_trapped(&Key::from("tick")));

    subject.fire("tick", &[Value::from(1)]);
    assert_eq!(log.borrow().len(), 1);
}

#[test]
fn test_relays_are_torn_down_from_the_listener() {
    let a = Subject::new();
    let b = Subject::new();
    let hub = Subject::new();
    let count = Rc::new(Cell::new(0));
    let handler = Handler::new(cloned!(count => move |_| count.set(count.get() + 1)));
    hub.relay(&a, "x", &handler);
    hub.relay(&b, ["x", "y"], &handler);

    a.assign("x", 1);
    b.assign("y", 1);
    assert_eq!(count.get(), 2);

    hub.unrelay(&b, "y", None);
    b.assign("y", 2);
    b.assign("x", 2);
    assert_eq!(count.get(), 3);

    hub.unrelay_all();
    a.assign("x", 3);
    b.assign("x", 3);
    assert_eq!(count.get(), 3);
}

#[test]
fn test_change_fires_once_per_tick() {
    let subject = Subject::new();
    let count = Rc::new(Cell::new(0));
    subject.on("$change", cloned!(count => move |_| count.set(count.get() + 1)));

    subject.change();
    subject.change();
    tick();
    subject.change();
    tick();

    assert_eq!(count.get(), 2);
}

#[test]
fn test_panicking_handler_does_not_stop_the_others() {
    let subject = Subject::new();
    let reached = Rc::new(Cell::new(false));
    subject.on("x", |_| panic!("boom"));
    subject.on("x", cloned!(reached => move |_| reached.set(true)));

    subject.assign("x", 1);
    assert!(reached.get());
    assert_eq!(subject.get("x"), Value::from(1));
}

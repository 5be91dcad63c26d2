use spark_live::{
    batch, cloned, pending, tick, LiveArray, LiveError, LiveObject, Observable, Subject, Value,
};
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::Rc;

fn ints(array: &LiveArray) -> Vec<i64> {
    array.values().iter().filter_map(Value::as_int).collect()
}

fn by_int(a: &Value, b: &Value) -> Ordering {
    a.as_int().cmp(&b.as_int())
}

#[test]
fn test_for_each_sum_follows_every_mutation() {
    let numbers: LiveArray = [3].into_iter().collect();
    let sum = Rc::new(Cell::new(0));
    numbers.for_each(cloned!(sum => move |item, _, _| sum.set(sum.get() + item.as_int().unwrap_or(0))));

    numbers.append(5);
    numbers.insert_first(2);
    numbers.splice_range(0, 1, vec![Value::from(10), Value::from(30)]);
    numbers.set(2, 2).unwrap();

    assert_eq!(sum.get(), 52);
    assert_eq!(ints(&numbers), vec![10, 30, 2, 5]);
}

#[test]
fn test_for_each_and_for_exit_pair_up() {
    let items: LiveArray = ["a", "b"].into_iter().collect();
    let present = Rc::new(RefCell::new(Vec::<String>::new()));
    items.for_each(cloned!(present => move |item, _, _| {
        present.borrow_mut().push(item.as_str().unwrap_or_default().to_string())
    }));
    items.for_exit(cloned!(present => move |item, _| {
        let gone = item.as_str().unwrap_or_default();
        present.borrow_mut().retain(|p| p != gone);
    }));

    items.remove_first();
    items.append("c");
    items.set(0, "d").unwrap();

    let mut expected: Vec<String> = items
        .values()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    expected.sort();
    let mut actual = present.borrow().clone();
    actual.sort();
    assert_eq!(actual, expected);
}

#[test]
fn test_for_each_settles_after_pending_results() {
    let items: LiveArray = [1, 2].into_iter().collect();
    let resolvers = Rc::new(RefCell::new(Vec::new()));
    let done = items.for_each(cloned!(resolvers => move |_, _, _| {
        let (future, resolver) = pending();
        resolvers.borrow_mut().push(resolver);
        future
    }));
    assert!(!done.is_settled());

    for resolver in resolvers.borrow_mut().drain(..) {
        resolver.resolve(true);
    }
    tick();
    tick();
    assert!(done.is_settled());
}

#[test]
fn test_set_past_the_end_is_an_error() {
    let items: LiveArray = [1].into_iter().collect();
    assert_eq!(
        items.set(4, 0),
        Err(LiveError::IndexOutOfBounds { index: 4, len: 1 })
    );
}

#[test]
fn test_map_projection_tracks_the_source() {
    let celsius: LiveArray = [0, 100].into_iter().collect();
    let fahrenheit = celsius.map_with(|c| Value::from(c.as_int().unwrap_or(0) * 9 / 5 + 32));

    celsius.append(-40);
    celsius.insert_first(37);
    celsius.set(1, 10).unwrap();
    assert_eq!(ints(&fahrenheit), vec![98, 50, 212, -40]);

    celsius.splice_range(1, 2, vec![]);
    celsius.remove_last();
    assert_eq!(ints(&fahrenheit), vec![98]);
}

#[test]
fn test_views_of_views() {
    let source: LiveArray = [4, 2].into_iter().collect();
    let doubled = source.map_with(|v| Value::from(v.as_int().unwrap_or(0) * 2));
    let sorted = doubled.live_sort(by_int);

    source.append(1);
    source.insert_first(3);
    assert_eq!(ints(&doubled), vec![6, 8, 4, 2]);
    assert_eq!(ints(&sorted), vec![2, 4, 6, 8]);
}

#[test]
fn test_live_sort_keeps_order_under_mutation() {
    let source: LiveArray = [5, 3, 9].into_iter().collect();
    let sorted = source.live_sort(by_int);

    source.splice_range(1, 1, vec![Value::from(7), Value::from(1)]);
    source.set(0, 4).unwrap();
    source.remove_last();

    assert_eq!(ints(&source), vec![4, 7, 1]);
    assert_eq!(ints(&sorted), vec![1, 4, 7]);
}

#[test]
fn test_live_sort_reorders_on_deep_change() {
    let task = |priority: i64| {
        let record = Subject::new();
        record.assign("priority", priority);
        record.on("priority", |e| e.context.change());
        record
    };
    let low = task(1);
    let high = task(5);
    let queue = LiveArray::from_values(vec![Value::from(&low), Value::from(&high)]);
    let by_priority = |a: &Value, b: &Value| {
        let priority = |v: &Value| v.as_subject().map(|s| s.get("priority")).and_then(|p| p.as_int());
        priority(b).cmp(&priority(a))
    };
    let ordered = queue.live_sort(by_priority);
    assert_eq!(ordered.get(0), Some(Value::from(&high)));

    low.set("priority", 10);
    assert_eq!(ordered.get(0), Some(Value::from(&high)));
    tick();
    assert_eq!(ordered.get(0), Some(Value::from(&low)));
}

#[test]
fn test_destroyed_sort_view_is_detached() {
    let source: LiveArray = [2, 1].into_iter().collect();
    let sorted = source.live_sort(by_int);
    sorted.destroy();

    source.append(0);
    assert_eq!(ints(&sorted), vec![1, 2]);
}

#[test]
fn test_change_is_coalesced_across_a_batch() {
    let items = LiveArray::new();
    let changes = Rc::new(Cell::new(0));
    items.on("$change", cloned!(changes => move |_| changes.set(changes.get() + 1)));

    batch(|| {
        for i in 0..10 {
            items.append(i);
        }
        items.splice_range(0, 5, vec![]);
    });

    assert_eq!(changes.get(), 1);
    assert_eq!(items.len(), 5);
}

#[test]
fn test_live_array_as_a_field_value() {
    let board = Subject::new();
    let columns: LiveArray = ["todo", "done"].into_iter().collect();
    board.assign("columns", &columns);

    let stored = board.get("columns");
    let view = stored.as_subject().and_then(LiveArray::from_subject);
    assert_eq!(view.map(|v| v.len()), Some(2));
    assert!(LiveArray::from_subject(&board).is_none());
}

#[test]
fn test_live_sort_keeps_equal_elements_in_source_order() {
    let words = LiveArray::new();
    let by_len = |a: &Value, b: &Value| a.as_str().map(str::len).cmp(&b.as_str().map(str::len));
    let sorted = words.live_sort(by_len);

    words.append("ab");
    words.insert_first("cd");
    assert_eq!(sorted.values(), vec![Value::from("cd"), Value::from("ab")]);
}

// ============================================================================
// spark-live - Scheduling
// Deferred, coalesced execution drained once per tick
// ============================================================================
//
// There is no microtask queue to hook into, so deferred work waits in the
// runtime context until the next tick. A tick is either an explicit `tick()`
// or the end of the outermost `batch`.
//
// Key functions:
// - schedule: queue a task once per (subject, name) until it runs
// - defer: queue a task that never coalesces
// - tick: drain the queue, pass by pass
// - batch: run a closure, then tick when the outermost batch ends
// ============================================================================

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::core::context::{with_context, Task, TaskKey};
use crate::core::error::panic_message;

// =============================================================================
// SCHEDULE
// =============================================================================

/// Queue `f` for the next tick under a coalescing key.
///
/// Returns false when a task with the same key is already waiting; that task
/// absorbs the request and `f` is dropped.
///
/// # Example
///
/// ```
/// use spark_live::{schedule, tick, TaskKey};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let runs = Rc::new(Cell::new(0));
/// for _ in 0..3 {
///     let runs = runs.clone();
///     schedule(TaskKey::new(1, "refresh"), move || runs.set(runs.get() + 1));
/// }
///
/// assert_eq!(runs.get(), 0);
/// tick();
/// assert_eq!(runs.get(), 1);
/// ```
pub fn schedule(key: TaskKey, f: impl FnOnce() + 'static) -> bool {
    with_context(|ctx| {
        ctx.enqueue(Task {
            key: Some(key),
            run: Box::new(f),
        })
    })
}

/// Queue `f` for the next tick. Deferred tasks never coalesce.
pub fn defer(f: impl FnOnce() + 'static) {
    with_context(|ctx| {
        ctx.enqueue(Task {
            key: None,
            run: Box::new(f),
        })
    });
}

// =============================================================================
// TICK
// =============================================================================

/// Drain the scheduler. Returns the number of tasks that ran.
///
/// Each pass runs the tasks that were queued when the pass started; tasks
/// queued meanwhile run in the following pass. After
/// `max_flush_passes` passes the tick gives up and leaves the remainder
/// queued. Calling `tick` from inside a running task does nothing.
pub fn tick() -> usize {
    let was_flushing = with_context(|ctx| ctx.set_flushing(true));
    if was_flushing {
        return 0;
    }

    // Reset the flag even if something below unwinds
    struct FlushGuard;

    impl Drop for FlushGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_flushing(false));
        }
    }

    let _guard = FlushGuard;
    let limit = with_context(|ctx| ctx.max_flush_passes.get());
    let mut passes = 0u32;
    let mut ran = 0usize;

    loop {
        let pass_len = with_context(|ctx| ctx.queued_count());
        if pass_len == 0 {
            break;
        }

        passes += 1;
        if passes > limit {
            tracing::error!(
                limit,
                remaining = pass_len,
                "flush pass limit reached; a task keeps rescheduling itself"
            );
            break;
        }

        for _ in 0..pass_len {
            let Some(task) = with_context(|ctx| ctx.pop_task()) else {
                break;
            };
            run_task(task);
            ran += 1;
        }
    }

    ran
}

fn run_task(task: Task) {
    let Task { key, run } = task;
    if let Err(payload) = catch_unwind(AssertUnwindSafe(run)) {
        tracing::warn!(
            task = key.map_or("deferred", |k| k.name),
            subject = key.map(|k| k.subject),
            "scheduled task panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

// =============================================================================
// BATCH
// =============================================================================

/// Run `f`, then drain the scheduler once the outermost batch ends.
///
/// Everything scheduled inside the batch (including by nested batches) runs
/// in a single tick afterwards, so repeated `$change` requests collapse.
///
/// # Example
///
/// ```
/// use spark_live::{batch, is_batching, schedule, TaskKey};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let runs = Rc::new(Cell::new(0));
/// let counter = runs.clone();
/// batch(|| {
///     assert!(is_batching());
///     schedule(TaskKey::new(7, "change"), move || counter.set(counter.get() + 1));
///     assert_eq!(runs.get(), 0);
/// });
/// assert_eq!(runs.get(), 1);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_context(|ctx| ctx.enter_batch());

    // Exit the batch even on panic
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let depth = with_context(|ctx| ctx.exit_batch());
            if depth == 0 && !std::thread::panicking() {
                tick();
            }
        }
    }

    let _guard = BatchGuard;
    f()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::{queued_tasks, set_max_flush_passes};
    use crate::core::constants::MAX_FLUSH_PASSES;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use tracing_test::traced_test;

    #[test]
    fn schedule_coalesces_until_run() {
        let runs = Rc::new(Cell::new(0));
        let key = TaskKey::new(1, "change");
        for _ in 0..5 {
            let runs = runs.clone();
            schedule(key, move || runs.set(runs.get() + 1));
        }
        assert_eq!(tick(), 1);
        assert_eq!(runs.get(), 1);

        let again = runs.clone();
        assert!(schedule(key, move || again.set(again.get() + 1)));
        tick();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn defer_never_coalesces() {
        let runs = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let runs = runs.clone();
            defer(move || runs.set(runs.get() + 1));
        }
        assert_eq!(tick(), 3);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn tasks_run_in_scheduling_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let log = log.clone();
            defer(move || log.borrow_mut().push(tag));
        }
        tick();
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn tasks_scheduled_while_draining_run_in_the_same_tick() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let inner = log.clone();
        defer(move || {
            inner.borrow_mut().push("outer");
            let nested = inner.clone();
            defer(move || nested.borrow_mut().push("nested"));
        });
        assert_eq!(tick(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "nested"]);
    }

    #[test]
    fn request_during_run_queues_a_fresh_execution() {
        let runs = Rc::new(Cell::new(0));
        let key = TaskKey::new(3, "resort");
        let outer = runs.clone();
        schedule(key, move || {
            outer.set(outer.get() + 1);
            let inner = outer.clone();
            schedule(key, move || inner.set(inner.get() + 1));
        });
        tick();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    #[traced_test]
    fn panicking_task_is_isolated() {
        let runs = Rc::new(Cell::new(0));
        defer(|| panic!("task failed"));
        let after = runs.clone();
        defer(move || after.set(1));

        tick();

        assert_eq!(runs.get(), 1);
        assert!(logs_contain("task failed"));
    }

    #[test]
    #[traced_test]
    fn runaway_rescheduling_hits_the_pass_limit() {
        fn forever(count: Rc<Cell<u32>>) {
            count.set(count.get() + 1);
            defer(move || forever(count));
        }

        set_max_flush_passes(10);
        let count = Rc::new(Cell::new(0));
        let start = count.clone();
        defer(move || forever(start));
        tick();

        assert_eq!(count.get(), 10);
        assert_eq!(queued_tasks(), 1);
        assert!(logs_contain("flush pass limit reached"));

        set_max_flush_passes(MAX_FLUSH_PASSES);
        while queued_tasks() > 0 {
            with_context(|ctx| ctx.pop_task());
        }
    }

    #[test]
    fn batch_ticks_once_at_the_outermost_end() {
        let runs = Rc::new(Cell::new(0));
        batch(|| {
            let counter = runs.clone();
            schedule(TaskKey::new(9, "change"), move || counter.set(counter.get() + 1));
            batch(|| {
                let counter = runs.clone();
                schedule(TaskKey::new(9, "change"), move || counter.set(counter.get() + 1));
            });
            assert_eq!(runs.get(), 0);
        });
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn batch_returns_the_closure_value() {
        assert_eq!(batch(|| 42), 42);
    }
}

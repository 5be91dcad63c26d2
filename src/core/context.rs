// ============================================================================
// spark-live - Runtime Context
// Thread-local state: identity counters, the scheduler queue, configuration
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::{HashSet, VecDeque};

use super::constants::MAX_FLUSH_PASSES;

// =============================================================================
// TASKS
// =============================================================================

/// Coalescing key of a scheduled task: the owning subject plus a task name.
///
/// Two schedule requests with the same key collapse into one execution while
/// the first is still queued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub subject: u64,
    pub name: &'static str,
}

impl TaskKey {
    pub fn new(subject: u64, name: &'static str) -> Self {
        Self { subject, name }
    }
}

/// A queued unit of deferred work.
pub struct Task {
    /// `None` for tasks that never coalesce.
    pub key: Option<TaskKey>,
    pub run: Box<dyn FnOnce()>,
}

// =============================================================================
// RUNTIME CONTEXT
// =============================================================================

/// Thread-local runtime context holding all global state of the live runtime.
///
/// Everything here is single-threaded: subjects are `Rc`-based and never
/// cross threads, so each thread gets an independent runtime.
pub struct RuntimeContext {
    // =========================================================================
    // IDENTITY
    // =========================================================================
    /// Next subject id (ids are only used for coalescing keys and logs)
    pub next_subject_id: Cell<u64>,

    /// Next pending-future id
    pub next_pending_id: Cell<u64>,

    // =========================================================================
    // SCHEDULER
    // =========================================================================
    /// Tasks waiting for the next tick, in scheduling order
    pub queue: RefCell<VecDeque<Task>>,

    /// Keys of coalescing tasks currently queued
    pub scheduled: RefCell<HashSet<TaskKey>>,

    /// Whether a tick is currently draining the queue
    pub is_flushing: Cell<bool>,

    /// Current batch depth (for nested batches)
    pub batch_depth: Cell<u32>,

    // =========================================================================
    // CONFIGURATION
    // =========================================================================
    /// Drain passes allowed per tick
    pub max_flush_passes: Cell<u32>,
}

impl RuntimeContext {
    /// Create a new runtime context with default values
    pub fn new() -> Self {
        Self {
            next_subject_id: Cell::new(1),
            next_pending_id: Cell::new(1),
            queue: RefCell::new(VecDeque::new()),
            scheduled: RefCell::new(HashSet::new()),
            is_flushing: Cell::new(false),
            batch_depth: Cell::new(0),
            max_flush_passes: Cell::new(MAX_FLUSH_PASSES),
        }
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Allocate a subject id
    pub fn allocate_subject_id(&self) -> u64 {
        let id = self.next_subject_id.get();
        self.next_subject_id.set(id + 1);
        id
    }

    /// Allocate a pending-future id
    pub fn allocate_pending_id(&self) -> u64 {
        let id = self.next_pending_id.get();
        self.next_pending_id.set(id + 1);
        id
    }

    // =========================================================================
    // SCHEDULER
    // =========================================================================

    /// Queue a task. Returns false when a task with the same key is already
    /// queued (the request coalesces into that one).
    pub fn enqueue(&self, task: Task) -> bool {
        if let Some(key) = task.key {
            if !self.scheduled.borrow_mut().insert(key) {
                return false;
            }
        }
        self.queue.borrow_mut().push_back(task);
        true
    }

    /// Pop the oldest task, releasing its coalescing key.
    ///
    /// Once a task is popped, a new request with the same key queues a fresh
    /// execution.
    pub fn pop_task(&self) -> Option<Task> {
        let task = self.queue.borrow_mut().pop_front()?;
        if let Some(key) = task.key {
            self.scheduled.borrow_mut().remove(&key);
        }
        Some(task)
    }

    /// Number of tasks waiting
    pub fn queued_count(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Set flushing mode, returning previous
    pub fn set_flushing(&self, value: bool) -> bool {
        self.is_flushing.replace(value)
    }

    /// Increment batch depth, returns new depth
    pub fn enter_batch(&self) -> u32 {
        let depth = self.batch_depth.get() + 1;
        self.batch_depth.set(depth);
        depth
    }

    /// Decrement batch depth, returns new depth
    pub fn exit_batch(&self) -> u32 {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth
    }

    /// Check if currently in a batch
    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    /// The thread-local runtime context
    static CONTEXT: RuntimeContext = RuntimeContext::new();
}

/// Access the thread-local runtime context.
///
/// Never run user code inside the closure: handlers and tasks may re-enter
/// the context, and the context's `RefCell`s must not be borrowed across
/// such calls.
pub fn with_context<R>(f: impl FnOnce(&RuntimeContext) -> R) -> R {
    CONTEXT.with(f)
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Check if a tick is currently draining the scheduler
pub fn is_flushing() -> bool {
    with_context(|ctx| ctx.is_flushing.get())
}

/// Check if currently in a batch
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

/// Number of tasks waiting for the next tick
pub fn queued_tasks() -> usize {
    with_context(|ctx| ctx.queued_count())
}

/// Change how many drain passes a single tick may run.
pub fn set_max_flush_passes(passes: u32) {
    with_context(|ctx| ctx.max_flush_passes.set(passes.max(1)));
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(key: Option<TaskKey>) -> Task {
        Task {
            key,
            run: Box::new(|| {}),
        }
    }

    #[test]
    fn context_creation() {
        let ctx = RuntimeContext::new();
        assert_eq!(ctx.queued_count(), 0);
        assert!(!ctx.is_flushing.get());
        assert!(!ctx.is_batching());
        assert_eq!(ctx.max_flush_passes.get(), MAX_FLUSH_PASSES);
    }

    #[test]
    fn ids_are_monotonic() {
        let ctx = RuntimeContext::new();
        let a = ctx.allocate_subject_id();
        let b = ctx.allocate_subject_id();
        assert!(b > a);
        assert_eq!(ctx.allocate_pending_id(), 1);
    }

    #[test]
    fn keyed_tasks_coalesce() {
        let ctx = RuntimeContext::new();
        let key = TaskKey::new(1, "change");
        assert!(ctx.enqueue(noop(Some(key))));
        assert!(!ctx.enqueue(noop(Some(key))));
        assert!(ctx.enqueue(noop(Some(TaskKey::new(2, "change")))));
        assert!(ctx.enqueue(noop(None)));
        assert!(ctx.enqueue(noop(None)));
        assert_eq!(ctx.queued_count(), 4);
    }

    #[test]
    fn popping_releases_the_key() {
        let ctx = RuntimeContext::new();
        let key = TaskKey::new(1, "change");
        ctx.enqueue(noop(Some(key)));
        ctx.enqueue(noop(None));

        let first = ctx.pop_task().expect("queued task");
        assert_eq!(first.key, Some(key));
        assert!(ctx.enqueue(noop(Some(key))));
        assert_eq!(ctx.queued_count(), 2);
    }

    #[test]
    fn pop_on_empty_queue() {
        let ctx = RuntimeContext::new();
        assert!(ctx.pop_task().is_none());
    }

    #[test]
    fn batch_depth() {
        let ctx = RuntimeContext::new();
        assert_eq!(ctx.enter_batch(), 1);
        assert_eq!(ctx.enter_batch(), 2);
        assert!(ctx.is_batching());
        assert_eq!(ctx.exit_batch(), 1);
        assert_eq!(ctx.exit_batch(), 0);
        assert!(!ctx.is_batching());
    }
}

//! A single schedule: a deferred, optionally repeating invocation owned by
//! a [`crate::Scheduler`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::threadpool::ThreadPool;

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

type Callback = Box<dyn Fn() + Send + Sync>;

/// A deferred, optionally repeating invocation.
///
/// `function` already owns whatever argument it closes over — unlike the
/// original's separate `void * arg`, Rust closures capture their own state
/// and `Drop` it when the closure itself is dropped. `free_arg`, if
/// supplied, is an *additional* finalizer run exactly once when the
/// schedule is deleted, for state that needs explicit release beyond
/// ordinary `Drop` (the common case passes `None`).
pub struct Schedule {
    id: u64,
    function: Callback,
    free_arg: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    run_cb: Mutex<Option<Callback>>,
    abort_cb: Mutex<Option<Callback>>,
    pub(crate) period: u64,
    pub(crate) start: AtomicU64,
    pub(crate) repeat: AtomicU64,
    pub(crate) scheduled: AtomicBool,
    pub(crate) threadpool: Option<Arc<dyn ThreadPool>>,
    pub(crate) priority: i32,
    dropped: AtomicU64,
}

impl Schedule {
    pub(crate) fn new(
        function: Callback,
        free_arg: Option<Box<dyn FnOnce() + Send>>,
        period: u64,
        start: u64,
        repeat: u64,
        threadpool: Option<Arc<dyn ThreadPool>>,
        priority: i32,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: next_id(),
            function,
            free_arg: Mutex::new(free_arg),
            run_cb: Mutex::new(None),
            abort_cb: Mutex::new(None),
            period,
            start: AtomicU64::new(start),
            repeat: AtomicU64::new(repeat),
            scheduled: AtomicBool::new(false),
            threadpool,
            priority,
            dropped: AtomicU64::new(0),
        })
    }

    /// This schedule's process-unique, monotonically allocated id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The number of firings that could not be dispatched because the
    /// thread pool refused the submission.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    pub(crate) fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn fire(&self) {
        (self.function)();
    }

    pub(crate) fn run_run_callback(&self) {
        if let Some(cb) = self.run_cb.lock().as_deref() {
            cb();
        }
    }

    pub(crate) fn run_abort_callback(&self) {
        if let Some(cb) = self.abort_cb.lock().as_deref() {
            cb();
        }
    }

    pub fn set_run_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.run_cb.lock() = Some(Box::new(callback));
    }

    pub fn set_abort_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.abort_cb.lock() = Some(Box::new(callback));
    }

    /// Run the finalizer, if any was supplied at creation. Called exactly
    /// once, when the schedule is deleted.
    pub(crate) fn finalize(&self) {
        if let Some(free_arg) = self.free_arg.lock().take() {
            free_arg();
        }
    }
}

//! The seam between a schedule's firing and whatever runs it.
//!
//! The scheduler never runs a schedule's function itself — it either hands
//! the job to a [`ThreadPool`], or, if the schedule has none, spawns a
//! fresh detached thread per firing. Concrete pool implementations (and any
//! platform-specific priority/affinity glue for the fresh-thread path) are
//! deliberately outside this crate.

/// A place to submit scheduled work.
pub trait ThreadPool: Send + Sync {
    /// Attempt to submit `job` for execution at `priority`. Returns `false`
    /// if the pool refuses (e.g. its queue is full), in which case the
    /// scheduler does not run `job` at all and counts the firing as
    /// dropped.
    fn try_submit(&self, job: Box<dyn FnOnce() + Send>, priority: i32) -> bool;
}

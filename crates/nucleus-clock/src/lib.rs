//! Monotonic clock used to key the scheduler's deadline queue.
//!
//! Schedule deadlines double as map keys (see `nucleus_scheduler`), so the
//! clock guarantees that successive calls to [`now`] never return the same
//! value within a process, even when called back to back from different
//! threads. [`Clock`] is the seam tests use to swap in a deterministic
//! implementation; [`SystemClock`] is what every non-test caller gets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

static LAST: AtomicU64 = AtomicU64::new(0);

/// Controls the process's view of time.
///
/// In production, [`SystemClock`] is used: it reads the wall clock and bumps
/// the result by a nanosecond whenever two reads would otherwise collide.
/// Tests that need determinism can provide their own implementation.
pub trait Clock: Send + Sync {
    /// Nanoseconds since an arbitrary but fixed epoch. Strictly greater than
    /// every value this clock has previously returned.
    fn now(&self) -> u64;

    /// Block the calling thread for `duration`, resuming with the remainder
    /// if interrupted before it elapses.
    fn sleep(&self, duration: Duration);
}

/// The default [`Clock`], backed by the system wall clock.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        now()
    }

    fn sleep(&self, duration: Duration) {
        sleep(duration)
    }
}

/// Nanoseconds since the Unix epoch, strictly greater than every value
/// previously returned by this function within the process.
///
/// Implemented as a compare-and-swap loop against a process-wide `last`
/// value: if the wall-clock reading is not strictly greater than `last`, it
/// is bumped to `last + 1` instead. This is what lets the scheduler use the
/// clock's output directly as a unique map key.
pub fn now() -> u64 {
    let wall = wall_clock_nanos();
    let mut prev = LAST.load(Ordering::Relaxed);
    loop {
        let candidate = if wall > prev { wall } else { prev + 1 };
        match LAST.compare_exchange_weak(prev, candidate, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return candidate,
            Err(observed) => prev = observed,
        }
    }
}

fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Sleep for `duration`, resuming with the remainder if interrupted early.
///
/// `std::thread::sleep` already retries internally on every platform Rust
/// supports, so this is a thin, documented wrapper rather than a hand-rolled
/// retry loop — it exists so callers have one named seam to depend on
/// instead of reaching for `std::thread::sleep` directly, matching
/// [`Clock::sleep`].
pub fn sleep(duration: Duration) {
    std::thread::sleep(duration);
}

//! The lifecycle state machine and lock/condvar pair shared by every
//! component in the framework (containers' holders, the scheduler, and any
//! component type a consumer defines).
//!
//! Every component embeds a [`ComponentBase`] and implements [`Component`]
//! by delegating `start`/`stop` to it. The container drives `start`/`stop`
//! in declaration order (and its reverse); the component itself is what
//! actually flips its own state, broadcasting the condition variable so
//! anyone parked in [`ComponentBase::wait_and_lock`] wakes up.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard, WaitTimeoutResult};

/// The lifecycle state of a component.
///
/// Transitions are `Initialized -> Running <-> Stopped -> Deleted`.
/// `Deleted` is terminal: once reached, no further transition is permitted.
/// `Initialized` is never observed once a [`ComponentBase`] has been
/// constructed — [`ComponentBase::new`] moves straight to `Stopped`, the
/// same way the component it backs would move straight to stopped-but-not-
/// yet-started as soon as its factory finishes building it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ComponentState {
    Initialized = 0b0001,
    Running = 0b0010,
    Stopped = 0b0100,
    Deleted = 0b1000,
}

impl ComponentState {
    /// This state's bit within a [`wait_and_lock`](ComponentBase::wait_and_lock) mask.
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

/// A bitmask of [`ComponentState`] bits, as built from [`ComponentState::bit`].
pub type StateMask = u8;

/// The lock, condition variable, lifecycle state and reference count shared
/// by every component.
///
/// This is meant to be embedded as a field (commonly named `base`) in a
/// concrete component type, which then implements [`Component`] by
/// forwarding to it.
pub struct ComponentBase {
    state: Mutex<ComponentState>,
    cond: Condvar,
    refcount: AtomicUsize,
}

impl Default for ComponentBase {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentBase {
    /// Construct a new base: state `Stopped`, reference count 1.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ComponentState::Stopped),
            cond: Condvar::new(),
            refcount: AtomicUsize::new(1),
        }
    }

    /// Increment the reference count.
    pub fn add_ref(&self) {
        self.refcount.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the reference count. Returns `true` iff it reached zero,
    /// in which case the caller is responsible for finalizing the component.
    pub fn dec_ref(&self) -> bool {
        self.refcount.fetch_sub(1, Ordering::SeqCst) == 1
    }

    /// The current reference count.
    pub fn ref_count(&self) -> usize {
        self.refcount.load(Ordering::SeqCst)
    }

    /// The current state, without holding the lock across any further work.
    pub fn state(&self) -> ComponentState {
        *self.state.lock()
    }

    /// Acquire the state lock exclusively.
    pub fn lock(&self) -> MutexGuard<'_, ComponentState> {
        self.state.lock()
    }

    /// Transition to `Running`. A no-op if already `Running`; refused if
    /// the component is `Deleted`. Broadcasts the condition variable.
    pub fn set_running(&self) {
        self.set_state(ComponentState::Running);
    }

    /// Transition to `Stopped`. A no-op if already `Stopped`; refused if
    /// the component is `Deleted`. Broadcasts the condition variable.
    pub fn set_stopped(&self) {
        self.set_state(ComponentState::Stopped);
    }

    /// Transition to `Deleted`, the terminal state. Broadcasts the
    /// condition variable one last time so that anyone waiting observes it.
    pub fn set_deleted(&self) {
        self.set_state(ComponentState::Deleted);
    }

    fn set_state(&self, target: ComponentState) {
        let mut guard = self.state.lock();
        if *guard == ComponentState::Deleted {
            // Terminal: DELETED never transitions away from itself.
            return;
        }
        *guard = target;
        self.cond.notify_all();
    }

    /// Acquire the lock, then wait until the current state's bit is set in
    /// `mask`, returning the held guard (its state satisfies `mask`).
    ///
    /// Used by the scheduler's dispatcher thread to wait for
    /// `Running | Deleted` before it will consider firing schedules.
    pub fn wait_and_lock(&self, mask: StateMask) -> MutexGuard<'_, ComponentState> {
        let mut guard = self.state.lock();
        while guard.bit() & mask == 0 {
            self.cond.wait(&mut guard);
        }
        guard
    }

    /// Wait on the condition variable associated with this base for up to
    /// `timeout`, or until some other thread calls one of the `set_*`
    /// methods. `guard` must be a lock already held on this base (typically
    /// the one returned by [`wait_and_lock`](Self::wait_and_lock)).
    pub fn timed_wait(
        &self,
        guard: &mut MutexGuard<'_, ComponentState>,
        timeout: Duration,
    ) -> WaitTimeoutResult {
        self.cond.wait_for(guard, timeout)
    }
}

/// A component with an observable lifecycle.
///
/// Implementors embed a [`ComponentBase`] and have `start`/`stop` transition
/// it, typically via [`ComponentBase::set_running`]/[`ComponentBase::set_stopped`].
/// The container invokes `start`/`stop` directly; it is the component, not
/// the container, that flips its own state.
pub trait Component: Send + Sync {
    /// Access this component's shared lifecycle state.
    fn base(&self) -> &ComponentBase;

    /// Start the component. Implementations call `self.base().set_running()`
    /// after doing whatever work is needed to actually begin operating.
    fn start(&self);

    /// Stop the component. Implementations call `self.base().set_stopped()`
    /// after doing whatever work is needed to actually cease operating.
    fn stop(&self);

    /// Downcasting hook, so code holding a `dyn Component` found by name
    /// (e.g. a container's `find_component`) can recover the concrete type
    /// it expects, such as the scheduler factory recovering a named
    /// `Logger` component. Implementations return `self`.
    fn as_any(&self) -> &dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn new_base_starts_stopped_with_refcount_one() {
        let base = ComponentBase::new();
        assert_eq!(base.state(), ComponentState::Stopped);
        assert_eq!(base.ref_count(), 1);
    }

    #[test]
    fn refcounting_reports_zero_exactly_once() {
        let base = ComponentBase::new();
        base.add_ref();
        base.add_ref();
        assert!(!base.dec_ref());
        assert!(!base.dec_ref());
        assert!(base.dec_ref());
    }

    #[test]
    fn deleted_is_terminal() {
        let base = ComponentBase::new();
        base.set_deleted();
        base.set_running();
        assert_eq!(base.state(), ComponentState::Deleted);
        base.set_stopped();
        assert_eq!(base.state(), ComponentState::Deleted);
    }

    #[test]
    fn set_running_is_idempotent() {
        let base = ComponentBase::new();
        base.set_running();
        base.set_running();
        assert_eq!(base.state(), ComponentState::Running);
    }

    #[test]
    fn wait_and_lock_wakes_on_matching_transition() {
        let base = Arc::new(ComponentBase::new());
        let waiter = {
            let base = base.clone();
            std::thread::spawn(move || {
                let guard = base.wait_and_lock(ComponentState::Running.bit() | ComponentState::Deleted.bit());
                *guard
            })
        };

        // Give the waiter a moment to actually park on the condvar before we
        // transition, so this isn't just racing a state that was already set.
        std::thread::sleep(Duration::from_millis(20));
        base.set_running();

        assert_eq!(waiter.join().unwrap(), ComponentState::Running);
    }

    #[test]
    fn wait_and_lock_returns_immediately_if_mask_already_satisfied() {
        let base = ComponentBase::new();
        base.set_running();
        let guard = base.wait_and_lock(ComponentState::Running.bit());
        assert_eq!(*guard, ComponentState::Running);
    }
}

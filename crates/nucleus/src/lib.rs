//! Facade crate: re-exports the component/container/scheduler/clock crates
//! and wires the built-in scheduler factory into the container's
//! process-wide factory registry.
//!
//! A consumer who only depends on `nucleus` gets a working
//! `"Nucleus::Scheduler"` component out of the box by calling [`install`]
//! once at process startup, before allocating any container.

pub use nucleus_clock as clock;
pub use nucleus_component::{Component, ComponentBase, ComponentState, StateMask};
pub use nucleus_container::{
    registry, ComponentConfig, ComponentInfo, ConfigError, ConfigLoader, Container, EnvSubstituter, Factory, LogSink,
    Logger, LoggerFactory, ProcessEnvSubstituter, TracingLogger,
};
pub use nucleus_scheduler::{ErrorKind as SchedulerErrorKind, Schedule, Scheduler, SchedulerError, SchedulerFactory, ThreadPool, FACTORY_TYPE};

use std::sync::Arc;
use std::sync::Once;

static INSTALL: Once = Once::new();

/// Register every built-in factory type (currently just the scheduler)
/// into the process-wide factory registry. Idempotent: safe to call more
/// than once, from more than one thread; only the first call does
/// anything.
pub fn install() {
    INSTALL.call_once(|| {
        registry::add_factory(Arc::new(SchedulerFactory));
    });
}

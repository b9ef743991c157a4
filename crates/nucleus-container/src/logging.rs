//! The `Logger` component type: a thin, level-filtered sink that other
//! components look up with [`Container::find_component`] to route their own
//! diagnostics, plus the container's own internal default instance.
//!
//! [`LogSink`] mirrors the `enabled`/`log` shape of `log::Log` deliberately:
//! it's the same contract, kept local so this crate isn't forced to take a
//! dependency that none of its call sites actually use. [`TracingLogger`] is
//! the production implementation, forwarding into `tracing`.

use std::sync::Arc;

use nucleus_component::{Component, ComponentBase};
use tracing::Level;

use crate::config::ComponentConfig;
use crate::container::Container;
use crate::factory::Factory;

/// A level-filtered log sink. Implementations decide both whether a record
/// at `level` is worth accepting (`enabled`) and what to do with one that is
/// (`log`).
pub trait LogSink: Send + Sync {
    fn enabled(&self, level: Level) -> bool;
    fn log(&self, level: Level, target: &str, message: &str);
}

/// The default [`LogSink`]: forwards every record into `tracing`.
///
/// `enabled` always returns `true` here — `tracing`'s own dispatch already
/// performs cheap level filtering against the active subscriber before a
/// record is ever built, so a second filter in front of it would only
/// duplicate that work.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingLogger;

impl LogSink for TracingLogger {
    fn enabled(&self, _level: Level) -> bool {
        true
    }

    fn log(&self, level: Level, target: &str, message: &str) {
        match level {
            Level::ERROR => tracing::error!(target: "nucleus", component = target, "{message}"),
            Level::WARN => tracing::warn!(target: "nucleus", component = target, "{message}"),
            Level::INFO => tracing::info!(target: "nucleus", component = target, "{message}"),
            Level::DEBUG => tracing::debug!(target: "nucleus", component = target, "{message}"),
            Level::TRACE => tracing::trace!(target: "nucleus", component = target, "{message}"),
        }
    }
}

/// A named, lookup-able logging component.
///
/// Containers get one of these for free (see [`Container::logger`]) and may
/// also declare a named component of type `"Logger"`, in which case other
/// components find it with `find_component` the same way they'd find any
/// other collaborator.
pub struct Logger {
    base: ComponentBase,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            base: ComponentBase::new(),
            sink,
        }
    }

    pub fn trace(&self, target: &str, message: &str) {
        self.emit(Level::TRACE, target, message);
    }

    pub fn debug(&self, target: &str, message: &str) {
        self.emit(Level::DEBUG, target, message);
    }

    pub fn info(&self, target: &str, message: &str) {
        self.emit(Level::INFO, target, message);
    }

    pub fn warn(&self, target: &str, message: &str) {
        self.emit(Level::WARN, target, message);
    }

    pub fn error(&self, target: &str, message: &str) {
        self.emit(Level::ERROR, target, message);
    }

    fn emit(&self, level: Level, target: &str, message: &str) {
        if self.sink.enabled(level) {
            self.sink.log(level, target, message);
        }
    }
}

impl Component for Logger {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn start(&self) {
        self.base.set_running();
    }

    fn stop(&self) {
        self.base.set_stopped();
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(Arc::new(TracingLogger))
    }
}

/// Builds plain [`Logger`] components for the `"Logger"` factory type,
/// registered by default in every process (see [`crate::registry`]).
pub struct LoggerFactory;

impl Factory for LoggerFactory {
    fn type_name(&self) -> &str {
        "Logger"
    }

    fn configure(&self, _container: &Container, _config: &ComponentConfig) -> Option<Arc<dyn Component>> {
        Some(Arc::new(Logger::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<(Level, String)>>,
    }

    impl LogSink for RecordingSink {
        fn enabled(&self, _level: Level) -> bool {
            true
        }

        fn log(&self, level: Level, _target: &str, message: &str) {
            self.records.lock().unwrap().push((level, message.to_string()));
        }
    }

    #[test]
    fn logger_forwards_to_its_sink() {
        let sink = Arc::new(RecordingSink::default());
        let logger = Logger::new(sink.clone());
        logger.warn("unit-test", "something happened");

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], (Level::WARN, "something happened".to_string()));
    }

    #[test]
    fn logger_factory_always_builds_a_component() {
        let factory = LoggerFactory;
        assert_eq!(factory.type_name(), "Logger");
    }
}

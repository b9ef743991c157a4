//! The component container: a process-wide registry of named containers,
//! each an ordered list of named components instantiated from
//! configuration, plus the factory registry components are built through.
//!
//! See [`Container`] for the per-container API and [`registry`] for the
//! process-wide allocation/factory functions ([`registry::alloc`],
//! [`registry::find`], [`registry::free`], [`registry::add_factory`]).

mod config;
mod container;
mod error;
mod factory;
mod logging;
#[cfg(feature = "dynamic-load")]
mod plugin;
pub mod registry;

pub use config::{ComponentConfig, ConfigLoader, EnvSubstituter, ProcessEnvSubstituter};
pub use container::{ComponentInfo, Container};
pub use error::ConfigError;
pub use factory::Factory;
pub use logging::{LogSink, Logger, LoggerFactory, TracingLogger};

#[cfg(feature = "dynamic-load")]
pub use plugin::FactoryConstructor;

//! Process-wide state: the set of allocated containers, the set of
//! registered factories, and the installed configuration hooks.
//!
//! Everything here is a global: containers and factories are found by
//! name from anywhere in the process, not threaded through as a handle.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;

use crate::config::{ConfigLoader, EnvSubstituter};
use crate::container::Container;
use crate::factory::Factory;
use crate::logging::LoggerFactory;

static CONTAINERS: Lazy<Mutex<HashMap<String, Arc<Container>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

static FACTORIES: Lazy<Mutex<HashMap<String, Arc<dyn Factory>>>> = Lazy::new(|| {
    let mut factories: HashMap<String, Arc<dyn Factory>> = HashMap::new();
    let logger_factory: Arc<dyn Factory> = Arc::new(LoggerFactory);
    factories.insert(logger_factory.type_name().to_string(), logger_factory);
    Mutex::new(factories)
});

static CONFIG_LOADER: OnceCell<Arc<dyn ConfigLoader>> = OnceCell::new();
static ENV_SUBSTITUTER: OnceCell<Arc<dyn EnvSubstituter>> = OnceCell::new();

/// Install the process-wide configuration loader. Returns `false` if one
/// was already installed; a process installs exactly one, typically at
/// startup.
pub fn install_config_loader(loader: Arc<dyn ConfigLoader>) -> bool {
    CONFIG_LOADER.set(loader).is_ok()
}

pub fn config_loader() -> Option<Arc<dyn ConfigLoader>> {
    CONFIG_LOADER.get().cloned()
}

/// Install the process-wide `${VAR}` substituter, overriding the default
/// [`crate::config::ProcessEnvSubstituter`]. Returns `false` if one was
/// already installed.
pub fn install_env_substituter(substituter: Arc<dyn EnvSubstituter>) -> bool {
    ENV_SUBSTITUTER.set(substituter).is_ok()
}

pub(crate) fn env_substituter() -> Option<Arc<dyn EnvSubstituter>> {
    ENV_SUBSTITUTER.get().cloned()
}

/// Allocate a new, empty container under `name`. Returns `None` if a
/// container with that name already exists.
pub fn alloc(name: &str) -> Option<Arc<Container>> {
    let mut containers = CONTAINERS.lock();
    if containers.contains_key(name) {
        return None;
    }
    let container = Arc::new(Container::new(name));
    containers.insert(name.to_string(), container.clone());
    Some(container)
}

/// Find a previously allocated container by name.
pub fn find(name: &str) -> Option<Arc<Container>> {
    CONTAINERS.lock().get(name).cloned()
}

/// Unregister and tear down a container: every component it holds is
/// removed and handed to its factory's `free`, in declaration order,
/// without first stopping them. Callers that want a graceful shutdown call
/// [`Container::stop`] before this.
pub fn free(container: &Arc<Container>) {
    CONTAINERS.lock().remove(container.name());
    container.teardown();
}

/// The names of every currently allocated container.
pub fn list_containers() -> Vec<String> {
    CONTAINERS.lock().keys().cloned().collect()
}

/// Register a factory under its own [`Factory::type_name`]. A type name
/// already registered keeps its original factory; the first registration
/// for a given name wins.
pub fn add_factory(factory: Arc<dyn Factory>) {
    let mut factories = FACTORIES.lock();
    factories.entry(factory.type_name().to_string()).or_insert(factory);
}

/// Find a previously registered factory by type name.
pub fn find_factory(type_name: &str) -> Option<Arc<dyn Factory>> {
    FACTORIES.lock().get(type_name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_rejects_a_duplicate_name() {
        assert!(alloc("registry::dup").is_some());
        assert!(alloc("registry::dup").is_none());
        free(&find("registry::dup").unwrap());
    }

    #[test]
    fn logger_factory_is_registered_by_default() {
        assert!(find_factory("Logger").is_some());
    }

    #[test]
    fn free_removes_the_container_from_the_registry() {
        let container = alloc("registry::free-me").unwrap();
        free(&container);
        assert!(find("registry::free-me").is_none());
    }
}

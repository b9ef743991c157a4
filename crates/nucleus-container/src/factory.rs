//! The contract a component type implements to become instantiable by name
//! from configuration.

use std::sync::Arc;

use nucleus_component::Component;

use crate::config::ComponentConfig;
use crate::container::Container;

/// Builds components of one named type.
///
/// A factory is registered once per type name in the process-wide registry
/// ([`crate::registry::add_factory`]) and is then used by every container
/// that declares a component of that type.
pub trait Factory: Send + Sync {
    /// The type name components of this kind are declared under, e.g.
    /// `"Logger"` or `"Nucleus::Scheduler"`.
    fn type_name(&self) -> &str;

    /// Build a new component from its configuration, or `None` if `config`
    /// doesn't describe a valid instance. `container` is the container the
    /// component is being created into, which some factories need (to look
    /// up a collaborator component by [`Container::find_component`]).
    fn configure(&self, container: &Container, config: &ComponentConfig) -> Option<Arc<dyn Component>>;

    /// Called once, when a component built by this factory is being
    /// permanently released from its container. Ordinary components need
    /// no override here: once the last `Arc` clone drops, `Drop` handles
    /// teardown. Factories whose components hold a resource the type
    /// system can't express as ownership (an external library handle, a
    /// registration elsewhere) override this to release it explicitly.
    fn free(&self, component: &dyn Component) {
        let _ = component;
    }
}

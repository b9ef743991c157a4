//! Dynamic factory loading, gated behind the `dynamic-load` feature so
//! consumers that never declare a plug-in component don't pay for the
//! `unsafe` surface it requires.
//!
//! A component's configuration may carry `Library`/`Factory` keys naming a
//! shared object and a symbol within it. Resolving that symbol yields a
//! constructor for the [`Factory`] the library provides, which is then
//! registered into the process-wide factory registry like any other.
//!
//! There is no stable ABI here: a plug-in is an ordinary Rust `cdylib`
//! built against the exact same compiler and the exact same version of
//! this crate as the host process. `libloading` only gets us dynamic
//! symbol resolution, not ABI stability across compiler versions.

use std::sync::Arc;

use crate::config;
use crate::container::Container;
use crate::factory::Factory;
use crate::registry;

/// The signature a plug-in library exports its factory constructor symbol
/// as.
pub type FactoryConstructor = unsafe fn() -> Box<dyn Factory>;

pub(crate) fn try_load(container: &Container, raw_config_text: &str) -> Option<Arc<dyn Factory>> {
    let config = config::decode_component_config(raw_config_text).ok()?;
    let library = config.get("Library")?.as_str()?;
    let symbol = config.get("Factory")?.as_str()?;

    let lib = match unsafe { libloading::Library::new(library) } {
        Ok(lib) => lib,
        Err(err) => {
            container.logger().error(
                container.name(),
                &format!("invalid configuration, could not dynamically load library {library}: {err}"),
            );
            return None;
        }
    };

    let ctor: libloading::Symbol<FactoryConstructor> = match unsafe { lib.get(symbol.as_bytes()) } {
        Ok(ctor) => ctor,
        Err(err) => {
            container.logger().error(
                container.name(),
                &format!("invalid configuration, could not find factory symbol {symbol} in {library}: {err}"),
            );
            return None;
        }
    };

    let factory: Arc<dyn Factory> = Arc::from(unsafe { ctor() });
    registry::add_factory(factory.clone());

    // The plug-in must stay mapped for as long as any container might call
    // into its factory, and there's no unload API: leak the handle for the
    // life of the process.
    std::mem::forget(lib);

    Some(factory)
}

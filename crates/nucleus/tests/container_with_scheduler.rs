//! End-to-end: a container declaring a `Logger` and a `Nucleus::Scheduler`
//! component, the scheduler resolving its named logger by lazy lookup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;

use nucleus::{registry, ComponentState};

struct MapLoader(Mutex<HashMap<String, String>>);

impl nucleus::ConfigLoader for MapLoader {
    fn load(&self, name: &str) -> Option<String> {
        self.0.lock().unwrap().get(name).cloned()
    }
}

// `install_config_loader` succeeds exactly once per process, and every test
// in this binary shares that one process. Each test contributes its own
// declarations to one shared loader (installed lazily, on first use) rather
// than each trying to install its own — container names are kept distinct
// across tests so this is equivalent to isolated loaders in practice.
static LOADER: Lazy<Arc<MapLoader>> = Lazy::new(|| Arc::new(MapLoader(Mutex::new(HashMap::new()))));

fn install_loader(entries: &[(&str, &str)]) {
    {
        let mut map = LOADER.0.lock().unwrap();
        for &(k, v) in entries {
            map.insert(k.to_string(), v.to_string());
        }
    }
    let _ = registry::install_config_loader(LOADER.clone());
}

#[test]
fn demo_container_starts_logger_then_scheduler_and_stops_in_reverse() {
    nucleus::install();
    install_loader(&[
        ("demo", r#"{"log": "Logger", "sched": "Nucleus::Scheduler"}"#),
        ("log", "{}"),
        ("sched", r#"{"Logger": "log"}"#),
    ]);

    let container = registry::alloc("demo").expect("first allocation of demo succeeds");
    assert!(container.init());

    let components = container.components();
    assert_eq!(components.len(), 2);
    assert_eq!(components[0].name, "log");
    assert_eq!(components[1].name, "sched");

    container.start();
    let started = container.components();
    assert_eq!(started[0].state, ComponentState::Running);
    assert_eq!(started[1].state, ComponentState::Running);

    container.stop();
    let stopped = container.components();
    assert_eq!(stopped[0].state, ComponentState::Stopped);
    assert_eq!(stopped[1].state, ComponentState::Stopped);

    registry::free(&container);
    assert!(registry::find("demo").is_none());
}

#[test]
fn scheduler_fires_a_finite_repeat_schedule_the_expected_number_of_times() {
    nucleus::install();
    install_loader(&[("scheduler-only", r#"{"sched": "Nucleus::Scheduler"}"#), ("sched", "{}")]);

    let container = registry::alloc("scheduler-only").unwrap();
    assert!(container.init());
    container.start();

    let component = container.find_component("sched").expect("scheduler present");
    let scheduler = component
        .as_any()
        .downcast_ref::<nucleus::Scheduler>()
        .expect("component is a Scheduler");

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let schedule = scheduler
        .create(move || { counter.fetch_add(1, Ordering::SeqCst); }, None, 20_000_000, 0, 3, None, 0)
        .unwrap();
    scheduler.add(&schedule);

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while fired.load(Ordering::SeqCst) < 3 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(fired.load(Ordering::SeqCst), 3);

    scheduler.delete(&schedule);
    container.stop();
    registry::free(&container);
}

#[test]
fn find_component_on_an_unknown_name_with_no_declaration_returns_none() {
    nucleus::install();
    install_loader(&[("barebones", "{}")]);
    let container = registry::alloc("barebones").unwrap();
    assert!(container.init());
    assert!(container.find_component("does-not-exist").is_none());
    registry::free(&container);
}

//! The scheduler component: a deadline-ordered queue, an idle map, and a
//! dedicated dispatcher thread that sleeps until the next deadline.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use nucleus_component::{Component, ComponentBase, ComponentState};
use nucleus_container::{ComponentConfig, Container, Factory, Logger};

use crate::error::{ErrorKind, SchedulerError};
use crate::schedule::Schedule;
use crate::threadpool::ThreadPool;

/// The factory type name this crate's scheduler is declared under in
/// container configuration.
pub const FACTORY_TYPE: &str = "Nucleus::Scheduler";

const DEFAULT_WAKE_NS: u64 = 24 * 60 * 60 * 1_000_000_000;

struct SchedulerData {
    queue: BTreeMap<u64, Arc<Schedule>>,
    idle: HashMap<u64, Arc<Schedule>>,
    schd_time: u64,
}

/// A container-hosted component that fires schedules at their deadline,
/// dispatching each to a thread pool or a fresh thread.
///
/// Two independent lock/condvar pairs coordinate the dispatcher thread:
/// [`ComponentBase`]'s own pair (for the `RUNNING`/`DELETED` state wait) and
/// a second pair owned directly by `Scheduler` (for the deadline wait over
/// `queue`/`idle`/`schd_time`). Every state transition notifies both, so the
/// dispatcher wakes promptly regardless of which wait it is currently
/// parked in — splitting them this way keeps [`ComponentBase`] a small,
/// reusable, non-scheduler-specific primitive that every other component
/// type in the workspace also embeds.
pub struct Scheduler {
    base: ComponentBase,
    data: Mutex<SchedulerData>,
    cond: Condvar,
    logger: Option<Arc<dyn Component>>,
}

impl Scheduler {
    pub fn new(logger: Option<Arc<dyn Component>>) -> Arc<Self> {
        let scheduler = Arc::new(Self {
            base: ComponentBase::new(),
            data: Mutex::new(SchedulerData {
                queue: BTreeMap::new(),
                idle: HashMap::new(),
                schd_time: nucleus_clock::now() + DEFAULT_WAKE_NS,
            }),
            cond: Condvar::new(),
            logger,
        });

        scheduler.with_logger(|logger| logger.info("nucleus-scheduler", "scheduler allocated"));

        let dispatcher = scheduler.clone();
        std::thread::spawn(move || Self::dispatch_loop(dispatcher));
        scheduler
    }

    fn with_logger(&self, f: impl FnOnce(&Logger)) {
        if let Some(component) = &self.logger {
            if let Some(logger) = component.as_any().downcast_ref::<Logger>() {
                f(logger);
            }
        }
    }

    /// Create a new schedule, initially idle (not yet added to the due-time
    /// queue). `function` already owns whatever it needs to run — there is
    /// no separate `arg` parameter; capture it in the closure.
    pub fn create(
        &self,
        function: impl Fn() + Send + Sync + 'static,
        free_arg: Option<Box<dyn FnOnce() + Send>>,
        period: u64,
        delay: u64,
        repeat: u64,
        pool: Option<Arc<dyn ThreadPool>>,
        priority: i32,
    ) -> Result<Arc<Schedule>, SchedulerError> {
        if repeat != 1 && period == 0 {
            return Err(ErrorKind::ZeroPeriod.into());
        }

        let start = nucleus_clock::now() + delay;
        let schedule = Schedule::new(Box::new(function), free_arg, period, start, repeat, pool, priority);

        let mut data = self.data.lock();
        data.idle.insert(schedule.id(), schedule.clone());
        drop(data);

        self.with_logger(|logger| {
            logger.trace(
                "nucleus-scheduler",
                &format!("created schedule #{} (period: {period} repeat: {repeat})", schedule.id()),
            )
        });
        Ok(schedule)
    }

    /// Move a schedule from the idle map to the due-time queue. Returns
    /// `false` if it was already scheduled.
    pub fn add(&self, schedule: &Arc<Schedule>) -> bool {
        let mut data = self.data.lock();
        if schedule.scheduled.load(Ordering::SeqCst) {
            return false;
        }
        data.idle.remove(&schedule.id());
        let start = schedule.start.load(Ordering::SeqCst);
        let key = Self::queue_insert(&mut data, schedule, start);
        self.notify_if_front(&mut data, key);
        true
    }

    /// Move a schedule from the due-time queue back to idle. Returns
    /// `false` if it was not scheduled.
    pub fn remove(&self, schedule: &Arc<Schedule>) -> bool {
        let mut data = self.data.lock();
        if !schedule.scheduled.load(Ordering::SeqCst) {
            return false;
        }
        data.queue.remove(&schedule.start.load(Ordering::SeqCst));
        schedule.scheduled.store(false, Ordering::SeqCst);
        data.idle.insert(schedule.id(), schedule.clone());
        true
    }

    /// Recompute a schedule's next deadline as `now() + period`. If it is
    /// currently queued, re-queues it at the new deadline; otherwise just
    /// updates its stored `start` for whenever it is next added.
    pub fn reset(&self, schedule: &Arc<Schedule>) {
        let mut data = self.data.lock();
        let next = nucleus_clock::now() + schedule.period;
        if schedule.scheduled.load(Ordering::SeqCst) {
            data.queue.remove(&schedule.start.load(Ordering::SeqCst));
            let key = Self::queue_insert(&mut data, schedule, next);
            self.notify_if_front(&mut data, key);
        } else {
            schedule.start.store(next, Ordering::SeqCst);
        }
    }

    pub fn add_run_callback(&self, schedule: &Arc<Schedule>, callback: impl Fn() + Send + Sync + 'static) {
        schedule.set_run_callback(callback);
    }

    pub fn add_abort_callback(&self, schedule: &Arc<Schedule>, callback: impl Fn() + Send + Sync + 'static) {
        schedule.set_abort_callback(callback);
    }

    /// Remove a schedule from whichever map holds it and run its
    /// finalizer. The schedule handle itself is freed once every `Arc`
    /// clone (including the caller's) drops.
    pub fn delete(&self, schedule: &Arc<Schedule>) {
        let mut data = self.data.lock();
        if schedule.scheduled.load(Ordering::SeqCst) {
            data.queue.remove(&schedule.start.load(Ordering::SeqCst));
        } else {
            data.idle.remove(&schedule.id());
        }
        drop(data);
        schedule.finalize();
    }

    fn queue_insert(data: &mut SchedulerData, schedule: &Arc<Schedule>, mut start: u64) -> u64 {
        while data.queue.contains_key(&start) {
            start += 1;
        }
        schedule.start.store(start, Ordering::SeqCst);
        schedule.scheduled.store(true, Ordering::SeqCst);
        data.queue.insert(start, schedule.clone());
        start
    }

    fn notify_if_front(&self, data: &mut SchedulerData, key: u64) {
        if data.queue.keys().next() == Some(&key) {
            data.schd_time = key;
            if self.base.state() == ComponentState::Running {
                self.cond.notify_all();
            }
        }
    }

    /// Called once by [`crate::SchedulerFactory::free`] when this
    /// scheduler's reference count reaches zero.
    pub(crate) fn shutdown(&self) {
        self.stop();
        nucleus_clock::sleep(Duration::from_micros(500));
        self.base.set_deleted();
        {
            let _data = self.data.lock();
            self.cond.notify_all();
        }
        nucleus_clock::sleep(Duration::from_micros(500));

        let mut data = self.data.lock();
        for schedule in data.queue.values().chain(data.idle.values()) {
            schedule.finalize();
        }
        data.queue.clear();
        data.idle.clear();
    }

    fn dispatch_loop(scheduler: Arc<Scheduler>) {
        loop {
            let state = {
                let guard = scheduler
                    .base
                    .wait_and_lock(ComponentState::Running.bit() | ComponentState::Deleted.bit());
                *guard
            };
            if state == ComponentState::Deleted {
                break;
            }

            let mut data = scheduler.data.lock();
            let wait_ns = data.schd_time.saturating_sub(nucleus_clock::now());
            let _ = scheduler.cond.wait_for(&mut data, Duration::from_nanos(wait_ns));

            let state = scheduler.base.state();
            if state != ComponentState::Running {
                drop(data);
                scheduler.with_logger(|logger| {
                    logger.debug(
                        "nucleus-scheduler",
                        if state == ComponentState::Deleted {
                            "dispatcher terminating"
                        } else {
                            "dispatcher stopping"
                        },
                    )
                });
                if state == ComponentState::Deleted {
                    break;
                }
                continue;
            }

            scheduler.fire_due_schedule(&mut data);
        }
    }

    fn fire_due_schedule(&self, data: &mut SchedulerData) {
        let now = nucleus_clock::now();
        let due = data.queue.iter().next().is_some_and(|(&start, _)| start <= now);
        if due {
            let (_, current) = data.queue.pop_first().expect("checked non-empty above");
            current.run_run_callback();

            if let Some(pool) = current.threadpool.clone() {
                self.with_logger(|logger| {
                    logger.trace(
                        "nucleus-scheduler",
                        &format!("running schedule #{} from thread pool", current.id()),
                    )
                });
                let job = current.clone();
                if !pool.try_submit(Box::new(move || job.fire()), current.priority) {
                    current.run_abort_callback();
                    if current.record_dropped() == 0 {
                        self.with_logger(|logger| {
                            logger.warn(
                                "nucleus-scheduler",
                                &format!("scheduled event dropped for schedule #{}", current.id()),
                            )
                        });
                    }
                }
            } else {
                self.with_logger(|logger| {
                    logger.trace("nucleus-scheduler", &format!("running schedule #{} as thread", current.id()))
                });
                let job = current.clone();
                std::thread::spawn(move || job.fire());
            }

            let next = current.period + now;
            let repeat = current.repeat.load(Ordering::SeqCst);
            if repeat > 0 {
                if current.repeat.fetch_sub(1, Ordering::SeqCst) == 1 {
                    current.start.store(next, Ordering::SeqCst);
                    current.scheduled.store(false, Ordering::SeqCst);
                    data.idle.insert(current.id(), current.clone());
                } else {
                    Self::queue_insert(data, &current, next);
                }
            } else {
                Self::queue_insert(data, &current, next);
            }
        }

        data.schd_time = data
            .queue
            .keys()
            .next()
            .copied()
            .unwrap_or_else(|| nucleus_clock::now() + DEFAULT_WAKE_NS);
    }
}

impl Component for Scheduler {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn start(&self) {
        self.base.set_running();
        let _data = self.data.lock();
        self.cond.notify_all();
    }

    fn stop(&self) {
        self.base.set_stopped();
        let _data = self.data.lock();
        self.cond.notify_all();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builds [`Scheduler`] components for the [`FACTORY_TYPE`] factory type.
pub struct SchedulerFactory;

impl Factory for SchedulerFactory {
    fn type_name(&self) -> &str {
        FACTORY_TYPE
    }

    fn configure(&self, container: &Container, config: &ComponentConfig) -> Option<Arc<dyn Component>> {
        let logger: Option<Arc<dyn Component>> = match config.get("Logger").and_then(|v| v.as_str()) {
            Some(name) => container.find_component(name),
            None => Some(container.logger_handle() as Arc<dyn Component>),
        };
        // `Priority`/`Affinity` are accepted for configuration compatibility
        // but have no portable `std::thread` equivalent, so they are parsed
        // and discarded rather than silently rejected.
        let _priority = config.get("Priority").and_then(|v| v.as_i64());
        let _affinity = config.get("Affinity").and_then(|v| v.as_i64());

        Some(Scheduler::new(logger))
    }

    fn free(&self, component: &dyn Component) {
        if let Some(scheduler) = component.as_any().downcast_ref::<Scheduler>() {
            scheduler.shutdown();
        }
    }
}

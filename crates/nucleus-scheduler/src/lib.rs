//! The periodic scheduler: a deadline-ordered queue of [`Schedule`]s and a
//! dedicated dispatcher thread, hosted as a container component.
//!
//! [`Scheduler::create`] allocates a schedule (initially idle);
//! [`Scheduler::add`]/[`Scheduler::remove`] move it between the idle map
//! and the due-time queue; [`Scheduler::reset`] recomputes its deadline;
//! [`Scheduler::delete`] tears it down. [`SchedulerFactory`] wires the type
//! into [`nucleus_container`]'s factory registry under [`FACTORY_TYPE`].

mod error;
mod schedule;
mod scheduler;
mod threadpool;

pub use error::{ErrorKind, SchedulerError};
pub use schedule::Schedule;
pub use scheduler::{Scheduler, SchedulerFactory, FACTORY_TYPE};
pub use threadpool::ThreadPool;

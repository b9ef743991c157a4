//! The scheduler's error type, following this workspace's `Error`/`ErrorKind`
//! idiom: an opaque public newtype wrapping a private enum, so new variants
//! can be added later without it being a breaking change.

use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct SchedulerError(#[from] ErrorKind);

impl SchedulerError {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("a schedule with repeat != 1 must have a period greater than zero")]
    ZeroPeriod,

    #[error("no factory is registered for type {0:?}")]
    UnknownLoggerComponent(String),
}

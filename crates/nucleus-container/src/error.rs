//! Errors raised while decoding a component or container declaration.
//!
//! Every container operation that can fail on bad configuration logs a
//! warning and returns `false`/`None` rather than propagating a `Result`:
//! a malformed configuration is an operator error to be noticed in the
//! log, not a condition the caller branches on. [`ConfigError`] exists so
//! the decode helpers in [`crate::config`] have something precise to log.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration did not decode to a JSON object")]
    NotAnObject,
}

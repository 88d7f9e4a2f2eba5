//! A FIFO admission gate for async work, with a concurrency limit that adapts to observed latency.
//!
//! Fast executions raise the limit by one, slow (or failed) executions lower it by one, down to a
//! floor. Executions in between leave it alone.

#![deny(missing_docs)]

#[cfg(doctest)]
use doc_comment::doctest;
#[cfg(doctest)]
doctest!("../README.md");

pub mod controller;
pub mod executor;
pub mod limits;
pub mod options;

pub use controller::{Controller, ControllerState};
pub use executor::Executor;
pub use options::{ConfigError, Options};

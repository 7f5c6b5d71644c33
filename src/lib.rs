//! Argo acceptance-test harness
//!
//! Declarative test scenarios for Argo Workflows: submit a manifest, wait
//! for the workflow to finish, then assert on its phase, duration, step
//! phases and step logs.

pub mod cli;
pub mod commands;
pub mod common;
pub mod testing;
pub mod workflow;

pub use common::{Error, Result};

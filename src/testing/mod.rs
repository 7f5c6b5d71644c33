//! Scenario-driven acceptance testing
//!
//! Loads YAML test scenarios, runs each one against the cluster, and
//! checks the finished workflow against the scenario's expectations.

mod config;
pub mod duration;
mod evaluator;
mod loader;
mod runner;

pub use config::*;
pub use evaluator::ExpectationEvaluator;
pub use loader::{filter_scenarios, load_manifest, load_scenario_file, load_scenarios, validate};
pub use runner::{RunSummary, ScenarioResult, ScenarioRunner};

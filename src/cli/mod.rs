//! CLI command handling
//!
//! Loads and filters scenarios, connects to the cluster, runs everything and
//! prints the summary.

use colored::Colorize;

use crate::commands::RunArgs;
use crate::common::config::Config;
use crate::common::Result;
use crate::testing::{filter_scenarios, load_scenarios, RunSummary, ScenarioRunner, TestScenario};
use crate::workflow::{KubeClient, NodeTreeResolver, PollingWatcher};

/// Run the selected scenarios
///
/// Returns `Ok(true)` when at least one scenario was selected and every
/// selected scenario passed.
pub async fn dispatch(args: RunArgs) -> Result<bool> {
    let config = Config::load(args.config.as_deref())?;
    let dir = args.dir.clone().unwrap_or_else(|| config.defaults.dir.clone());

    let scenarios = load_scenarios(&dir)?;
    let scenarios = filter_scenarios(scenarios, &args.tags, args.name.as_deref());

    if scenarios.is_empty() {
        println!("{}", "No scenarios matched filters".yellow());
        return Ok(false);
    }

    if args.list {
        print_scenarios(&scenarios);
        return Ok(true);
    }

    let client = KubeClient::from_config(&config.cluster, config.workflows.clone())?;
    let watcher = PollingWatcher::new(config.polling.interval())
        .with_max_consecutive_failures(config.polling.max_consecutive_fetch_failures);

    let runner = ScenarioRunner::new(&client, &client)
        .with_watcher(watcher)
        .with_resolver(NodeTreeResolver::from_naming(config.pods.naming))
        .with_cleanup(args.cleanup);

    let summary = runner.run_all(&scenarios).await;
    print_summary(&summary);

    Ok(summary.all_passed())
}

fn print_scenarios(scenarios: &[TestScenario]) {
    println!("{}", "Scenarios:".cyan());
    for s in scenarios {
        let tags: Vec<&str> = s.tags.iter().map(String::as_str).collect();
        println!(
            "  {:24} {}  tags={:?} ns={} timeout={}s",
            s.file_name(),
            s.name.white().bold(),
            tags,
            s.namespace,
            s.timeout_secs
        );
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n{}", "=== SUMMARY ===".bold());
    println!("passed: {}", summary.passed_count().to_string().green());
    let failed = summary.failed_count();
    if failed > 0 {
        println!("failed: {}", failed.to_string().red());
        for failure in summary.failures() {
            println!("  {} {} ({})", "✗".red(), failure.name, failure.file.dimmed());
        }
    } else {
        println!("failed: {}", failed);
    }
    println!("time: {:.1}s", summary.duration.as_secs_f64());
}

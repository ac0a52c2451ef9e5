//! Build commands — `ralph run` and `ralph resume`.

use anyhow::{Result, bail};
use console::style;
use std::path::Path;

use ralph::bridge::CommunicationBridge;
use ralph::budget::BudgetGuardian;
use ralph::config::Config;
use ralph::orchestrator::{
    FailureReason, OrchestratorSettings, PhaseOrchestrator, RunReport, StateStore,
};
use ralph::ui::icons::{CHECK, CROSS, FOLDER, MONEY, PAUSE, STOP};

fn open_services(config: &Config) -> Result<(BudgetGuardian, CommunicationBridge)> {
    config.ensure_directories()?;
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }
    let guardian = BudgetGuardian::open(&config.ledger_file, config.daily_limit)?;
    let bridge = CommunicationBridge::from_config(config)?;
    Ok((guardian, bridge))
}

pub async fn cmd_run(config: &Config, project: &str, idea: &str) -> Result<()> {
    let build_dir = config.build_dir_for(project, chrono::Local::now().date_naive());
    let (guardian, bridge) = open_services(config)?;

    println!();
    println!("{}", style(format!("Ralph build: {}", project)).bold());
    println!("{}{}", FOLDER, build_dir.display());
    println!(
        "Budget: {} per day, replies time out after {} minutes",
        config.daily_limit,
        config.reply_timeout_minutes()
    );
    println!();

    let mut orchestrator = PhaseOrchestrator::new(
        OrchestratorSettings::from(config),
        &build_dir,
        project,
        idea,
        guardian,
        bridge,
    )?;
    let report = orchestrator.run().await;
    finish(&report)
}

pub async fn cmd_resume(config: &Config, build_dir: &Path, continue_paused: bool) -> Result<()> {
    if !StateStore::new(build_dir).exists() {
        bail!(
            "No build state found in {}. Start a build with 'ralph run'.",
            build_dir.display()
        );
    }
    let (guardian, bridge) = open_services(config)?;
    let mut orchestrator = PhaseOrchestrator::open(
        OrchestratorSettings::from(config),
        build_dir,
        guardian,
        bridge,
    )?;

    println!();
    println!(
        "{}",
        style(format!(
            "Resuming {} from {}",
            orchestrator.state().project_name,
            orchestrator.state().phase
        ))
        .bold()
    );
    println!();

    let report = orchestrator.resume(continue_paused).await;
    finish(&report)
}

fn finish(report: &RunReport) -> Result<()> {
    print_report(report);
    if report.reason == Some(FailureReason::Error) {
        bail!(
            "Build failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    match report.reason {
        None => println!("{}{}", CHECK, style("Build complete").green().bold()),
        Some(FailureReason::Incomplete) => {
            println!("{}{}", STOP, style("Build stopped before completion").yellow().bold())
        }
        Some(FailureReason::BudgetExceeded) => {
            println!("{}{}", PAUSE, style("Build paused: budget limit reached").yellow().bold())
        }
        Some(FailureReason::Paused) => {
            println!("{}{}", PAUSE, style("Build paused").yellow().bold())
        }
        Some(FailureReason::Error) => println!("{}{}", CROSS, style("Build failed").red().bold()),
    }
    println!("  Phase:       {}", report.phase);
    println!("  Iterations:  {}", report.iterations);
    println!("  {}Total cost: {}", MONEY, report.total_cost);
    println!("  Build dir:   {}", report.build_dir.display());
    if let Some(path) = &report.final_path {
        println!("  Final:       {}", path.display());
    }
    if let Some(error) = &report.error {
        println!("  Detail:      {}", style(error).dim());
    }
    if matches!(
        report.reason,
        Some(FailureReason::Paused | FailureReason::BudgetExceeded)
    ) {
        println!();
        println!(
            "Continue with: ralph resume {} --continue",
            report.build_dir.display()
        );
    } else if report.reason == Some(FailureReason::Incomplete) {
        println!();
        println!("Resume with: ralph resume {}", report.build_dir.display());
    }
    println!();
}

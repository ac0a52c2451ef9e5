//! Offline inspection commands — `ralph status` and `ralph budget`.

use anyhow::Result;
use console::style;
use std::path::Path;

use ralph::budget::BudgetGuardian;
use ralph::builder::ITERATION_COST;
use ralph::config::Config;
use ralph::orchestrator::{BuildPhase, StateStore};
use ralph::ui::icons::{CHECK, CROSS, HAMMER, MONEY, PAUSE, WARN};

pub fn cmd_status(build_dir: &Path, json: bool) -> Result<()> {
    let state = StateStore::new(build_dir).load()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
        return Ok(());
    }

    let phase = match state.phase {
        BuildPhase::Done => format!("{}{}", CHECK, style(state.phase).green()),
        BuildPhase::Failed => format!("{}{}", CROSS, style(state.phase).red()),
        BuildPhase::Paused => format!("{}{}", PAUSE, style(state.phase).yellow()),
        phase => format!("{}{}", HAMMER, style(phase).cyan()),
    };

    println!();
    println!("{}", style(format!("Build: {}", state.project_name)).bold());
    println!("  Idea:        {}", state.source_idea);
    println!("  Phase:       {}", phase);
    println!(
        "  Started:     {}",
        state.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  Updated:     {}",
        state.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Questions:   {} answered", state.qa_pairs.len());
    println!(
        "  Plan:        {} ({} revisions)",
        if state.approved_plan.is_empty() {
            "not approved"
        } else {
            "approved"
        },
        state.plan_revisions
    );
    println!("  Iteration:   {}", state.current_iteration);
    println!("  {}Total cost: {}", MONEY, state.total_cost);
    if let Some(reason) = &state.pause_reason {
        let from = state
            .paused_from
            .map(|p| format!(" (from {})", p))
            .unwrap_or_default();
        println!("  {}Paused:    {}{}", WARN, reason, from);
    }
    if let Some(error) = &state.error {
        println!("  {}Error:     {}", CROSS, style(error).red());
    }

    if !state.iterations.is_empty() {
        println!();
        println!("{:<6} {:<8} {:<8} Summary", "Iter", "Tests", "Cost");
        println!("{:<6} {:<8} {:<8} -------", "----", "-----", "----");
        for outcome in &state.iterations {
            println!(
                "{:<6} {:<8} {:<8} {}",
                outcome.iteration_num,
                if outcome.tests_passed { "passed" } else { "failed" },
                outcome.cost.to_string(),
                outcome.summary
            );
        }
    }
    println!();
    Ok(())
}

pub fn cmd_budget(config: &Config, json: bool) -> Result<()> {
    let guardian = BudgetGuardian::open(&config.ledger_file, config.daily_limit)?;
    let summary = guardian.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!(
        "{}",
        style(format!("{}Budget for {}", MONEY, summary.date)).bold()
    );
    println!("  Limit:       {}", summary.limit);
    println!("  Spent:       {}", summary.spent);
    println!("  Remaining:   {}", summary.remaining);
    println!("  Operations:  {}", summary.operations_count);
    println!(
        "  Iterations left at {}: {}",
        ITERATION_COST,
        guardian.estimate_remaining_iterations(ITERATION_COST)
    );
    if !summary.by_phase.is_empty() {
        println!();
        println!("  By phase:");
        for (phase, cost) in &summary.by_phase {
            println!("    {:<12} {}", phase, cost);
        }
    }
    println!();
    Ok(())
}

//! Configuration view and validation commands — `ralph config`.

use anyhow::Result;
use console::style;
use std::path::Path;

use super::super::ConfigCommands;
use ralph::config::Config;
use ralph::ralph_config::{BOT_TOKEN_ENV, CHAT_ID_ENV, RalphToml, resolve_config_path};
use ralph::ui::icons::{CHECK, WARN};

pub fn cmd_config(explicit: Option<&Path>, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = resolve_config_path(explicit);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Ralph Configuration");
            println!("===================");
            println!();

            let toml = if config_path.exists() {
                println!("Config file: {}", config_path.display());
                RalphToml::load(&config_path)?
            } else {
                println!("No ralph.toml found at {}", config_path.display());
                println!("Using default configuration.");
                RalphToml::default()
            };
            println!();

            println!("build_directory = \"{}\"", toml.build_directory.display());
            println!("max_daily_cost = {}", toml.max_daily_cost);
            println!("max_iterations = {}", toml.max_iterations);
            if let Some(ledger) = &toml.ledger_file {
                println!("ledger_file = \"{}\"", ledger.display());
            }
            println!();
            println!("[phases.interview]");
            println!("  max_questions = {}", toml.phases.interview.max_questions);
            println!("[phases.planning]");
            println!("  max_revisions = {}", toml.phases.planning.max_revisions);
            println!();
            println!("[telegram]");
            println!("  api_base = \"{}\"", toml.telegram.api_base);
            println!(
                "  reply_timeout_minutes = {}",
                toml.telegram.reply_timeout_minutes
            );
            println!("  poll_interval_secs = {}", toml.telegram.poll_interval_secs);
            println!();

            // Effective values include environment overrides.
            let config = Config::from_toml(
                toml,
                std::env::var(BOT_TOKEN_ENV).ok(),
                std::env::var(CHAT_ID_ENV).ok(),
            );
            println!("Effective values (with env overrides):");
            println!("  build root = {}", config.build_root.display());
            println!("  ledger     = {}", config.ledger_file.display());
            println!("  daily limit = {}", config.daily_limit);
            match &config.credentials {
                Some(creds) => println!("  chat id    = {}", creds.chat_id),
                None => println!("  chat       = {}", style("not configured").yellow()),
            }
            println!();
            if !config_path.exists() {
                println!("Run 'ralph config init' to create a ralph.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let toml = if config_path.exists() {
                RalphToml::load(&config_path)?
            } else {
                println!("No ralph.toml found. Using defaults.");
                RalphToml::default()
            };
            let config = Config::from_toml(
                toml,
                std::env::var(BOT_TOKEN_ENV).ok(),
                std::env::var(CHAT_ID_ENV).ok(),
            );
            let warnings = config.warnings();

            if warnings.is_empty() {
                println!("{}Configuration is valid.", CHECK);
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  {}{}", WARN, warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("ralph.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            RalphToml::default().save(&config_path)?;

            println!("Created ralph.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - build_directory, max_daily_cost, max_iterations");
            println!("  - [phases.interview] max_questions, [phases.planning] max_revisions");
            println!(
                "  - [telegram] settings (credentials via {} / {})",
                BOT_TOKEN_ENV, CHAT_ID_ENV
            );
            println!();
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ralph::config::Config;

mod cmd;

#[derive(Parser)]
#[command(name = "ralph")]
#[command(version, about = "Human-in-the-loop build orchestrator with chat checkpoints")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to ralph.toml. Defaults to $RALPH_CONFIG, then the user config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a build: interview, plan approval, then checkpointed iterations
    Run {
        /// Project name (used for the build directory)
        project: String,
        /// One-line description of what to build
        #[arg(required = true, num_args = 1..)]
        idea: Vec<String>,
    },
    /// Resume a build from its saved state
    Resume {
        /// Build directory containing BUILD_STATE.json
        build_dir: PathBuf,
        /// Continue a paused build into the phase it paused in
        #[arg(long = "continue")]
        continue_paused: bool,
    },
    /// Show the saved state of a build
    Status {
        build_dir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show today's spend against the daily limit
    Budget {
        #[arg(long)]
        json: bool,
    },
    /// Show the interview questions an idea would get
    Questions {
        #[arg(required = true, num_args = 1..)]
        idea: Vec<String>,
        /// Maximum number of questions
        #[arg(short, long)]
        max: Option<usize>,
    },
    /// Classify an operator reply
    Parse {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Send a one-off message to the configured chat
    Notify {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// View, validate or create the configuration file
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default ralph.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ralph=debug" } else { "ralph=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let load_config = || Config::load(cli.config.as_deref(), cli.verbose);

    match &cli.command {
        Commands::Run { project, idea } => {
            cmd::cmd_run(&load_config()?, project, &idea.join(" ")).await?;
        }
        Commands::Resume {
            build_dir,
            continue_paused,
        } => {
            cmd::cmd_resume(&load_config()?, build_dir, *continue_paused).await?;
        }
        Commands::Status { build_dir, json } => cmd::cmd_status(build_dir, *json)?,
        Commands::Budget { json } => cmd::cmd_budget(&load_config()?, *json)?,
        Commands::Questions { idea, max } => cmd::cmd_questions(&idea.join(" "), *max)?,
        Commands::Parse { text, json } => cmd::cmd_parse(&text.join(" "), *json)?,
        Commands::Notify { text } => {
            cmd::cmd_notify(&load_config()?, &text.join(" ")).await?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(cli.config.as_deref(), command.clone())?;
        }
    }

    Ok(())
}

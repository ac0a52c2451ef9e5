pub mod bridge;
pub mod budget;
pub mod builder;
pub mod config;
pub mod errors;
pub mod interview;
pub mod journal;
pub mod money;
pub mod orchestrator;
pub mod planner;
pub mod ralph_config;
pub mod ui;
pub mod util;

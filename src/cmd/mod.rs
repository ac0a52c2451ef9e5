//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled                   |
//! |----------|------------------------------------|
//! | `run`    | `Run`, `Resume`                    |
//! | `status` | `Status`, `Budget`                 |
//! | `tools`  | `Questions`, `Parse`, `Notify`     |
//! | `config` | `Config`                           |

pub mod config;
pub mod run;
pub mod status;
pub mod tools;

pub use config::cmd_config;
pub use run::{cmd_resume, cmd_run};
pub use status::{cmd_budget, cmd_status};
pub use tools::{cmd_notify, cmd_parse, cmd_questions};

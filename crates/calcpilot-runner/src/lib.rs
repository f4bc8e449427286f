//! # calcpilot-runner
//!
//! Script-based calculator automation. Write steps in YAML, run them against
//! a real calculator window.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use calcpilot_runner::{Runner, Script};
//!
//! # #[tokio::main]
//! # async fn main() -> calcpilot_runner::Result<()> {
//! let script = Script::load("scripts/square_of_sum.yaml")?;
//! let mut runner = Runner::xdotool(&script)?;
//! let result = runner.run(&script).await;
//! println!("Success: {}", result.success);
//! # Ok(())
//! # }
//! ```

mod runner;
mod script;

pub use runner::{RunResult, Runner};
pub use script::{LogStep, OnFailure, ParamDef, Params, RetryConfig, Script, Step, WaitStep};

/// Result type for calcpilot-runner operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during script loading or execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Agent(#[from] calcpilot_agent::Error),

    #[error("step failed: {0}")]
    StepFailed(String),
}

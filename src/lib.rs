//! # calcpilot
//!
//! Desktop calculator automation for AI agents. Natural-language arithmetic
//! is turned into button clicks on a real calculator window, resolved
//! against a pre-captured interface map. Use the library directly or run the
//! `calcpilot` binary as an MCP server over stdio.
//!
//! ```rust,no_run
//! use calcpilot::{Session, SessionConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> calcpilot::Result<()> {
//! let mut session = Session::xdotool(SessionConfig::from_env()?)?;
//! let report = session.execute("multiply 12 by 7").await;
//! assert!(report.success);
//! # Ok(())
//! # }
//! ```

pub mod mcp;

pub use calcpilot_agent::*;

//! # calcpilot-agent
//!
//! Drives a desktop calculator purely through clicks. Free-text arithmetic is
//! parsed into a token sequence, each token is resolved against a pre-captured
//! interface map, and the click lands on the one true calculator window.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use calcpilot_agent::{Session, SessionConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> calcpilot_agent::Result<()> {
//! let config = SessionConfig::load("calcpilot.yaml")?;
//! let mut session = Session::xdotool(config)?;
//!
//! session.ensure_open().await?;
//! let report = session.execute("Add 2 and 3 and then find the square of the result").await;
//! println!("{}", report.sequence);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod executor;
pub mod interface_map;
pub mod parser;
pub mod resolver;
pub mod session;
pub mod settle;
pub mod token;
pub mod window;
pub mod xdotool;

pub use backend::{DesktopBackend, Launcher, WindowInfo};
pub use config::{AppConfig, InterfaceMapConfig, PolicyConfig, SessionConfig, TimingConfig};
pub use executor::{ActionExecutor, ClickPoint, Outcome, StepError};
pub use interface_map::{BBox, InterfaceMap, NodeRecord, StateMap};
pub use parser::InstructionParser;
pub use resolver::ElementResolver;
pub use session::{ButtonInfo, InstructionReport, OpenReport, Session};
pub use token::{ButtonSequence, Operator, Token};
pub use window::{TargetPredicate, TrackerState, WindowHandle, WindowTracker};
pub use xdotool::{ProcessLauncher, XdotoolBackend};

use serde::Serialize;

/// Result type for calcpilot-agent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of a failed step, as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The instruction produced an empty or partial plan.
    ParseAmbiguity,
    /// No interface element matches the token.
    ElementNotFound,
    /// The target window could not be located, even after re-resolution.
    WindowNotFound,
    /// The node's bounding box is missing or has the wrong arity.
    MalformedNode,
    /// The click primitive reported failure.
    ClickFailure,
    /// A bounded backend call ran out of time.
    Timeout,
    /// The backend or launcher reported an error.
    Backend,
}

impl FailureKind {
    /// Whether this failure invalidates the rest of the current instruction.
    pub fn is_fatal(self) -> bool {
        matches!(self, FailureKind::WindowNotFound)
    }
}

/// Errors that can occur while loading inputs or driving the target window.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("interface map error: {0}")]
    Map(String),

    #[error("json parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("button '{0}' not found in interface map")]
    ElementNotFound(String),

    #[error("window not found: {0}")]
    WindowNotFound(String),

    #[error("invalid bbox for {node_id}: expected 4 values, got {len}")]
    MalformedNode { node_id: String, len: usize },

    #[error("click at ({x}, {y}) failed")]
    ClickFailed { x: i32, y: i32 },

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("launch failed: {0}")]
    Launch(String),
}

impl Error {
    /// Map an error onto the step failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::ElementNotFound(_) => FailureKind::ElementNotFound,
            Error::WindowNotFound(_) => FailureKind::WindowNotFound,
            Error::MalformedNode { .. } => FailureKind::MalformedNode,
            Error::ClickFailed { .. } => FailureKind::ClickFailure,
            Error::Timeout(_) => FailureKind::Timeout,
            Error::Map(_) => FailureKind::MalformedNode,
            Error::Config(_)
            | Error::Json(_)
            | Error::Yaml(_)
            | Error::Io(_)
            | Error::Backend(_)
            | Error::Launch(_) => FailureKind::Backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kinds() {
        assert_eq!(
            Error::ElementNotFound("+".into()).kind(),
            FailureKind::ElementNotFound
        );
        assert_eq!(
            Error::MalformedNode {
                node_id: "n1".into(),
                len: 3
            }
            .kind(),
            FailureKind::MalformedNode
        );
        assert_eq!(Error::ClickFailed { x: 1, y: 2 }.kind(), FailureKind::ClickFailure);
        assert_eq!(Error::Launch("boom".into()).kind(), FailureKind::Backend);
    }

    #[test]
    fn only_window_not_found_is_fatal() {
        assert!(FailureKind::WindowNotFound.is_fatal());
        assert!(!FailureKind::ElementNotFound.is_fatal());
        assert!(!FailureKind::MalformedNode.is_fatal());
        assert!(!FailureKind::ClickFailure.is_fatal());
        assert!(!FailureKind::Timeout.is_fatal());
    }

    #[test]
    fn malformed_node_message() {
        let e = Error::MalformedNode {
            node_id: "icon_7".into(),
            len: 2,
        };
        assert_eq!(
            e.to_string(),
            "invalid bbox for icon_7: expected 4 values, got 2"
        );
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::WindowNotFound).unwrap();
        assert_eq!(json, "\"window_not_found\"");
    }
}

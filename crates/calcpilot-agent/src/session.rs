//! The per-run owner of map, tracker and backends.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::backend::{DesktopBackend, Launcher};
use crate::config::SessionConfig;
use crate::executor::{ActionExecutor, Outcome};
use crate::interface_map::{InterfaceMap, StateMap};
use crate::parser::InstructionParser;
use crate::token::{ButtonSequence, Operator, Token};
use crate::window::{TargetPredicate, WindowHandle, WindowTracker};
use crate::xdotool::{ProcessLauncher, XdotoolBackend};
use crate::Result;

/// Result of bringing the application up.
#[derive(Debug, Clone, Serialize)]
pub struct OpenReport {
    pub window: WindowHandle,
    /// False when an existing window was reused.
    pub launched: bool,
}

/// Result of one free-text instruction.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionReport {
    pub instruction: String,
    pub sequence: ButtonSequence,
    pub steps: Vec<Outcome>,
    pub success: bool,
    /// Stopped before the last token.
    pub aborted: bool,
    /// Tokens never attempted.
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl InstructionReport {
    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.steps.iter().filter(|s| !s.success)
    }
}

/// One node of the active state, with the tokens that resolve to it.
#[derive(Debug, Clone, Serialize)]
pub struct ButtonInfo {
    pub id: String,
    pub label: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<(i32, i32)>,
    pub tokens: Vec<Token>,
}

/// Every token the parser can emit, in display order.
const ALL_TOKENS: [Token; 17] = [
    Token::Digit(0),
    Token::Digit(1),
    Token::Digit(2),
    Token::Digit(3),
    Token::Digit(4),
    Token::Digit(5),
    Token::Digit(6),
    Token::Digit(7),
    Token::Digit(8),
    Token::Digit(9),
    Token::Op(Operator::Add),
    Token::Op(Operator::Subtract),
    Token::Op(Operator::Multiply),
    Token::Op(Operator::Divide),
    Token::Equals,
    Token::Square,
    Token::SquareRoot,
];

/// A calculator automation session.
///
/// Calls are strictly sequential; wrap in a mutex to share.
pub struct Session {
    config: SessionConfig,
    state: StateMap,
    parser: InstructionParser,
    executor: ActionExecutor,
    tracker: WindowTracker,
    cancel: Arc<AtomicBool>,
}

impl Session {
    /// Build a session over explicit backends.
    pub fn new(
        config: SessionConfig,
        map: InterfaceMap,
        backend: Arc<dyn DesktopBackend>,
        launcher: Arc<dyn Launcher>,
    ) -> Result<Self> {
        config.validate()?;
        let state = map.state(&config.interface_map.state)?.clone();
        if state.is_empty() {
            warn!("state '{}' has no nodes", config.interface_map.state);
        }
        let tracker = WindowTracker::new(
            backend.clone(),
            TargetPredicate::from_config(&config.app),
            config.timing.clone(),
        );
        let executor = ActionExecutor::new(backend, launcher, config.app.clone(), config.timing.clone());
        Ok(Self {
            config,
            state,
            parser: InstructionParser::new(),
            executor,
            tracker,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Session on the local X display via `xdotool`, map loaded from config.
    pub fn xdotool(config: SessionConfig) -> Result<Self> {
        let map = InterfaceMap::load(&config.interface_map.path)?;
        let backend = Arc::new(XdotoolBackend::new(
            config.app.display.clone(),
            config.timing.call_timeout(),
        )?);
        let launcher = Arc::new(ProcessLauncher::new(
            backend.clone(),
            TargetPredicate::from_config(&config.app),
            config.timing.clone(),
        ));
        Self::new(config, map, backend, launcher)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The interface map state clicks resolve against.
    pub fn state(&self) -> &StateMap {
        &self.state
    }

    /// The tracked window, if currently resolved.
    pub fn window(&self) -> Option<&WindowHandle> {
        self.tracker.handle()
    }

    /// Flag checked between tokens. Setting it stops the running instruction,
    /// or the next one if none is running.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Parse only. Nothing is clicked.
    pub fn plan(&self, instruction: &str) -> ButtonSequence {
        self.parser.parse(instruction)
    }

    /// Inventory of the active state in document order.
    pub fn buttons(&self) -> Vec<ButtonInfo> {
        let resolver = self.executor.resolver();
        self.state
            .iter()
            .map(|(id, node)| ButtonInfo {
                id: id.to_string(),
                label: node.icon_name.clone(),
                description: node.brief.clone(),
                center: node.bbox(id).ok().map(|b| b.center()),
                tokens: ALL_TOKENS
                    .iter()
                    .copied()
                    .filter(|t| resolver.find(*t, &self.state) == Some(id))
                    .collect(),
            })
            .collect()
    }

    /// Find the application window or launch it. Never relaunches when a
    /// matching window already exists.
    pub async fn ensure_open(&mut self) -> Result<OpenReport> {
        let (_, launched) = self.executor.ensure_window(&mut self.tracker).await?;
        let window = self.tracker.ensure_focused().await?;
        if launched {
            info!("opened {} as window {}", self.config.app.name, window.id);
        } else {
            info!("reusing window {} \"{}\"", window.id, window.title);
        }
        Ok(OpenReport { window, launched })
    }

    /// Parse an instruction and click through its tokens.
    ///
    /// The cancel flag is honoured before every token, including the first,
    /// and cleared when the instruction returns.
    pub async fn execute(&mut self, instruction: &str) -> InstructionReport {
        let report = self.run_instruction(instruction).await;
        self.cancel.store(false, Ordering::SeqCst);
        report
    }

    async fn run_instruction(&mut self, instruction: &str) -> InstructionReport {
        let sequence = self.parser.parse(instruction);
        info!("\"{}\" → {}", instruction.trim(), sequence);

        let mut report = InstructionReport {
            instruction: instruction.to_string(),
            sequence: sequence.clone(),
            steps: Vec::with_capacity(sequence.len()),
            success: true,
            aborted: false,
            skipped: 0,
            warning: None,
        };

        if sequence.is_empty() {
            warn!("no operation recognized in \"{}\"", instruction.trim());
            report.warning = Some("no calculator operation recognized; nothing to do".into());
            return report;
        }

        for (i, token) in sequence.tokens().iter().copied().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                report.aborted = true;
                report.warning = Some("cancelled".into());
                break;
            }
            if i > 0 {
                sleep(self.config.timing.step_delay()).await;
            }

            let outcome = self.executor.execute(&mut self.tracker, &self.state, token).await;
            let failed = !outcome.success;
            let fatal = outcome.is_fatal();
            report.steps.push(outcome);

            if fatal {
                report.aborted = true;
                report.warning = Some("target window lost; reopen the application and retry".into());
                break;
            }
            if failed && self.config.policy.stop_on_failure {
                report.aborted = true;
                break;
            }
        }

        report.skipped = sequence.len() - report.steps.len();
        report.success = !report.aborted && report.steps.iter().all(|s| s.success);
        info!(
            "instruction done: {}/{} clicked{}",
            report.steps.iter().filter(|s| s.success).count(),
            sequence.len(),
            if report.aborted { ", aborted" } else { "" }
        );
        report
    }

    /// Click a single token directly.
    pub async fn click(&mut self, token: Token) -> Outcome {
        self.executor.execute(&mut self.tracker, &self.state, token).await
    }
}

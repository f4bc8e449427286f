use crate::script::{Script, Step};
use crate::{Error, Result};
use calcpilot_agent::{InstructionReport, Session, Token};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of running a script.
#[derive(Debug)]
pub struct RunResult {
    pub success: bool,
    pub error: Option<String>,
    /// Steps completed in the last attempt.
    pub steps_executed: usize,
    /// Buttons clicked in the last attempt.
    pub clicks: usize,
    pub duration_ms: u64,
    pub retries: u32,
    /// Instruction reports from the last attempt.
    pub reports: Vec<InstructionReport>,
}

#[derive(Default)]
struct Attempt {
    steps_executed: usize,
    clicks: usize,
    reports: Vec<InstructionReport>,
}

/// Executes scripts against one session.
pub struct Runner {
    session: Session,
}

impl Runner {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    /// Runner on the local X display using the script's session settings.
    pub fn xdotool(script: &Script) -> Result<Self> {
        Ok(Self::new(Session::xdotool(script.session.clone())?))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run the script, retrying the whole step list on failure.
    ///
    /// Clicks cannot be undone: a retry types on top of whatever the failed
    /// attempt left on the calculator display.
    pub async fn run(&mut self, script: &Script) -> RunResult {
        let start = Instant::now();
        let (max_attempts, delay_ms) = script.retry_policy();
        let mut retries = 0;
        let mut last = Attempt::default();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                retries += 1;
                info!("Retry attempt {}/{}", attempt, max_attempts);
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }

            let mut progress = Attempt::default();
            match self.run_once(script, &mut progress).await {
                Ok(()) => {
                    return RunResult {
                        success: true,
                        error: None,
                        steps_executed: progress.steps_executed,
                        clicks: progress.clicks,
                        duration_ms: start.elapsed().as_millis() as u64,
                        retries,
                        reports: progress.reports,
                    };
                }
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt, e);
                    last_error = Some(e.to_string());
                    last = progress;
                }
            }
        }

        RunResult {
            success: false,
            error: last_error,
            steps_executed: last.steps_executed,
            clicks: last.clicks,
            duration_ms: start.elapsed().as_millis() as u64,
            retries,
            reports: last.reports,
        }
    }

    async fn run_once(&mut self, script: &Script, progress: &mut Attempt) -> Result<()> {
        for (i, step) in script.steps.iter().enumerate() {
            debug!("Step {}: {}", i + 1, step);
            if let Err(e) = self.run_step(step, progress).await {
                warn!("Step {} ({}) failed", i + 1, step.name());
                return Err(e);
            }
            progress.steps_executed += 1;
        }
        Ok(())
    }

    async fn run_step(&mut self, step: &Step, progress: &mut Attempt) -> Result<()> {
        match step {
            Step::Open => {
                let open = self.session.ensure_open().await?;
                info!(
                    "Calculator window {} ({})",
                    open.window.id,
                    if open.launched { "launched" } else { "reused" }
                );
            }
            Step::Instruction(text) => {
                let report = self.session.execute(text).await;
                progress.clicks += report.steps.iter().filter(|s| s.success).count();
                let failed = !report.success;
                let summary = report
                    .failures()
                    .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {}", o.token, e.message)))
                    .collect::<Vec<_>>()
                    .join("; ");
                let warning = report.warning.clone();
                progress.reports.push(report);
                if failed {
                    let detail = if summary.is_empty() {
                        warning.unwrap_or_default()
                    } else {
                        summary
                    };
                    return Err(Error::StepFailed(format!("\"{}\": {}", text, detail)));
                }
                if let Some(w) = warning {
                    warn!("\"{}\": {}", text, w);
                }
            }
            Step::Click(button) => {
                let token: Token = button.parse()?;
                let outcome = self.session.click(token).await;
                match outcome.error {
                    None => progress.clicks += 1,
                    Some(e) => {
                        return Err(Error::StepFailed(format!("click '{}': {}", button, e.message)))
                    }
                }
            }
            Step::Wait(w) => {
                tokio::time::sleep(Duration::from_millis(w.ms)).await;
            }
            Step::Log(l) => {
                info!("{}", l.message);
            }
        }
        Ok(())
    }
}

//! X11 backend on top of the `xdotool` CLI.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::backend::{DesktopBackend, Launcher, WindowInfo};
use crate::config::TimingConfig;
use crate::settle::{bounded, until_some};
use crate::window::TargetPredicate;
use crate::{Error, Result};

const XDOTOOL: &str = "xdotool";

pub struct XdotoolBackend {
    display: Option<String>,
    timeout: Duration,
}

impl XdotoolBackend {
    /// Fails if `xdotool` is not on `PATH`.
    pub fn new(display: Option<String>, timeout: Duration) -> Result<Self> {
        which::which(XDOTOOL).map_err(|_| {
            Error::Backend("xdotool not found. Install it (e.g., apt-get install xdotool).".into())
        })?;
        Ok(Self { display, timeout })
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        let mut cmd = Command::new(XDOTOOL);
        cmd.args(args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(ref d) = self.display {
            cmd.env("DISPLAY", d);
        }
        let what = format!("xdotool {}", args.first().copied().unwrap_or_default());
        bounded(&what, self.timeout, async {
            cmd.output()
                .await
                .map_err(|e| Error::Backend(format!("failed to run {}: {}", what, e)))
        })
        .await
    }

    /// stdout of a successful run, `None` on a non-zero exit.
    async fn query(&self, args: &[&str]) -> Result<Option<String>> {
        let out = self.run(args).await?;
        if out.status.success() {
            Ok(Some(String::from_utf8_lossy(&out.stdout).trim().to_string()))
        } else {
            debug!(
                "xdotool {:?} exited {}: {}",
                args,
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            );
            Ok(None)
        }
    }

    async fn checked(&self, args: &[&str]) -> Result<bool> {
        Ok(self.run(args).await?.status.success())
    }
}

#[async_trait]
impl DesktopBackend for XdotoolBackend {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        // Exit status 1 just means nothing matched.
        let ids = self
            .query(&["search", "--onlyvisible", "--name", "."])
            .await?
            .unwrap_or_default();

        let mut windows = Vec::new();
        for id in ids.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some(title) = self.window_title(id).await? else {
                continue;
            };
            let Some((x, y)) = self.window_position(id).await? else {
                continue;
            };
            windows.push(WindowInfo {
                id: id.to_string(),
                title,
                x,
                y,
            });
        }
        debug!("{} visible windows", windows.len());
        Ok(windows)
    }

    async fn window_title(&self, id: &str) -> Result<Option<String>> {
        self.query(&["getwindowname", id]).await
    }

    async fn focus(&self, id: &str) -> Result<()> {
        if self.checked(&["windowactivate", "--sync", id]).await? {
            Ok(())
        } else {
            Err(Error::Backend(format!("xdotool windowactivate {} failed", id)))
        }
    }

    async fn window_position(&self, id: &str) -> Result<Option<(i32, i32)>> {
        match self.query(&["getwindowgeometry", "--shell", id]).await? {
            Some(shell) => parse_geometry(&shell).map(Some),
            None => Ok(None),
        }
    }

    async fn click(&self, x: i32, y: i32) -> Result<bool> {
        let (x, y) = (x.to_string(), y.to_string());
        if !self.checked(&["mousemove", "--sync", &x, &y]).await? {
            return Ok(false);
        }
        self.checked(&["click", "1"]).await
    }
}

/// Origin from `getwindowgeometry --shell` output (`X=..` / `Y=..` lines).
fn parse_geometry(shell: &str) -> Result<(i32, i32)> {
    let mut x = None;
    let mut y = None;
    for line in shell.lines() {
        if let Some(v) = line.trim().strip_prefix("X=") {
            x = v.parse().ok();
        }
        if let Some(v) = line.trim().strip_prefix("Y=") {
            y = v.parse().ok();
        }
    }
    match (x, y) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(Error::Backend(format!("unexpected geometry output: {:?}", shell))),
    }
}

/// Spawns the application and waits for its window to show up.
pub struct ProcessLauncher {
    backend: Arc<dyn DesktopBackend>,
    predicate: TargetPredicate,
    timing: TimingConfig,
}

impl ProcessLauncher {
    pub fn new(backend: Arc<dyn DesktopBackend>, predicate: TargetPredicate, timing: TimingConfig) -> Self {
        Self {
            backend,
            predicate,
            timing,
        }
    }
}

#[async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, command: &str, display: Option<&str>) -> Result<String> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| Error::Launch("empty launch command".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(d) = display {
            cmd.env("DISPLAY", d);
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Launch(format!("{}: {}", command, e)))?;
        info!("spawned {} (pid {:?})", command, child.id());

        // Reap the process whenever it exits; the window outlives this call.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        let backend = self.backend.clone();
        let predicate = &self.predicate;
        let call_timeout = self.timing.call_timeout();
        until_some(
            "application window",
            self.timing.poll_interval(),
            self.timing.launch_timeout(),
            || {
                let backend = backend.clone();
                async move {
                    let windows = bounded("list windows", call_timeout, backend.list_windows()).await?;
                    Ok(windows
                        .into_iter()
                        .find(|w| predicate.matches(&w.title))
                        .map(|w| w.id))
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_shell_output() {
        let out = "WINDOW=73400327\nX=812\nY=-4\nWIDTH=320\nHEIGHT=480\nSCREEN=0\n";
        assert_eq!(parse_geometry(out).unwrap(), (812, -4));
        assert!(parse_geometry("WINDOW=1\nWIDTH=3").is_err());
    }

    /// Needs a running X server with xdotool installed.
    #[tokio::test]
    #[ignore]
    async fn lists_windows_on_real_display() {
        let backend = XdotoolBackend::new(std::env::var("DISPLAY").ok(), Duration::from_secs(5)).unwrap();
        let windows = backend.list_windows().await.unwrap();
        for w in &windows {
            assert!(!w.id.is_empty());
        }
    }
}

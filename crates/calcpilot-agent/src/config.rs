use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Session configuration, loaded from YAML. Every field has a default.
///
/// ```yaml
/// app:
///   name: Calculator
///   launch: gnome-calculator
///   display: ":1"
/// interface_map:
///   path: apps/calc/fdom.json
/// timing:
///   click_settle_ms: 300
/// policy:
///   stop_on_failure: true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub app: AppConfig,
    pub interface_map: InterfaceMapConfig,
    pub timing: TimingConfig,
    pub policy: PolicyConfig,
}

impl SessionConfig {
    /// Load from a YAML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config: SessionConfig = serde_yaml::from_str(&content)?;
        config.apply_overrides(|k| std::env::var(k).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse from a YAML string. No environment overrides.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: SessionConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|k| std::env::var(k).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `CALCPILOT_MAP`, `CALCPILOT_APP` and `CALCPILOT_DISPLAY`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("CALCPILOT_MAP") {
            self.interface_map.path = PathBuf::from(path);
        }
        if let Some(name) = lookup("CALCPILOT_APP") {
            self.app.name = name;
        }
        if let Some(display) = lookup("CALCPILOT_DISPLAY") {
            self.app.display = Some(display);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.app.name.trim().is_empty() {
            return Err(Error::Config("app.name is required".into()));
        }
        if self.app.launch.trim().is_empty() {
            return Err(Error::Config("app.launch is required".into()));
        }
        if self.interface_map.state.is_empty() {
            return Err(Error::Config("interface_map.state is required".into()));
        }
        let t = &self.timing;
        for (name, v) in [
            ("timing.poll_interval_ms", t.poll_interval_ms),
            ("timing.call_timeout_ms", t.call_timeout_ms),
            ("timing.launch_timeout_ms", t.launch_timeout_ms),
        ] {
            if v == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }
        Ok(())
    }
}

/// The application under control.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Expected window title, or its prefix.
    pub name: String,
    /// Command used to start the application.
    pub launch: String,
    /// X display to launch on and click in. Inherits `DISPLAY` when unset.
    pub display: Option<String>,
    /// Windows whose titles contain any of these are never targeted.
    pub exclude_titles: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Calculator".into(),
            launch: "gnome-calculator".into(),
            display: None,
            exclude_titles: ["cursor", "code", "visual studio", "pycharm", "intellij"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InterfaceMapConfig {
    pub path: PathBuf,
    /// State to resolve against.
    pub state: String,
}

impl Default for InterfaceMapConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("apps/calc/fdom.json"),
            state: "root".into(),
        }
    }
}

/// Settle barriers and call bounds, in milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub focus_settle_ms: u64,
    pub click_settle_ms: u64,
    pub launch_settle_ms: u64,
    pub step_delay_ms: u64,
    pub poll_interval_ms: u64,
    pub call_timeout_ms: u64,
    pub launch_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            focus_settle_ms: 500,
            click_settle_ms: 500,
            launch_settle_ms: 2000,
            step_delay_ms: 300,
            poll_interval_ms: 50,
            call_timeout_ms: 5000,
            launch_timeout_ms: 15000,
        }
    }
}

impl TimingConfig {
    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }

    pub fn click_settle(&self) -> Duration {
        Duration::from_millis(self.click_settle_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    /// All waits zeroed except the bounds. For tests and scripted backends.
    pub fn immediate() -> Self {
        Self {
            focus_settle_ms: 0,
            click_settle_ms: 0,
            launch_settle_ms: 0,
            step_delay_ms: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Stop an instruction at its first failed token.
    pub stop_on_failure: bool,
}

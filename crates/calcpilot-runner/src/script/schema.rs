use super::params::{self, ParamDef, Params};
use super::Step;
use crate::{Error, Result};
use calcpilot_agent::{SessionConfig, Token};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// A calculator script.
#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub name: String,

    #[serde(default)]
    pub params: HashMap<String, ParamDef>,

    /// Session settings; anything omitted takes its default.
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub steps: Vec<Step>,

    pub on_failure: Option<OnFailure>,
}

impl Script {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_params(path, &Params::new())
    }

    pub fn load_with_params<P: AsRef<Path>>(path: P, params: &Params) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_with_params(&content, params)
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        Self::parse_with_params(yaml, &Params::new())
    }

    /// Parse with `${param}` substitution applied to every string first.
    pub fn parse_with_params(yaml: &str, params: &Params) -> Result<Self> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(yaml)?;

        let defs: HashMap<String, ParamDef> = value
            .get("params")
            .and_then(|v| serde_yaml::from_value(v.clone()).ok())
            .unwrap_or_default();

        params::substitute_value(&mut value, params, &defs)?;

        let script: Script = serde_yaml::from_value(value)?;
        script.validate()?;
        Ok(script)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Config("name is required".into()));
        }
        if self.steps.is_empty() {
            return Err(Error::Config("at least one step is required".into()));
        }
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                Step::Click(button) => {
                    button.parse::<Token>().map_err(|_| {
                        Error::Config(format!("step {}: unknown button '{}'", i + 1, button))
                    })?;
                }
                Step::Instruction(text) if text.trim().is_empty() => {
                    return Err(Error::Config(format!("step {}: empty instruction", i + 1)));
                }
                _ => {}
            }
        }
        if let Some(retry) = self.on_failure.as_ref().and_then(|f| f.retry.as_ref()) {
            if retry.attempts == 0 {
                return Err(Error::Config(
                    "on_failure.retry.attempts must be at least 1".into(),
                ));
            }
        }
        self.session.validate()?;
        Ok(())
    }

    /// Max attempts and the delay between them.
    pub fn retry_policy(&self) -> (u32, u64) {
        self.on_failure
            .as_ref()
            .and_then(|f| f.retry.as_ref())
            .map(|r| (r.attempts, r.delay_ms))
            .unwrap_or((1, 0))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnFailure {
    /// Re-run the whole step list. Nothing clears the display in between,
    /// so a retried instruction starts from the failed attempt's entry.
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub attempts: u32,
    #[serde(default)]
    pub delay_ms: u64,
}

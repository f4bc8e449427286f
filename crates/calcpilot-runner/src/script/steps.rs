use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// One step of a script.
#[derive(Debug, Clone)]
pub enum Step {
    /// Find or launch the calculator.
    Open,
    /// Free-text arithmetic, clicked token by token.
    Instruction(String),
    /// A single button, by name or glyph.
    Click(String),
    Wait(WaitStep),
    Log(LogStep),
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Open => "open",
            Step::Instruction(_) => "instruction",
            Step::Click(_) => "click",
            Step::Wait(_) => "wait",
            Step::Log(_) => "log",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Open => f.write_str("open"),
            Step::Instruction(text) => write!(f, "instruction \"{}\"", text),
            Step::Click(button) => write!(f, "click '{}'", button),
            Step::Wait(w) => write!(f, "wait {}ms", w.ms),
            Step::Log(l) => write!(f, "log \"{}\"", l.message),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitStep {
    pub ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogStep {
    pub message: String,
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StepVisitor)
    }
}

struct StepVisitor;

impl<'de> Visitor<'de> for StepVisitor {
    type Value = Step;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a step (\"open\", or a map with a single key)")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match value {
            "open" => Ok(Step::Open),
            other => Err(de::Error::unknown_variant(other, &["open"])),
        }
    }

    fn visit_map<M>(self, mut map: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let key: String = map
            .next_key()?
            .ok_or_else(|| de::Error::custom("expected step type key"))?;

        let step = match key.as_str() {
            "open" => {
                let _: serde_yaml::Value = map.next_value()?;
                Step::Open
            }
            "instruction" => Step::Instruction(map.next_value()?),
            "click" => Step::Click(map.next_value::<ButtonName>()?.0),
            "wait" => Step::Wait(map.next_value()?),
            "log" => Step::Log(map.next_value()?),
            other => {
                return Err(de::Error::unknown_variant(
                    other,
                    &["open", "instruction", "click", "wait", "log"],
                ))
            }
        };

        if map.next_key::<String>()?.is_some() {
            return Err(de::Error::custom("a step must have exactly one key"));
        }
        Ok(step)
    }
}

/// Button names may be written bare in YAML, so `click: 7` arrives as a number.
struct ButtonName(String);

impl<'de> Deserialize<'de> for ButtonName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::String(s) => Ok(ButtonName(s)),
            serde_yaml::Value::Number(n) => Ok(ButtonName(n.to_string())),
            other => Err(de::Error::custom(format!(
                "expected a button name, got {:?}",
                other
            ))),
        }
    }
}

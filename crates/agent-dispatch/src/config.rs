//! Agent configuration loaded from TOML.

use serde::{Deserialize, Deserializer, de};
use std::{fs, io, path::Path, time::Duration};
use thiserror::Error;

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("fail to read the config file `{path}`: {source}")]
    Io {
        /// Path of the config file.
        path: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The configuration is not valid TOML or has invalid values.
    #[error("fail to parse the config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration of the agent core.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AgentConfig {
    /// Result rendering limits.
    pub render: RenderConfig,
    /// Reference script evaluator settings.
    pub evaluator: EvaluatorConfig,
    /// Tracing subscriber settings.
    pub tracing: TracingConfig,
}

impl AgentConfig {
    /// Parses the configuration from a TOML string.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        toml::from_str(input).map_err(ConfigError::from)
    }

    /// Loads the configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&input)?;
        tracing::debug!(path = %path.display(), "agent config loaded");
        Ok(config)
    }
}

/// Limits applied when rendering results for the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RenderConfig {
    /// Maximum number of chars of a raw result payload.
    pub result_limit: usize,
    /// Maximum number of chars of an inline preview.
    pub preview_limit: usize,
    /// Maximum number of chars of an error message.
    pub error_limit: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            result_limit: 3000,
            preview_limit: 200,
            error_limit: 300,
        }
    }
}

/// Settings of the reference script evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EvaluatorConfig {
    /// Maximum number of interpreter steps per evaluation.
    pub max_steps: u64,
    /// Wall-clock budget per evaluation.
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    /// Maximum approximate size in bytes of any single script value.
    pub max_value_size: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_steps: 100_000,
            timeout: Duration::from_secs(5),
            max_value_size: 8 * 1024 * 1024,
        }
    }
}

/// Settings of the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TracingConfig {
    /// Event format: `compact`, `json`, `pretty` or `full`.
    pub format: String,
    /// Directives for the env filter.
    pub filter: String,
    /// Enables ANSI colors.
    pub ansi: bool,
    /// Displays the event target.
    pub display_target: bool,
    /// Displays the source file name.
    pub display_filename: bool,
    /// Displays the source line number.
    pub display_line_number: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: "compact".to_owned(),
            filter: "info,agent_dispatch=debug".to_owned(),
            ansi: true,
            display_target: true,
            display_filename: false,
            display_line_number: false,
        }
    }
}

/// Parses a duration such as `5s`, `500ms` or `1m30s`.
pub fn parse_duration(mut input: &str) -> Result<Duration, String> {
    const UNIT_IN_MILLIS: [u64; 6] = [0, 86_400_000, 3_600_000, 60_000, 1_000, 1];
    input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_owned());
    }
    let mut last_unit_order = 0;
    let mut milliseconds = 0_u64;
    while !input.is_empty() {
        let Some(index) = input.find(|ch: char| ch.is_alphabetic()) else {
            return Err(format!("missing unit in `{input}`"));
        };
        let (number, remainder) = input.split_at(index);
        let number = number
            .trim()
            .parse::<u64>()
            .map_err(|err| format!("invalid number `{number}`: {err}"))?;
        let unit_len = remainder
            .find(|ch: char| ch.is_ascii_digit())
            .unwrap_or(remainder.len());
        let (unit, remainder) = remainder.split_at(unit_len);
        let unit_order = match unit.trim() {
            "ms" => 5,
            unit => "dhms"
                .find(unit)
                .filter(|_| unit.len() == 1)
                .map(|index| index + 1)
                .ok_or_else(|| format!("unknown unit `{unit}`"))?,
        };
        if unit_order <= last_unit_order {
            return Err(format!("unit `{unit}` is out of order"));
        }
        milliseconds = number
            .checked_mul(UNIT_IN_MILLIS[unit_order])
            .and_then(|millis| millis.checked_add(milliseconds))
            .ok_or_else(|| format!("duration `{number}{unit}` is too large"))?;
        last_unit_order = unit_order;
        input = remainder;
    }
    Ok(Duration::from_millis(milliseconds))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let input = String::deserialize(deserializer)?;
    parse_duration(&input).map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_parses_durations() {
        assert_eq!(parse_duration("5s"), Ok(Duration::from_secs(5)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert!(parse_duration("30s1m").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("3y").is_err());
    }

    #[test]
    fn it_rejects_overflowing_durations() {
        let err = parse_duration("999999999999999999d").unwrap_err();
        assert!(err.contains("too large"));
        assert!(parse_duration("18446744073709551615ms").is_ok());
        assert!(parse_duration("18446744073709551615s1ms").is_err());
    }

    #[test]
    fn it_falls_back_to_defaults() {
        let config = AgentConfig::from_toml_str("").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.render.result_limit, 3000);
        assert_eq!(config.evaluator.timeout, Duration::from_secs(5));
    }

    #[test]
    fn it_reads_kebab_case_tables() {
        let config = AgentConfig::from_toml_str(
            r#"
            [render]
            preview-limit = 120

            [evaluator]
            max-steps = 42
            timeout = "250ms"
            max-value-size = 4096

            [tracing]
            format = "json"
            display-line-number = true
            "#,
        )
        .unwrap();
        assert_eq!(config.render.preview_limit, 120);
        assert_eq!(config.render.error_limit, 300);
        assert_eq!(config.evaluator.max_steps, 42);
        assert_eq!(config.evaluator.timeout, Duration::from_millis(250));
        assert_eq!(config.evaluator.max_value_size, 4096);
        assert_eq!(config.tracing.format, "json");
        assert!(config.tracing.display_line_number);
    }

    #[test]
    fn it_rejects_invalid_durations() {
        let result = AgentConfig::from_toml_str("[evaluator]\ntimeout = \"soon\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}

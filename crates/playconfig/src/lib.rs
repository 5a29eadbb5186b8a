use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::Deserialize;

const MIB: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    pub version: u32,
    /// Budget for decoded frame caches, in bytes.
    #[serde(
        default = "default_memory_limit",
        deserialize_with = "deserialize_byte_size"
    )]
    pub memory_limit: u64,
    #[serde(
        default = "default_tick_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub tick_interval: Duration,
    #[serde(default)]
    pub displays: Vec<DisplayEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayEntry {
    pub path: PathBuf,
    /// `-1` loops forever; overrides the count stored in the file.
    #[serde(default)]
    pub loop_count: Option<i64>,
    #[serde(default = "default_displaying")]
    pub displaying: bool,
    #[serde(default)]
    pub paused: bool,
}

impl DisplayEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loop_count: None,
            displaying: true,
            paused: false,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            version: 1,
            memory_limit: default_memory_limit(),
            tick_interval: default_tick_interval(),
            displays: Vec::new(),
        }
    }
}

fn default_memory_limit() -> u64 {
    50 * MIB
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(16)
}

fn default_displaying() -> bool {
    true
}

/// Parses sizes such as `64MiB`, `512 KiB`, `2GB` or `1048576B`.
///
/// Units are binary and case-insensitive; a bare number is megabytes.
pub fn parse_byte_size(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("size must not be empty".into());
    }

    let split = trimmed
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid size '{trimmed}'"))?;

    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "" | "m" | "mb" | "mib" => MIB,
        "g" | "gb" | "gib" => 1024 * MIB,
        other => {
            return Err(format!(
                "unknown size unit '{other}'; expected B, KiB, MiB, or GiB"
            ))
        }
    };

    Ok((value * multiplier as f64).round() as u64)
}

pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime::parse_duration(raw.trim()).map_err(|err| format!("invalid duration '{raw}': {err}"))
}

fn deserialize_byte_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a size in megabytes or a string such as \"64MiB\"")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_byte_size(v).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            v.checked_mul(MIB)
                .ok_or_else(|| E::custom("memory limit is too large"))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("memory limit must be non-negative"));
            }
            (v as u64)
                .checked_mul(MIB)
                .ok_or_else(|| E::custom("memory limit is too large"))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            parse_duration(v).map_err(E::custom)
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl PlaybackConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PlaybackConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.memory_limit == 0 {
            return Err(ConfigError::Invalid(
                "memory_limit must be greater than zero".into(),
            ));
        }

        if self.tick_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "tick_interval must be greater than zero".into(),
            ));
        }

        for display in &self.displays {
            if display.path.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(
                    "display entry has an empty path".into(),
                ));
            }

            if let Some(count) = display.loop_count {
                if count < -1 {
                    return Err(ConfigError::Invalid(format!(
                        "display '{}' loop_count must be -1 or >= 0",
                        display.path.display()
                    )));
                }
            }
        }

        Ok(())
    }
}

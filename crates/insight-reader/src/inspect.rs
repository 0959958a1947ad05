//! `inspect` subcommand: what an agent definition declares about itself

use crate::error::ReaderError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Self-description printed by `<bin> inspect <agent>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentManifest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub inputs: Vec<String>,
}

impl AgentManifest {
    /// Parse the JSON document
    pub fn parse(bytes: &[u8]) -> Result<Self, ReaderError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Schedule, if the agent asks to be run proactively
    #[must_use]
    pub fn proactive_schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref().filter(|s| s.is_proactive())
    }
}

/// Declared run cadence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Duration string such as `30m` or `1h30m`
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub mode: String,
}

impl Schedule {
    #[must_use]
    pub fn is_proactive(&self) -> bool {
        self.mode.eq_ignore_ascii_case("proactive")
    }

    /// Parsed interval; `None` when malformed or zero
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        parse_duration(&self.interval).filter(|d| !d.is_zero())
    }
}

/// Parse a duration written as a sequence of `<number><unit>` pairs
///
/// Units: `ns`, `us`, `ms`, `s`, `m`, `h`. Fractions are allowed
/// (`1.5h`); a bare `0` is zero.
#[must_use]
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text == "0" {
        return Some(Duration::ZERO);
    }
    if text.is_empty() {
        return None;
    }

    let mut total = 0f64;
    let mut rest = text;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let value: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += value * seconds_per_unit;
    }

    Duration::try_from_secs_f64(total).ok()
}

/// Run `<binary> inspect <agent>` and parse its output
pub async fn inspect(binary: &Path, agent: &Path) -> Result<AgentManifest, ReaderError> {
    let output = Command::new(binary)
        .arg("inspect")
        .arg(agent)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ReaderError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReaderError::Inspect(format!(
            "{} ({})",
            stderr.trim(),
            output.status
        )));
    }

    let manifest = AgentManifest::parse(&output.stdout)?;
    tracing::debug!(name = %manifest.name, nodes = manifest.nodes.len(), "agent inspected");
    Ok(manifest)
}

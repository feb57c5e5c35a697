use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::{read_json, write_json};
use crate::error::Result;

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Contents of `autobackup.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoBackupPolicy {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(default)]
    pub on_session_end: bool,
    #[serde(default)]
    pub watch: bool,
    #[serde(default)]
    pub last_backup: Option<DateTime<Utc>>,
}

impl AutoBackupPolicy {
    /// A missing or unreadable file reads as a disabled policy.
    pub fn load_or_default(path: &Path) -> Self {
        read_json(path).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self, 0o600)
    }

    /// Interval between watch ticks; falls back to five minutes.
    pub fn interval(&self) -> Duration {
        self.interval
            .as_deref()
            .and_then(|s| parse_interval(s).ok())
            .unwrap_or(DEFAULT_WATCH_INTERVAL)
    }

    /// Persist `at` as the last successful backup, keeping the other fields.
    pub fn record_backup(path: &Path, at: DateTime<Utc>) -> Result<()> {
        let mut policy = Self::load_or_default(path);
        policy.last_backup = Some(at);
        policy.save(path)
    }
}

/// Parse intervals such as `30s`, `15m`, `2h` or `1h30m`.
pub fn parse_interval(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty interval".to_string());
    }

    let mut total = 0u64;
    let mut digits = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let n: u64 = digits
            .parse()
            .map_err(|_| format!("invalid interval: {}", s))?;
        digits.clear();
        let unit = match ch {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            _ => return Err(format!("invalid interval unit '{}' in {}", ch, s)),
        };
        total += n * unit;
    }
    if !digits.is_empty() {
        return Err(format!("missing unit in interval: {}", s));
    }
    if total == 0 {
        return Err(format!("interval must be positive: {}", s));
    }
    Ok(Duration::from_secs(total))
}

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::audio::Tone;

pub const API_BASE_ENV: &str = "ALARM_API_BASE";
pub const DEBUG_ENV: &str = "ALARM_DEBUG";

/// Upper bound on `triggerToleranceMs`.
pub const MAX_TRIGGER_TOLERANCE_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_base: String,
    pub interval_path: String,
    pub compare_path: String,
    pub sites_search_path: String,
    pub tick_interval_ms: u64,
    /// How far ahead of the optimal refresh time an interval alarm may fire.
    pub trigger_tolerance_ms: u64,
    pub tone: Tone,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3001".into(),
            interval_path: "/interval/calculate".into(),
            compare_path: "/api/time/compare".into(),
            sites_search_path: "/api/sites/search".into(),
            tick_interval_ms: 1000,
            trigger_tolerance_ms: 1000,
            tone: Tone::default(),
        }
    }
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn trigger_tolerance(&self) -> chrono::Duration {
        let millis = self.trigger_tolerance_ms.min(MAX_TRIGGER_TOLERANCE_MS);
        chrono::Duration::milliseconds(millis as i64)
    }

    fn sanitized(mut self) -> Self {
        if self.trigger_tolerance_ms > MAX_TRIGGER_TOLERANCE_MS {
            warn!(
                "triggerToleranceMs {} exceeds {}, clamping",
                self.trigger_tolerance_ms, MAX_TRIGGER_TOLERANCE_MS
            );
            self.trigger_tolerance_ms = MAX_TRIGGER_TOLERANCE_MS;
        }
        self
    }

    fn apply_env(mut self) -> Self {
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                self.api_base = base.trim().to_string();
            }
        }
        self
    }
}

pub fn debug_enabled() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads `path` if it exists. A file that fails to parse falls back to
    /// defaults rather than blocking startup.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {}", path.display(), err);
                Settings::default()
            })
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data.sanitized().apply_env()),
        })
    }

    pub fn settings(&self) -> Settings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = settings.sanitized();
        self.persist(&guard)
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

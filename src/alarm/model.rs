use std::collections::BTreeSet;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlarmTimeError {
    #[error("invalid {field} '{value}'")]
    InvalidField { field: &'static str, value: String },

    #[error("{0} does not exist on the current date in this time zone")]
    NonexistentLocalTime(NaiveTime),
}

/// Wall-clock target as the dropdowns produce it: zero-padded, 24-hour strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmTime {
    pub hour: String,
    pub minute: String,
    pub second: String,
}

impl AlarmTime {
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Result<Self, AlarmTimeError> {
        let time = Self {
            hour: format!("{hour:02}"),
            minute: format!("{minute:02}"),
            second: format!("{second:02}"),
        };
        time.naive_time()?;
        Ok(time)
    }

    pub fn from_time(time: NaiveTime) -> Self {
        use chrono::Timelike;
        Self {
            hour: format!("{:02}", time.hour()),
            minute: format!("{:02}", time.minute()),
            second: format!("{:02}", time.second()),
        }
    }

    pub fn hour_menu() -> Vec<String> {
        menu(24)
    }

    pub fn minute_menu() -> Vec<String> {
        menu(60)
    }

    pub fn second_menu() -> Vec<String> {
        menu(60)
    }

    pub fn naive_time(&self) -> Result<NaiveTime, AlarmTimeError> {
        let hour = parse_field("hour", &self.hour, 23)?;
        let minute = parse_field("minute", &self.minute, 59)?;
        let second = parse_field("second", &self.second, 59)?;
        NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
            AlarmTimeError::InvalidField {
                field: "time",
                value: self.to_string(),
            }
        })
    }

    /// Today's occurrence of this time in `now`'s zone, with milliseconds zeroed.
    ///
    /// There is no rollover to tomorrow: a time earlier than `now` resolves to
    /// a past instant and the countdown clamps it to zero.
    pub fn resolve_on<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, AlarmTimeError> {
        let time = self.naive_time()?;
        let naive = now.date_naive().and_time(time);
        now.timezone()
            .from_local_datetime(&naive)
            .earliest()
            .ok_or(AlarmTimeError::NonexistentLocalTime(time))
    }
}

impl std::fmt::Display for AlarmTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.hour, self.minute, self.second)
    }
}

impl std::str::FromStr for AlarmTime {
    type Err = AlarmTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let mut next = |field: &'static str| {
            parts
                .next()
                .ok_or_else(|| AlarmTimeError::InvalidField {
                    field,
                    value: s.to_string(),
                })
                .and_then(|raw| parse_field(field, raw, u32::MAX))
        };
        let hour = next("hour")?;
        let minute = next("minute")?;
        let second = next("second")?;
        if parts.next().is_some() {
            return Err(AlarmTimeError::InvalidField {
                field: "time",
                value: s.to_string(),
            });
        }
        Self::from_hms(hour, minute, second)
    }
}

fn parse_field(field: &'static str, raw: &str, max: u32) -> Result<u32, AlarmTimeError> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|value| *value <= max)
        .ok_or_else(|| AlarmTimeError::InvalidField {
            field,
            value: raw.to_string(),
        })
}

fn menu(len: u32) -> Vec<String> {
    (0..len).map(|n| format!("{n:02}")).collect()
}

/// Seconds-before-target offsets offered by the alarm form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum PreAlert {
    TenSeconds,
    ThirtySeconds,
    OneMinute,
}

impl PreAlert {
    pub const MENU: [PreAlert; 3] = [
        PreAlert::OneMinute,
        PreAlert::ThirtySeconds,
        PreAlert::TenSeconds,
    ];

    pub fn seconds(self) -> u64 {
        match self {
            PreAlert::TenSeconds => 10,
            PreAlert::ThirtySeconds => 30,
            PreAlert::OneMinute => 60,
        }
    }
}

impl TryFrom<u32> for PreAlert {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(PreAlert::TenSeconds),
            30 => Ok(PreAlert::ThirtySeconds),
            60 => Ok(PreAlert::OneMinute),
            other => Err(format!("unsupported pre-alert offset {other}s (expected 10, 30 or 60)")),
        }
    }
}

impl From<PreAlert> for u32 {
    fn from(value: PreAlert) -> Self {
        value.seconds() as u32
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmOptions {
    #[serde(default)]
    pub pre_alerts: BTreeSet<PreAlert>,
    #[serde(default)]
    pub sound: bool,
    #[serde(default)]
    pub red: bool,
    #[serde(default)]
    pub use_interval_calculation: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_alert_offsets: Vec<i64>,
}

/// Which trigger strategy an alarm runs under. Never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertStrategy {
    /// Fire on each configured pre-alert, or at zero when there are none.
    PreAlerts(BTreeSet<u64>),
    /// Fire when the wall clock reaches the server's optimal refresh time.
    Interval,
}

impl AlarmOptions {
    pub fn strategy(&self) -> AlertStrategy {
        if self.use_interval_calculation {
            AlertStrategy::Interval
        } else {
            AlertStrategy::PreAlerts(self.pre_alerts.iter().map(|p| p.seconds()).collect())
        }
    }
}

/// Confirmed alarm. Immutable for the lifetime of the countdown it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmData {
    pub time: AlarmTime,
    pub options: AlarmOptions,
    pub target_time: DateTime<Utc>,
}

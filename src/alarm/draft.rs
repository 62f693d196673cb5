use chrono::{DateTime, Local, Utc};
use thiserror::Error;

use super::model::{AlarmData, AlarmOptions, AlarmTime, AlarmTimeError, PreAlert};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DraftError {
    #[error("target time {0} has already passed; pick a later time")]
    TargetInPast(AlarmTime),

    #[error("interval calculation needs the searched site's URL")]
    MissingTargetUrl,

    #[error(transparent)]
    InvalidTime(#[from] AlarmTimeError),
}

/// Result of the alarm form: the host either gets a confirmed alarm or nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModalOutcome {
    Confirmed(AlarmData),
    Cancelled,
}

/// Editable alarm form state. Starts at 00:00:00 with every option off.
#[derive(Debug, Clone)]
pub struct AlarmDraft {
    time: AlarmTime,
    options: AlarmOptions,
}

impl Default for AlarmDraft {
    fn default() -> Self {
        Self {
            time: AlarmTime {
                hour: "00".into(),
                minute: "00".into(),
                second: "00".into(),
            },
            options: AlarmOptions::default(),
        }
    }
}

impl AlarmDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time(&mut self, time: AlarmTime) -> &mut Self {
        self.time = time;
        self
    }

    pub fn toggle_pre_alert(&mut self, pre_alert: PreAlert) -> &mut Self {
        if !self.options.pre_alerts.remove(&pre_alert) {
            self.options.pre_alerts.insert(pre_alert);
        }
        self
    }

    pub fn toggle_sound(&mut self) -> &mut Self {
        self.options.sound = !self.options.sound;
        self
    }

    pub fn toggle_red(&mut self) -> &mut Self {
        self.options.red = !self.options.red;
        self
    }

    pub fn toggle_interval_calculation(&mut self) -> &mut Self {
        self.options.use_interval_calculation = !self.options.use_interval_calculation;
        self
    }

    pub fn set_custom_alert_offsets(&mut self, offsets: Vec<i64>) -> &mut Self {
        self.options.custom_alert_offsets = offsets;
        self
    }

    pub fn options(&self) -> &AlarmOptions {
        &self.options
    }

    /// Validates the form against `now` and produces the immutable alarm.
    ///
    /// `final_url` is the URL the search resolved to; interval mode cannot
    /// be confirmed without it.
    pub fn confirm(
        &self,
        now: DateTime<Local>,
        final_url: Option<&str>,
    ) -> Result<ModalOutcome, DraftError> {
        let target = self.time.resolve_on(&now)?;
        if target < now {
            return Err(DraftError::TargetInPast(self.time.clone()));
        }

        let has_url = final_url.map(|url| !url.trim().is_empty()).unwrap_or(false);
        if self.options.use_interval_calculation && !has_url {
            return Err(DraftError::MissingTargetUrl);
        }

        Ok(ModalOutcome::Confirmed(AlarmData {
            time: self.time.clone(),
            options: self.options.clone(),
            target_time: target.with_timezone(&Utc),
        }))
    }

    pub fn cancel(self) -> ModalOutcome {
        ModalOutcome::Cancelled
    }
}

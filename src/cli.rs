use std::path::PathBuf;

use clap::Parser;

use crate::alarm::{AlarmDraft, AlarmTime, PreAlert};

#[derive(Parser, Debug)]
#[command(name = "servertime-alarm")]
#[command(
    version,
    about = "Count down to a target time and alert at the right moment",
    long_about = None
)]
pub struct Cli {
    /// Target time today, HH:MM:SS (24-hour)
    #[arg(long)]
    pub at: AlarmTime,

    /// Alert this many seconds before the target (10, 30 or 60); repeatable
    #[arg(long = "pre-alert", value_parser = parse_pre_alert)]
    pub pre_alerts: Vec<PreAlert>,

    /// Play a tone when the alarm triggers
    #[arg(long)]
    pub sound: bool,

    /// Turn the terminal background red when the alarm triggers
    #[arg(long)]
    pub red: bool,

    /// Trigger at the server-computed optimal refresh time instead of pre-alerts
    #[arg(long)]
    pub interval: bool,

    /// Site URL or search keyword; required by --interval and --server-clock
    #[arg(long)]
    pub url: Option<String>,

    /// Custom alert offset (ms) forwarded to the interval calculation; repeatable
    #[arg(long = "offset", allow_negative_numbers = true)]
    pub offsets: Vec<i64>,

    /// Count down on the target server's corrected clock
    #[arg(long)]
    pub server_clock: bool,

    /// Seconds to keep the alert on screen after triggering
    #[arg(long, default_value_t = 5)]
    pub hold_secs: u64,

    /// Settings file (JSON)
    #[arg(long, default_value = "servertime-alarm.json")]
    pub settings: PathBuf,
}

impl Cli {
    pub fn draft(&self) -> AlarmDraft {
        let mut draft = AlarmDraft::new();
        draft.set_time(self.at.clone());
        for pre_alert in &self.pre_alerts {
            if !draft.options().pre_alerts.contains(pre_alert) {
                draft.toggle_pre_alert(*pre_alert);
            }
        }
        if self.sound {
            draft.toggle_sound();
        }
        if self.red {
            draft.toggle_red();
        }
        if self.interval {
            draft.toggle_interval_calculation();
        }
        draft.set_custom_alert_offsets(self.offsets.clone());
        draft
    }
}

fn parse_pre_alert(raw: &str) -> Result<PreAlert, String> {
    let seconds: u32 = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a number of seconds"))?;
    PreAlert::try_from(seconds)
}

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmData, AlarmTimeError, AlertStrategy};
use crate::interval::IntervalCalculationResult;

pub const ALARM_MESSAGE: &str = "⏰ It's alarm time!";
pub const AWAITING_MESSAGE: &str = "Waiting for interval calculation...";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CountdownPhase {
    AwaitingCalculation,
    Counting,
    Triggered,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "status", content = "result")]
pub enum CalculationStatus {
    NotRequested,
    Pending,
    Ready(IntervalCalculationResult),
    Unavailable,
}

/// What a single tick changed. The controller turns this into cues and
/// callbacks; the state itself has no side effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// The instance entered `Triggered` on this tick. True at most once.
    pub triggered: bool,
    /// Pre-alert offsets crossed on this tick, largest first.
    pub alerts: Vec<u64>,
    /// Zero reached with no pre-alerts configured.
    pub completed: bool,
    /// No later tick can change anything; the ticker may stop.
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct CountdownState {
    pub phase: CountdownPhase,
    pub target: DateTime<Local>,
    pub remaining_secs: u64,
    pub fired_alerts: Vec<u64>,
    pub calculation: CalculationStatus,
    pub triggered_at: Option<DateTime<Local>>,
    strategy: AlertStrategy,
    tolerance: Duration,
    observed: bool,
    finished: bool,
}

impl CountdownState {
    pub fn new(
        alarm: &AlarmData,
        now: DateTime<Local>,
        tolerance: Duration,
    ) -> Result<Self, AlarmTimeError> {
        let target = alarm.time.resolve_on(&now)?;
        let strategy = alarm.options.strategy();
        let phase = match strategy {
            AlertStrategy::Interval => CountdownPhase::AwaitingCalculation,
            AlertStrategy::PreAlerts(_) => CountdownPhase::Counting,
        };

        Ok(Self {
            phase,
            target,
            remaining_secs: remaining_between(target, now),
            fired_alerts: Vec::new(),
            calculation: CalculationStatus::NotRequested,
            triggered_at: None,
            strategy,
            tolerance,
            observed: false,
            finished: false,
        })
    }

    pub fn strategy(&self) -> &AlertStrategy {
        &self.strategy
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Marks the interval request as in flight. Returns false when the
    /// request was already issued or the alarm is not in interval mode.
    pub fn begin_calculation(&mut self) -> bool {
        if self.strategy != AlertStrategy::Interval
            || self.calculation != CalculationStatus::NotRequested
        {
            return false;
        }
        self.calculation = CalculationStatus::Pending;
        true
    }

    pub fn complete_calculation(&mut self, result: Option<IntervalCalculationResult>) {
        if self.calculation != CalculationStatus::Pending {
            return;
        }
        self.calculation = match result {
            Some(result) => CalculationStatus::Ready(result),
            None => CalculationStatus::Unavailable,
        };
        if self.phase == CountdownPhase::AwaitingCalculation {
            self.phase = CountdownPhase::Counting;
        }
    }

    /// Re-derives the remaining time from `now` and evaluates the trigger.
    pub fn tick(&mut self, now: DateTime<Local>) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if self.finished {
            outcome.finished = true;
            return outcome;
        }

        let previous = self.observed.then_some(self.remaining_secs);
        let remaining = remaining_between(self.target, now);
        self.remaining_secs = remaining;
        self.observed = true;

        match self.strategy.clone() {
            AlertStrategy::PreAlerts(offsets) if offsets.is_empty() => {
                if remaining == 0 {
                    self.trigger(now, &mut outcome);
                    outcome.completed = true;
                    self.finished = true;
                }
            }
            AlertStrategy::PreAlerts(offsets) => {
                let crossed: Vec<u64> = offsets
                    .into_iter()
                    .rev()
                    .filter(|offset| *offset >= remaining)
                    .filter(|offset| previous.map_or(true, |prev| *offset < prev))
                    .filter(|offset| !self.fired_alerts.contains(offset))
                    .collect();

                if !crossed.is_empty() {
                    self.fired_alerts.extend(&crossed);
                    outcome.alerts = crossed;
                    self.trigger(now, &mut outcome);
                }
                if remaining == 0 {
                    self.finished = true;
                }
            }
            AlertStrategy::Interval => {
                let refresh_at = match &self.calculation {
                    CalculationStatus::Ready(result) => Some(result.optimal_refresh_time),
                    _ => None,
                };
                if let Some(refresh_at) = refresh_at {
                    // A tolerance reaching past the representable range fires now.
                    let due = now
                        .with_timezone(&Utc)
                        .checked_add_signed(self.tolerance)
                        .map_or(true, |latest| latest >= refresh_at);
                    if due {
                        self.trigger(now, &mut outcome);
                        self.finished = true;
                    }
                } else if self.calculation == CalculationStatus::Unavailable && remaining == 0 {
                    self.finished = true;
                }
            }
        }

        outcome.finished = self.finished;
        outcome
    }

    pub fn display(&self) -> String {
        match self.phase {
            CountdownPhase::Triggered => ALARM_MESSAGE.to_string(),
            CountdownPhase::AwaitingCalculation => AWAITING_MESSAGE.to_string(),
            CountdownPhase::Counting => {
                let at_zero = self.observed && self.remaining_secs == 0;
                if at_zero && self.strategy != AlertStrategy::Interval {
                    ALARM_MESSAGE.to_string()
                } else {
                    format_remaining(self.remaining_secs)
                }
            }
        }
    }

    fn trigger(&mut self, now: DateTime<Local>, outcome: &mut TickOutcome) {
        if self.phase == CountdownPhase::Triggered {
            return;
        }
        self.phase = CountdownPhase::Triggered;
        self.triggered_at = Some(now);
        outcome.triggered = true;
    }
}

/// `max(0, floor((target - now) / 1s))`.
pub fn remaining_between(target: DateTime<Local>, now: DateTime<Local>) -> u64 {
    let millis = (target - now).num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis / 1000) as u64
    }
}

pub fn format_remaining(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02} : {minutes:02} : {seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::{AlarmOptions, AlarmTime, PreAlert};
    use chrono::{TimeZone, Timelike};

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).earliest().unwrap()
    }

    fn alarm_at(target: DateTime<Local>, options: AlarmOptions) -> AlarmData {
        AlarmData {
            time: AlarmTime::from_hms(target.hour(), target.minute(), target.second()).unwrap(),
            options,
            target_time: target.with_timezone(&Utc),
        }
    }

    fn pre_alerts(alerts: &[PreAlert]) -> AlarmOptions {
        AlarmOptions {
            pre_alerts: alerts.iter().copied().collect(),
            ..Default::default()
        }
    }

    fn interval_result(at: DateTime<Local>) -> IntervalCalculationResult {
        IntervalCalculationResult {
            optimal_refresh_time: at.with_timezone(&Utc),
            refresh_interval: 250.0,
            alert_settings: Vec::new(),
            confidence: 0.9,
            network_analysis: serde_json::Value::Null,
        }
    }

    fn secs(n: i64) -> Duration {
        Duration::seconds(n)
    }

    #[test]
    fn initial_remaining_floors_partial_seconds() {
        let now = noon() + Duration::milliseconds(250);
        let alarm = alarm_at(noon() + secs(90), AlarmOptions::default());
        let state = CountdownState::new(&alarm, now, secs(1)).unwrap();
        assert_eq!(state.remaining_secs, 89);
        assert_eq!(state.phase, CountdownPhase::Counting);
    }

    #[test]
    fn past_target_clamps_and_fires_on_first_tick() {
        let alarm = alarm_at(noon() - secs(30), AlarmOptions::default());
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();
        assert_eq!(state.remaining_secs, 0);

        let outcome = state.tick(noon());
        assert!(outcome.triggered);
        assert!(outcome.completed);
        assert!(outcome.finished);
        assert_eq!(state.phase, CountdownPhase::Triggered);
    }

    #[test]
    fn target_exactly_now_fires_on_first_tick() {
        let alarm = alarm_at(noon(), AlarmOptions::default());
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();
        assert!(state.tick(noon()).triggered);
    }

    #[test]
    fn no_pre_alerts_triggers_only_at_zero() {
        let alarm = alarm_at(noon() + secs(3), AlarmOptions::default());
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();

        for elapsed in 0..3 {
            let outcome = state.tick(noon() + secs(elapsed));
            assert!(!outcome.triggered, "fired early at +{elapsed}s");
            assert_eq!(state.remaining_secs, (3 - elapsed) as u64);
        }
        let outcome = state.tick(noon() + secs(3));
        assert_eq!(
            outcome,
            TickOutcome {
                triggered: true,
                alerts: Vec::new(),
                completed: true,
                finished: true,
            }
        );
        assert_eq!(state.display(), ALARM_MESSAGE);
    }

    #[test]
    fn each_pre_alert_is_observed_once() {
        let options = pre_alerts(&[PreAlert::OneMinute, PreAlert::TenSeconds]);
        let alarm = alarm_at(noon() + secs(65), options);
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();

        let mut seen = Vec::new();
        let mut triggers = 0;
        for elapsed in 0..=65 {
            let outcome = state.tick(noon() + secs(elapsed));
            if outcome.triggered {
                triggers += 1;
                assert_eq!(state.remaining_secs, 60);
            }
            seen.extend(outcome.alerts);
        }

        assert_eq!(seen, vec![60, 10]);
        assert_eq!(triggers, 1);
        assert!(state.is_finished());
        assert_eq!(state.phase, CountdownPhase::Triggered);
    }

    #[test]
    fn delayed_tick_does_not_skip_a_pre_alert() {
        let alarm = alarm_at(noon() + secs(40), pre_alerts(&[PreAlert::ThirtySeconds]));
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();

        assert!(state.tick(noon()).alerts.is_empty());
        // Host stalled from 40s remaining straight to 27s.
        let outcome = state.tick(noon() + secs(13));
        assert_eq!(outcome.alerts, vec![30]);
        assert!(outcome.triggered);
    }

    #[test]
    fn pre_alert_already_inside_window_fires_immediately() {
        let alarm = alarm_at(noon() + secs(20), pre_alerts(&[PreAlert::OneMinute]));
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();
        let outcome = state.tick(noon());
        assert_eq!(outcome.alerts, vec![60]);
        assert!(outcome.triggered);
        assert!(!outcome.completed);
    }

    #[test]
    fn pre_alert_mode_never_reports_completion() {
        let alarm = alarm_at(noon() + secs(12), pre_alerts(&[PreAlert::TenSeconds]));
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();
        let completed = (0..=12).any(|elapsed| state.tick(noon() + secs(elapsed)).completed);
        assert!(!completed);
        assert!(state.is_finished());
    }

    #[test]
    fn interval_mode_waits_for_calculation() {
        let options = AlarmOptions {
            use_interval_calculation: true,
            pre_alerts: [PreAlert::TenSeconds].into_iter().collect(),
            ..Default::default()
        };
        let alarm = alarm_at(noon() + secs(10), options);
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();
        assert_eq!(state.phase, CountdownPhase::AwaitingCalculation);
        assert_eq!(state.display(), AWAITING_MESSAGE);

        assert!(state.begin_calculation());
        assert!(!state.begin_calculation());

        // Pre-alerts are ignored in interval mode, even at the configured offset.
        let outcome = state.tick(noon());
        assert!(!outcome.triggered);
        assert!(outcome.alerts.is_empty());
    }

    #[test]
    fn late_result_with_past_refresh_time_triggers_next_tick() {
        let options = AlarmOptions {
            use_interval_calculation: true,
            ..Default::default()
        };
        let alarm = alarm_at(noon() + secs(30), options);
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();
        state.begin_calculation();

        for elapsed in 0..5 {
            assert!(!state.tick(noon() + secs(elapsed)).triggered);
        }
        state.complete_calculation(Some(interval_result(noon() + secs(3))));
        assert_eq!(state.phase, CountdownPhase::Counting);

        let outcome = state.tick(noon() + secs(5));
        assert!(outcome.triggered);
        assert!(outcome.finished);
        assert!(!outcome.completed);
    }

    #[test]
    fn interval_trigger_respects_tolerance() {
        let options = AlarmOptions {
            use_interval_calculation: true,
            ..Default::default()
        };
        let alarm = alarm_at(noon() + secs(30), options);
        let mut state = CountdownState::new(&alarm, noon(), Duration::milliseconds(500)).unwrap();
        state.begin_calculation();
        let refresh_at = noon() + secs(10) + Duration::milliseconds(400);
        state.complete_calculation(Some(interval_result(refresh_at)));

        assert!(!state.tick(noon() + secs(9)).triggered);
        assert!(state.tick(noon() + secs(10)).triggered);
    }

    #[test]
    fn oversized_tolerance_fires_instead_of_overflowing() {
        let options = AlarmOptions {
            use_interval_calculation: true,
            ..Default::default()
        };
        let alarm = alarm_at(noon() + secs(30), options);
        let tolerance = Duration::milliseconds(i64::MAX);
        let mut state = CountdownState::new(&alarm, noon(), tolerance).unwrap();
        state.begin_calculation();
        state.complete_calculation(Some(interval_result(noon() + secs(20))));

        let outcome = state.tick(noon());
        assert!(outcome.triggered);
        assert!(outcome.finished);
    }

    #[test]
    fn failed_calculation_never_triggers() {
        let options = AlarmOptions {
            use_interval_calculation: true,
            ..Default::default()
        };
        let alarm = alarm_at(noon() + secs(2), options);
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();
        state.begin_calculation();
        state.complete_calculation(None);
        assert_eq!(state.calculation, CalculationStatus::Unavailable);

        // A late success cannot resurrect the calculation.
        state.complete_calculation(Some(interval_result(noon())));
        assert_eq!(state.calculation, CalculationStatus::Unavailable);

        let fired = (0..=2).any(|elapsed| state.tick(noon() + secs(elapsed)).triggered);
        assert!(!fired);
        assert!(state.is_finished());
        assert_eq!(state.display(), "00 : 00 : 00");
    }

    #[test]
    fn triggered_state_is_terminal() {
        let alarm = alarm_at(noon() + secs(1), AlarmOptions::default());
        let mut state = CountdownState::new(&alarm, noon(), secs(1)).unwrap();
        state.tick(noon() + secs(1));
        let triggered_at = state.triggered_at;

        let outcome = state.tick(noon() + secs(5));
        assert_eq!(outcome, TickOutcome { finished: true, ..Default::default() });
        assert_eq!(state.triggered_at, triggered_at);
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_remaining(0), "00 : 00 : 00");
        assert_eq!(format_remaining(3_725), "01 : 02 : 05");
        assert_eq!(format_remaining(59), "00 : 00 : 59");
    }
}

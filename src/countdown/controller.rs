use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    alarm::{AlarmData, AlarmOptions, AlertStrategy},
    audio::Tone,
    clock::Clock,
    cue::CueSink,
    interval::{IntervalCalculator, IntervalRequest},
    settings::Settings,
};

use super::{CalculationStatus, CountdownPhase, CountdownState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub type CompletionCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownSnapshot {
    pub id: Uuid,
    pub phase: CountdownPhase,
    pub remaining_secs: u64,
    pub display: String,
    pub fired_alerts: Vec<u64>,
    pub calculation: CalculationStatus,
    pub target: DateTime<Local>,
    pub triggered_at: Option<DateTime<Local>>,
}

impl CountdownSnapshot {
    fn of(id: Uuid, state: &CountdownState) -> Self {
        Self {
            id,
            phase: state.phase,
            remaining_secs: state.remaining_secs,
            display: state.display(),
            fired_alerts: state.fired_alerts.clone(),
            calculation: state.calculation.clone(),
            target: state.target,
            triggered_at: state.triggered_at,
        }
    }
}

/// Collaborators shared by every countdown a host mounts.
#[derive(Clone)]
pub struct CountdownContext {
    pub clock: Arc<dyn Clock>,
    pub cues: Arc<dyn CueSink>,
    pub calculator: Option<Arc<dyn IntervalCalculator>>,
    pub tick_interval: Duration,
    pub tolerance: chrono::Duration,
    pub tone: Tone,
}

impl CountdownContext {
    pub fn from_settings(
        settings: &Settings,
        clock: Arc<dyn Clock>,
        cues: Arc<dyn CueSink>,
        calculator: Option<Arc<dyn IntervalCalculator>>,
    ) -> Self {
        Self {
            clock,
            cues,
            calculator,
            tick_interval: settings.tick_interval(),
            tolerance: settings.trigger_tolerance(),
            tone: settings.tone,
        }
    }
}

#[derive(Debug, Default)]
struct CueFlags {
    tone_played: bool,
    background_on: bool,
    released: bool,
}

/// Which cues are currently applied.
///
/// Firing and releasing both hold the lock while they touch the sink, so a
/// ticker that is mid-fire when its controller drops cannot re-apply a cue
/// after it has been reverted. Once released, firing is a no-op.
#[derive(Debug, Default)]
struct CueGuard {
    flags: StdMutex<CueFlags>,
}

impl CueGuard {
    fn lock(&self) -> MutexGuard<'_, CueFlags> {
        self.flags.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fire(&self, id: Uuid, options: &AlarmOptions, tone: Tone, cues: &dyn CueSink) {
        let mut flags = self.lock();
        if flags.released {
            return;
        }
        if options.sound && !flags.tone_played {
            flags.tone_played = true;
            if let Err(err) = cues.play_tone(tone) {
                log_error!("countdown {}: failed to play tone: {}", id, err);
            }
        }
        if options.red && !flags.background_on {
            flags.background_on = true;
            if let Err(err) = cues.set_alert_background(true) {
                log_error!("countdown {}: failed to set alert background: {}", id, err);
            }
        }
    }

    fn release(&self, id: Uuid, cues: &dyn CueSink) {
        let mut flags = self.lock();
        flags.released = true;
        if std::mem::take(&mut flags.background_on) {
            if let Err(err) = cues.set_alert_background(false) {
                log_error!("countdown {}: failed to restore background: {}", id, err);
            }
        }
        if std::mem::take(&mut flags.tone_played) {
            if let Err(err) = cues.stop_tone() {
                log_error!("countdown {}: failed to stop tone: {}", id, err);
            }
        }
    }
}

/// One running countdown for one `AlarmData`.
///
/// Dropping the controller stops its tasks; `unmount` additionally waits for
/// the ticker to exit before reverting the cues.
pub struct CountdownController {
    id: Uuid,
    alarm: AlarmData,
    state: Arc<Mutex<CountdownState>>,
    cues: Arc<dyn CueSink>,
    cue_guard: Arc<CueGuard>,
    ticker: Option<JoinHandle<()>>,
    calculation: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
    snapshots: watch::Receiver<CountdownSnapshot>,
}

impl CountdownController {
    /// Computes the initial state synchronously and starts the ticker.
    ///
    /// Must be called from within a tokio runtime. In interval mode the
    /// calculation request is issued here, once.
    pub fn mount(
        alarm: AlarmData,
        target_url: Option<String>,
        ctx: &CountdownContext,
        on_complete: Option<CompletionCallback>,
    ) -> Result<Self> {
        let id = Uuid::new_v4();
        let mut state = CountdownState::new(&alarm, ctx.clock.now(), ctx.tolerance)
            .with_context(|| format!("invalid alarm time {}", alarm.time))?;

        log_info!(
            "countdown {} mounted: target {} ({}s remaining, {:?})",
            id,
            state.target,
            state.remaining_secs,
            state.strategy()
        );

        let pending_request = if state.begin_calculation() {
            match (target_url, ctx.calculator.clone()) {
                (Some(url), Some(calculator)) => Some((url, calculator)),
                (url, calculator) => {
                    log_warn!(
                        "countdown {}: interval calculation unavailable (url: {}, calculator: {})",
                        id,
                        url.is_some(),
                        calculator.is_some()
                    );
                    state.complete_calculation(None);
                    None
                }
            }
        } else {
            None
        };

        let (tx, rx) = watch::channel(CountdownSnapshot::of(id, &state));
        let tx = Arc::new(tx);
        let state = Arc::new(Mutex::new(state));
        let cancel_token = CancellationToken::new();
        let cue_guard = Arc::new(CueGuard::default());

        let calculation = pending_request.map(|(url, calculator)| {
            let offsets = &alarm.options.custom_alert_offsets;
            let request = IntervalRequest::new(url, alarm.target_time, offsets);
            tokio::spawn(calculation_task(
                id,
                request,
                calculator,
                state.clone(),
                tx.clone(),
                cancel_token.clone(),
            ))
        });

        let ticker = tokio::spawn(ticker_task(TickerTask {
            id,
            alarm: alarm.clone(),
            state: state.clone(),
            clock: ctx.clock.clone(),
            cues: ctx.cues.clone(),
            cue_guard: cue_guard.clone(),
            tone: ctx.tone,
            tick_interval: ctx.tick_interval,
            snapshots: tx,
            on_complete,
            cancel_token: cancel_token.clone(),
        }));

        Ok(Self {
            id,
            alarm,
            state,
            cues: ctx.cues.clone(),
            cue_guard,
            ticker: Some(ticker),
            calculation,
            cancel_token,
            snapshots: rx,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn alarm(&self) -> &AlarmData {
        &self.alarm
    }

    pub fn snapshot(&self) -> CountdownSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Snapshot stream. Closes once the ticker and the calculation task
    /// have both exited.
    pub fn subscribe(&self) -> watch::Receiver<CountdownSnapshot> {
        self.snapshots.clone()
    }

    pub async fn state(&self) -> CountdownState {
        self.state.lock().await.clone()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Stops the ticker, drops any in-flight calculation, and reverts cues.
    pub async fn unmount(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.calculation.take() {
            handle.abort();
        }
        if let Some(handle) = self.ticker.take() {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    log_error!("countdown {}: ticker task failed: {}", self.id, err);
                }
            }
        }
        self.release();
        log_info!("countdown {} unmounted", self.id);
    }

    fn release(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.calculation.take() {
            handle.abort();
        }
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        self.cue_guard.release(self.id, self.cues.as_ref());
    }
}

impl Drop for CountdownController {
    fn drop(&mut self) {
        self.release();
    }
}

struct TickerTask {
    id: Uuid,
    alarm: AlarmData,
    state: Arc<Mutex<CountdownState>>,
    clock: Arc<dyn Clock>,
    cues: Arc<dyn CueSink>,
    cue_guard: Arc<CueGuard>,
    tone: Tone,
    tick_interval: Duration,
    snapshots: Arc<watch::Sender<CountdownSnapshot>>,
    on_complete: Option<CompletionCallback>,
    cancel_token: CancellationToken,
}

async fn ticker_task(task: TickerTask) {
    let mut interval = time::interval(task.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = task.cancel_token.cancelled() => {
                log_debug!("countdown {} ticker cancelled", task.id);
                break;
            }
            _ = interval.tick() => {}
        }

        let (outcome, snapshot) = {
            let mut guard = task.state.lock().await;
            let outcome = guard.tick(task.clock.now());
            (outcome, CountdownSnapshot::of(task.id, &guard))
        };

        for offset in &outcome.alerts {
            log_info!("countdown {}: {}s pre-alert reached", task.id, offset);
        }
        if outcome.triggered {
            log_info!("countdown {} triggered at {}", task.id, task.clock.now());
            task.cue_guard.fire(task.id, &task.alarm.options, task.tone, task.cues.as_ref());
        }

        task.snapshots.send_replace(snapshot);

        if outcome.completed {
            if let Some(callback) = &task.on_complete {
                callback();
            }
        }
        if outcome.finished {
            log_debug!("countdown {} ticker finished", task.id);
            break;
        }
    }
}

async fn calculation_task(
    id: Uuid,
    request: IntervalRequest,
    calculator: Arc<dyn IntervalCalculator>,
    state: Arc<Mutex<CountdownState>>,
    snapshots: Arc<watch::Sender<CountdownSnapshot>>,
    cancel_token: CancellationToken,
) {
    let result = tokio::select! {
        biased;
        _ = cancel_token.cancelled() => return,
        result = calculator.calculate(&request) => result,
    };

    let result = match result {
        Ok(result) => {
            log_info!(
                "countdown {}: optimal refresh time {} (interval {}ms)",
                id,
                result.optimal_refresh_time,
                result.refresh_interval
            );
            Some(result)
        }
        Err(err) => {
            log_error!("countdown {}: interval calculation failed: {}", id, err);
            None
        }
    };

    let snapshot = {
        let mut guard = state.lock().await;
        guard.complete_calculation(result);
        CountdownSnapshot::of(id, &guard)
    };
    snapshots.send_replace(snapshot);
}

impl std::fmt::Debug for CountdownController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownController")
            .field("id", &self.id)
            .field("alarm", &self.alarm)
            .field("interval_mode", &(self.alarm.options.strategy() == AlertStrategy::Interval))
            .finish()
    }
}

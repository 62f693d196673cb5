pub mod alarm;
pub mod audio;
pub mod cli;
pub mod clock;
pub mod compare;
pub mod countdown;
pub mod cue;
pub mod host;
pub mod interval;
pub mod settings;
pub mod sites;
mod utils;

#[cfg(test)]
mod test_support;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use alarm::ModalOutcome;
use audio::ToneEngine;
use cli::Cli;
use clock::{Clock, SystemClock};
use compare::{ServerClock, TimeCompareClient};
use countdown::{CountdownContext, CountdownPhase};
use cue::TerminalCues;
use host::ResultView;
use interval::{HttpIntervalClient, IntervalCalculator};
use settings::{Settings, SettingsStore};
use sites::SiteSearchClient;

/// How often the live server clock is redrawn.
const SERVER_CLOCK_REFRESH: Duration = Duration::from_millis(10);

/// The target server's clock, shown next to the countdown.
struct LiveServerTime {
    host: String,
    clock: Arc<ServerClock>,
}

impl LiveServerTime {
    fn render(&self, countdown: &str) -> String {
        format!("{} {} | {}", self.host, self.clock.display_now(), countdown)
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    // RUST_LOG still narrows individual modules
    let level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();

    info!("servertime-alarm starting up...");

    let store = SettingsStore::new(cli.settings.clone())?;
    let settings = store.settings();

    let final_url = match cli.url.as_deref() {
        Some(input) => {
            let sites = SiteSearchClient::new(&settings.api_base, &settings.sites_search_path);
            let url = sites
                .resolve(input)
                .await
                .with_context(|| format!("could not resolve \"{}\" to a site", input.trim()))?;
            Some(url)
        }
        None => None,
    };

    let (clock, live) = resolve_clock(&cli, final_url.as_deref(), &settings).await?;

    let draft = cli.draft();
    let outcome = draft
        .confirm(clock.now(), final_url.as_deref())
        .context("alarm rejected")?;
    let ModalOutcome::Confirmed(alarm) = outcome else {
        return Ok(());
    };

    let calculator: Arc<dyn IntervalCalculator> =
        Arc::new(HttpIntervalClient::new(&settings.api_base, &settings.interval_path));
    let ctx = CountdownContext::from_settings(
        &settings,
        clock,
        Arc::new(TerminalCues::new(ToneEngine::new())),
        Some(calculator),
    );

    let mut view = ResultView::new(final_url, ctx);
    view.set_alarm(alarm, Some(Box::new(|| info!("countdown reached zero"))))
        .await?;

    let mut snapshots = match view.countdown() {
        Some(countdown) => countdown.subscribe(),
        None => bail!("alarm was not mounted"),
    };

    let render = |display: &str| match &live {
        Some(live) => live.render(display),
        None => display.to_string(),
    };

    let mut redraw = tokio::time::interval(SERVER_CLOCK_REFRESH);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stdout = std::io::stdout();
    loop {
        let display = snapshots.borrow_and_update().display.clone();
        write!(stdout, "\r{:<72}", render(&display))?;
        stdout.flush()?;

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = redraw.tick(), if live.is_some() => {}
            _ = tokio::signal::ctrl_c() => {
                writeln!(stdout)?;
                info!("interrupted, removing alarm");
                view.delete_alarm().await;
                return Ok(());
            }
        }
    }

    let last = snapshots.borrow().clone();
    writeln!(stdout, "\r{:<72}", render(&last.display))?;

    if last.phase == CountdownPhase::Triggered {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cli.hold_secs)) => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }

    view.delete_alarm().await;
    Ok(())
}

async fn resolve_clock(
    cli: &Cli,
    final_url: Option<&str>,
    settings: &Settings,
) -> Result<(Arc<dyn Clock>, Option<LiveServerTime>)> {
    let system: Arc<dyn Clock> = Arc::new(SystemClock);
    if !cli.server_clock {
        return Ok((system, None));
    }

    let Some(url) = final_url else {
        bail!("--server-clock needs --url");
    };

    let client = TimeCompareClient::new(&settings.api_base, &settings.compare_path);
    let reading = match client.compare(url).await {
        Ok(reading) => reading,
        Err(err) => {
            warn!("server time comparison failed ({err}); using the local clock");
            return Ok((system, None));
        }
    };

    if let Some(summary) = reading.describe() {
        info!("{summary}");
    }
    info!("{}", reading.network_summary());

    let Some(clock) = ServerClock::from_reading(system.clone(), &reading) else {
        warn!("{} reported no server time; using the local clock", reading.host());
        return Ok((system, None));
    };
    let offset_ms = clock.offset().num_milliseconds();
    info!("counting down on {} time (offset {}ms)", reading.host(), offset_ms);

    let clock = Arc::new(clock);
    let live = LiveServerTime {
        host: reading.host(),
        clock: clock.clone(),
    };
    let clock: Arc<dyn Clock> = clock;
    Ok((clock, Some(live)))
}

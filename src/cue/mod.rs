//! Side effects fired when a countdown triggers: the tone and the alert
//! background. The controller decides *when*; implementations decide *how*.

use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::audio::{Tone, ToneEngine};

const ALERT_BACKGROUND: &str = "\x1b[41m\x1b[2J\x1b[H";
const RESET_BACKGROUND: &str = "\x1b[0m\x1b[2J\x1b[H";

pub trait CueSink: Send + Sync {
    fn play_tone(&self, tone: Tone) -> Result<()>;

    fn stop_tone(&self) -> Result<()>;

    /// `true` switches to the alert color, `false` restores the default.
    fn set_alert_background(&self, on: bool) -> Result<()>;
}

/// Plays tones through the audio thread and paints the terminal background.
pub struct TerminalCues {
    engine: ToneEngine,
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalCues {
    pub fn new(engine: ToneEngine) -> Self {
        Self::with_writer(engine, Box::new(io::stdout()))
    }

    pub fn with_writer(engine: ToneEngine, out: Box<dyn Write + Send>) -> Self {
        Self {
            engine,
            out: Mutex::new(out),
        }
    }
}

impl CueSink for TerminalCues {
    fn play_tone(&self, tone: Tone) -> Result<()> {
        self.engine.play(tone).map_err(|e| anyhow!(e))
    }

    fn stop_tone(&self) -> Result<()> {
        self.engine.stop().map_err(|e| anyhow!(e))
    }

    fn set_alert_background(&self, on: bool) -> Result<()> {
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        out.write_all(if on { ALERT_BACKGROUND } else { RESET_BACKGROUND }.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

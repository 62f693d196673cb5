use chrono::{DateTime, Duration as ChronoDuration, Local};

/// Wall-clock source for countdowns.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Wall clock that advances with tokio's clock from a fixed starting instant.
///
/// Under a paused runtime the countdown's ticks and its notion of "now" move
/// together, which makes timing scenarios exact.
#[derive(Debug, Clone)]
pub struct AnchoredClock {
    base: DateTime<Local>,
    anchor: tokio::time::Instant,
}

impl AnchoredClock {
    pub fn starting_at(base: DateTime<Local>) -> Self {
        Self {
            base,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = self.anchor.elapsed();
        self.base + ChronoDuration::from_std(elapsed).unwrap_or(ChronoDuration::zero())
    }
}

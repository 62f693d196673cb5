use rodio::Source;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;
/// Linear fade at both ends, keeps the cut from clicking.
const FADE_SECS: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_ms: u64,
    pub volume: f32,
}

impl Default for Tone {
    fn default() -> Self {
        Self {
            frequency_hz: 880.0,
            duration_ms: 600,
            volume: 0.4,
        }
    }
}

/// Fixed-frequency sine beep of finite length.
pub struct AlertTone {
    frequency: f32,
    amplitude: f32,
    num_sample: usize,
    total_samples: usize,
    fade_samples: usize,
}

impl AlertTone {
    pub fn new(tone: Tone) -> Self {
        let total_samples = (SAMPLE_RATE as u64 * tone.duration_ms / 1000) as usize;
        let fade_samples = ((SAMPLE_RATE as f32 * FADE_SECS) as usize).min(total_samples / 2);
        Self {
            frequency: tone.frequency_hz,
            amplitude: tone.volume.clamp(0.0, 1.0),
            num_sample: 0,
            total_samples,
            fade_samples,
        }
    }

    fn envelope(&self) -> f32 {
        if self.fade_samples == 0 {
            return 1.0;
        }
        let from_end = self.total_samples - self.num_sample;
        let edge = self.num_sample.min(from_end);
        (edge as f32 / self.fade_samples as f32).min(1.0)
    }
}

impl Iterator for AlertTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let value = (2.0 * PI * self.frequency * t).sin() * self.amplitude * self.envelope();
        self.num_sample += 1;
        Some(value)
    }
}

impl Source for AlertTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_nanos(
            self.total_samples as u64 * 1_000_000_000 / SAMPLE_RATE as u64,
        ))
    }
}

//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use chrono::{DateTime, Local, Utc};

use crate::audio::Tone;
use crate::cue::CueSink;
use crate::interval::{
    IntervalCalculationResult, IntervalCalculator, IntervalError, IntervalRequest,
};

/// Serves exactly one HTTP response on an ephemeral port.
///
/// Returns the base URL and a receiver that yields the raw request text
/// (head and body) once the response has been written.
pub async fn serve_once(status: u16, body: &'static str) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let raw = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            reason(status),
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        let _ = tx.send(raw);
    });

    (format!("http://{addr}"), rx)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let text = String::from_utf8_lossy(&buf);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Status",
    }
}

/// Cue sink that only counts what it was asked to do.
#[derive(Default)]
pub struct RecordingCues {
    tones: AtomicUsize,
    stops: AtomicUsize,
    backgrounds: Mutex<Vec<bool>>,
}

impl RecordingCues {
    pub fn tones(&self) -> usize {
        self.tones.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn backgrounds(&self) -> Vec<bool> {
        self.backgrounds.lock().unwrap().clone()
    }
}

impl CueSink for RecordingCues {
    fn play_tone(&self, _tone: Tone) -> anyhow::Result<()> {
        self.tones.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop_tone(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_alert_background(&self, on: bool) -> anyhow::Result<()> {
        self.backgrounds.lock().unwrap().push(on);
        Ok(())
    }
}

/// Calculator that answers after a fixed delay on tokio's clock.
pub struct ScriptedCalculator {
    delay: Duration,
    outcome: Option<IntervalCalculationResult>,
    calls: AtomicUsize,
    last_request: Mutex<Option<IntervalRequest>>,
}

impl ScriptedCalculator {
    pub fn succeeding(delay: Duration, result: IntervalCalculationResult) -> Self {
        Self {
            delay,
            outcome: Some(result),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(delay: Duration) -> Self {
        Self {
            delay,
            outcome: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<IntervalRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IntervalCalculator for ScriptedCalculator {
    async fn calculate(
        &self,
        request: &IntervalRequest,
    ) -> Result<IntervalCalculationResult, IntervalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        tokio::time::sleep(self.delay).await;
        self.outcome
            .clone()
            .ok_or_else(|| IntervalError::Rejected("scripted failure".into()))
    }
}

pub fn interval_result(refresh_at: DateTime<Local>) -> IntervalCalculationResult {
    IntervalCalculationResult {
        optimal_refresh_time: refresh_at.with_timezone(&Utc),
        refresh_interval: 250.0,
        alert_settings: Vec::new(),
        confidence: 0.9,
        network_analysis: serde_json::Value::Null,
    }
}

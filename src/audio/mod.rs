pub mod tone;

pub use tone::{AlertTone, Tone};

use rodio::{OutputStream, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;

enum AudioCommand {
    Play(Tone),
    Stop,
}

/// Handle to the audio thread that plays alarm tones.
///
/// `rodio`'s output stream is not `Send`, so it lives on a dedicated thread
/// started on first use; the handle only sends commands to it.
#[derive(Clone)]
pub struct ToneEngine {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl Default for ToneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneEngine {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("alarm-audio".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;

                fn ensure_sink(
                    stream: &mut Option<OutputStream>,
                    sink: &mut Option<Sink>,
                ) -> Result<(), String> {
                    if sink.is_none() {
                        let (s, handle) = OutputStream::try_default()
                            .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                        let new_sink = Sink::try_new(&handle)
                            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                        *stream = Some(s);
                        *sink = Some(new_sink);
                    }
                    Ok(())
                }

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play(tone) => {
                            if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                log::error!("{err}");
                                continue;
                            }
                            if let Some(ref s) = sink {
                                s.append(AlertTone::new(tone));
                                s.play();
                            }
                        }
                        AudioCommand::Stop => {
                            if let Some(s_old) = sink.take() {
                                s_old.stop();
                            }
                            _stream = None;
                        }
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    pub fn play(&self, tone: Tone) -> Result<(), String> {
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Play(tone)).map_err(|e| e.to_string())
    }

    /// Cuts any tone still sounding. A no-op when nothing was ever played.
    pub fn stop(&self) -> Result<(), String> {
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_without_play_leaves_audio_thread_unstarted() {
        let engine = ToneEngine::new();
        assert!(engine.stop().is_ok());
        assert!(engine.tx.lock().unwrap().is_none());

        let shared = engine.clone();
        assert!(shared.stop().is_ok());
        assert!(Arc::ptr_eq(&engine.tx, &shared.tx));
    }
}

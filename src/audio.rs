//! Audio output: a single rodio sink driven from its own thread
//!
//! The playback state machine talks to the [`AudioOutput`] trait only. The
//! rodio-backed [`AudioBackend`] downloads the song file, decodes it and plays
//! it, reporting progress back on an [`AudioEventChannel`]. Every load carries a
//! `load_id`; events always name the load they belong to.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use rodio::{Decoder, OutputStreamBuilder, Sink, Source};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const DEFAULT_VOLUME: f32 = 0.5;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Clone, Debug, PartialEq)]
pub enum AudioEvent {
    /// Enough data is buffered to start ("can play")
    Ready { load_id: u64, duration: Option<Duration> },
    /// Output started; sent again after a seek while playing
    Playing { load_id: u64 },
    Ended { load_id: u64 },
    Failed { load_id: u64, reason: String },
}

impl AudioEvent {
    pub fn load_id(&self) -> u64 {
        match self {
            AudioEvent::Ready { load_id, .. }
            | AudioEvent::Playing { load_id }
            | AudioEvent::Ended { load_id }
            | AudioEvent::Failed { load_id, .. } => *load_id,
        }
    }
}

pub type AudioEventChannel = mpsc::UnboundedReceiver<AudioEvent>;

/// The single audio resource. Only the playback controller calls these.
pub trait AudioOutput: Send {
    /// Stop whatever is playing and start fetching `url`
    fn load(&mut self, load_id: u64, url: &str);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
    fn seek(&mut self, position: Duration);
    /// 0.0 ..= 1.0
    fn set_volume(&mut self, volume: f32);
    fn position(&self) -> Duration;
}

enum Command {
    Load { load_id: u64, bytes: Vec<u8> },
    Play,
    Pause,
    Stop,
    Seek(Duration),
    Volume(f32),
    Shutdown,
}

pub struct AudioBackend {
    commands: std_mpsc::Sender<Command>,
    events: mpsc::UnboundedSender<AudioEvent>,
    position_ms: Arc<AtomicU64>,
    latest_load: Arc<AtomicU64>,
    http: reqwest::Client,
    download: Option<JoinHandle<()>>,
}

impl AudioBackend {
    /// Open the default output device and start the output thread
    pub fn new(connect_timeout: Duration) -> Result<(Self, AudioEventChannel)> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = std_mpsc::channel();
        let (opened_tx, opened_rx) = std_mpsc::channel();
        let position_ms = Arc::new(AtomicU64::new(0));
        let latest_load = Arc::new(AtomicU64::new(0));

        let thread_events = event_tx.clone();
        let thread_position = position_ms.clone();
        let thread_latest = latest_load.clone();
        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                run_output(command_rx, thread_events, thread_position, thread_latest, opened_tx)
            })
            .context("Failed to spawn audio thread")?;

        opened_rx
            .recv()
            .context("Audio thread exited during startup")?
            .map_err(|e| anyhow::anyhow!("Failed to open audio output: {}", e))?;

        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .context("Failed to build download client")?;

        tracing::info!("Audio output ready");
        Ok((
            Self {
                commands: command_tx,
                events: event_tx,
                position_ms,
                latest_load,
                http,
                download: None,
            },
            event_rx,
        ))
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            tracing::error!("Audio thread is gone, command dropped");
        }
    }
}

impl AudioOutput for AudioBackend {
    fn load(&mut self, load_id: u64, url: &str) {
        self.latest_load.store(load_id, Ordering::SeqCst);
        self.send(Command::Stop);
        if let Some(download) = self.download.take() {
            download.abort();
        }

        let http = self.http.clone();
        let url = url.to_string();
        let commands = self.commands.clone();
        let events = self.events.clone();
        let latest_load = self.latest_load.clone();

        self.download = Some(tokio::spawn(async move {
            tracing::debug!(load_id, url = %url, "Downloading audio");
            match fetch_bytes(&http, &url).await {
                Ok(bytes) => {
                    if latest_load.load(Ordering::SeqCst) == load_id {
                        let _ = commands.send(Command::Load { load_id, bytes });
                    }
                }
                Err(e) => {
                    tracing::error!(load_id, error = %e, "Audio download failed");
                    let _ = events.send(AudioEvent::Failed {
                        load_id,
                        reason: e.to_string(),
                    });
                }
            }
        }));
    }

    fn play(&mut self) {
        self.send(Command::Play);
    }

    fn pause(&mut self) {
        self.send(Command::Pause);
    }

    fn stop(&mut self) {
        self.latest_load.store(0, Ordering::SeqCst);
        if let Some(download) = self.download.take() {
            download.abort();
        }
        self.send(Command::Stop);
    }

    fn seek(&mut self, position: Duration) {
        self.position_ms
            .store(position.as_millis() as u64, Ordering::SeqCst);
        self.send(Command::Seek(position));
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(Command::Volume(volume.clamp(0.0, 1.0)));
    }

    fn position(&self) -> Duration {
        Duration::from_millis(self.position_ms.load(Ordering::SeqCst))
    }
}

impl Drop for AudioBackend {
    fn drop(&mut self) {
        if let Some(download) = self.download.take() {
            download.abort();
        }
        let _ = self.commands.send(Command::Shutdown);
    }
}

async fn fetch_bytes(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = http.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

fn run_output(
    commands: std_mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<AudioEvent>,
    position_ms: Arc<AtomicU64>,
    latest_load: Arc<AtomicU64>,
    opened: std_mpsc::Sender<Result<(), String>>,
) {
    let mut stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => {
            let _ = opened.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = opened.send(Err(e.to_string()));
            return;
        }
    };
    stream.log_on_drop(false);

    let mut volume = DEFAULT_VOLUME;
    let mut sink = Sink::connect_new(stream.mixer());
    sink.set_volume(volume);
    let mut current: Option<u64> = None;
    let mut paused = true;

    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(Command::Load { load_id, bytes }) => {
                if latest_load.load(Ordering::SeqCst) != load_id {
                    tracing::debug!(load_id, "Ignoring superseded audio load");
                    continue;
                }
                sink.stop();
                sink = Sink::connect_new(stream.mixer());
                sink.set_volume(volume);
                sink.pause();
                paused = true;
                position_ms.store(0, Ordering::SeqCst);

                match Decoder::new(Cursor::new(bytes)) {
                    Ok(source) => {
                        let duration = source.total_duration();
                        sink.append(source);
                        current = Some(load_id);
                        let _ = events.send(AudioEvent::Ready { load_id, duration });
                    }
                    Err(e) => {
                        current = None;
                        let _ = events.send(AudioEvent::Failed {
                            load_id,
                            reason: format!("cannot decode audio: {}", e),
                        });
                    }
                }
            }
            Ok(Command::Play) => {
                if let Some(load_id) = current {
                    sink.play();
                    paused = false;
                    let _ = events.send(AudioEvent::Playing { load_id });
                }
            }
            Ok(Command::Pause) => {
                sink.pause();
                paused = true;
            }
            Ok(Command::Stop) => {
                sink.stop();
                sink = Sink::connect_new(stream.mixer());
                sink.set_volume(volume);
                current = None;
                paused = true;
                position_ms.store(0, Ordering::SeqCst);
            }
            Ok(Command::Seek(position)) => {
                if let Some(load_id) = current {
                    if let Err(e) = sink.try_seek(position) {
                        tracing::warn!(error = %e, "Seek failed");
                    } else if !paused {
                        let _ = events.send(AudioEvent::Playing { load_id });
                    }
                }
            }
            Ok(Command::Volume(v)) => {
                volume = v;
                sink.set_volume(v);
            }
            Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        if let Some(load_id) = current {
            position_ms.store(sink.get_pos().as_millis() as u64, Ordering::SeqCst);
            if !paused && sink.empty() {
                current = None;
                paused = true;
                let _ = events.send(AudioEvent::Ended { load_id });
            }
        }
    }

    tracing::debug!("Audio thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_name_their_load() {
        let events = [
            AudioEvent::Ready { load_id: 3, duration: None },
            AudioEvent::Playing { load_id: 3 },
            AudioEvent::Ended { load_id: 3 },
            AudioEvent::Failed { load_id: 3, reason: "404".into() },
        ];
        assert!(events.iter().all(|e| e.load_id() == 3));
    }
}

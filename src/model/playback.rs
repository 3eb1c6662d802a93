//! Playback session and the state machine that drives the audio output
//!
//! States: `Idle -> Loading -> Playing <-> Paused -> Ended`. Each external event
//! (song selected, page reloaded, transport key, audio signal) maps to one
//! method here. Only this type touches the [`AudioOutput`].

use std::time::Duration;

use serde_json::json;

use crate::audio::{AudioEvent, AudioOutput, DEFAULT_VOLUME};
use crate::backend::{Backend, Filter, decode_single};
use crate::error::AppError;

use super::types::{SONGS_TABLE, Song};

pub const VOLUME_STEP: f32 = 0.05;
pub const SEEK_STEP: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
}

/// The one loaded (or selected) song and its transient progress
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackSession {
    pub song: Option<Song>,
    pub state: PlaybackState,
    pub load_id: u64,
    /// Set once the play count for this load has been sent
    pub play_count_credited: bool,
    pub elapsed: Duration,
    pub duration: Option<Duration>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            song: None,
            state: PlaybackState::Idle,
            load_id: 0,
            play_count_credited: false,
            elapsed: Duration::ZERO,
            duration: None,
        }
    }
}

impl PlaybackSession {
    pub fn song_id(&self) -> Option<i64> {
        self.song.as_ref().map(|s| s.id)
    }
}

/// A play-count increment to send for the song that just started
#[derive(Clone, Debug, PartialEq)]
pub struct PlayCredit {
    pub song_id: i64,
    pub known_play_count: u64,
}

/// What the controller has to follow up on after an audio event
#[derive(Clone, Debug, PartialEq)]
pub enum PlaybackEffect {
    Nothing,
    CreditPlay(PlayCredit),
    /// The song ended and the next one on the page was selected
    Advanced { from: i64, to: Option<i64> },
    Failed(String),
}

/// Snapshot of playback for rendering
#[derive(Clone, Debug)]
pub struct PlaybackInfo {
    pub song: Option<Song>,
    pub state: PlaybackState,
    pub elapsed: Duration,
    pub duration: Option<Duration>,
    pub volume: f32,
}

impl PlaybackInfo {
    pub fn volume_percent(&self) -> u8 {
        (self.volume * 100.0).round() as u8
    }
}

pub struct Playback {
    output: Box<dyn AudioOutput>,
    session: PlaybackSession,
    volume: f32,
    last_load_id: u64,
}

impl Playback {
    pub fn new(mut output: Box<dyn AudioOutput>) -> Self {
        output.set_volume(DEFAULT_VOLUME);
        Self {
            output,
            session: PlaybackSession::default(),
            volume: DEFAULT_VOLUME,
            last_load_id: 0,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    pub fn current_song_id(&self) -> Option<i64> {
        self.session.song_id()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn info(&self) -> PlaybackInfo {
        PlaybackInfo {
            song: self.session.song.clone(),
            state: self.session.state,
            elapsed: self.session.elapsed,
            duration: self.session.duration,
            volume: self.volume,
        }
    }

    fn set_state(&mut self, to: PlaybackState) {
        if self.session.state != to {
            tracing::debug!(
                song_id = ?self.session.song_id(),
                load_id = self.session.load_id,
                from = ?self.session.state,
                to = ?to,
                "Playback transition"
            );
        }
        self.session.state = to;
    }

    /// Select `song_id` from `page`. Re-selecting the song that is already
    /// loading, playing or paused does nothing.
    pub fn select(&mut self, song_id: i64, page: &[Song]) -> bool {
        let Some(song) = page.iter().find(|s| s.id == song_id) else {
            tracing::warn!(song_id, "Selected song is not on the current page");
            return false;
        };

        let active = matches!(
            self.session.state,
            PlaybackState::Loading | PlaybackState::Playing | PlaybackState::Paused
        );
        if active && self.session.song_id() == Some(song_id) {
            return false;
        }

        self.enter_loading(song.clone());
        true
    }

    fn enter_loading(&mut self, song: Song) {
        self.output.stop();
        self.last_load_id += 1;
        let load_id = self.last_load_id;

        tracing::info!(song_id = song.id, title = %song.title, load_id, "Loading song");
        self.output.load(load_id, &song.file_url);
        self.session = PlaybackSession {
            song: Some(song),
            state: self.session.state,
            load_id,
            play_count_credited: false,
            elapsed: Duration::ZERO,
            duration: None,
        };
        self.set_state(PlaybackState::Loading);
    }

    /// The catalog page was replaced. A selected song still on the page is
    /// reloaded; otherwise output stops and the selection is kept for display.
    pub fn page_reloaded(&mut self, page: &[Song]) {
        let Some(song_id) = self.session.song_id() else {
            return;
        };

        match page.iter().find(|s| s.id == song_id) {
            Some(song) => self.enter_loading(song.clone()),
            None => {
                self.output.stop();
                self.session.play_count_credited = false;
                self.session.elapsed = Duration::ZERO;
                self.session.duration = None;
                self.set_state(PlaybackState::Idle);
            }
        }
    }

    pub fn handle_event(&mut self, event: AudioEvent, page: &[Song]) -> PlaybackEffect {
        if event.load_id() != self.session.load_id || self.session.song.is_none() {
            tracing::trace!(load_id = event.load_id(), "Ignoring audio event for an old load");
            return PlaybackEffect::Nothing;
        }

        match event {
            AudioEvent::Ready { duration, .. } => {
                if duration.is_some() {
                    self.session.duration = duration;
                }
                if self.session.state == PlaybackState::Loading {
                    self.output.play();
                    self.set_state(PlaybackState::Playing);
                }
                PlaybackEffect::Nothing
            }
            AudioEvent::Playing { .. } => self.credit_play(),
            AudioEvent::Ended { .. } => {
                if !matches!(self.session.state, PlaybackState::Playing | PlaybackState::Paused) {
                    return PlaybackEffect::Nothing;
                }
                let from = self.session.song_id().unwrap_or_default();
                if let Some(duration) = self.session.duration {
                    self.session.elapsed = duration;
                }
                self.session.play_count_credited = false;
                self.set_state(PlaybackState::Ended);

                let to = self.play_next(page);
                PlaybackEffect::Advanced { from, to }
            }
            AudioEvent::Failed { reason, .. } => {
                tracing::error!(song_id = ?self.session.song_id(), reason = %reason, "Playback failed");
                self.output.stop();
                self.session.elapsed = Duration::ZERO;
                self.set_state(PlaybackState::Idle);
                PlaybackEffect::Failed(reason)
            }
        }
    }

    /// At most one credit per load, however many times the output reports it started
    fn credit_play(&mut self) -> PlaybackEffect {
        let started = matches!(self.session.state, PlaybackState::Playing | PlaybackState::Paused);
        if !started || self.session.play_count_credited {
            return PlaybackEffect::Nothing;
        }
        let Some(song) = &self.session.song else {
            return PlaybackEffect::Nothing;
        };

        self.session.play_count_credited = true;
        PlaybackEffect::CreditPlay(PlayCredit {
            song_id: song.id,
            known_play_count: song.play_count,
        })
    }

    pub fn pause(&mut self) -> bool {
        if self.session.state != PlaybackState::Playing {
            return false;
        }
        self.output.pause();
        self.set_state(PlaybackState::Paused);
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.session.state != PlaybackState::Paused {
            return false;
        }
        self.output.play();
        self.set_state(PlaybackState::Playing);
        true
    }

    pub fn toggle_pause(&mut self) -> bool {
        match self.session.state {
            PlaybackState::Playing => self.pause(),
            PlaybackState::Paused => self.resume(),
            _ => false,
        }
    }

    /// Select the following song on the page, wrapping to the first
    pub fn play_next(&mut self, page: &[Song]) -> Option<i64> {
        self.step(page, 1)
    }

    /// Select the preceding song on the page, wrapping to the last
    pub fn play_previous(&mut self, page: &[Song]) -> Option<i64> {
        self.step(page, -1)
    }

    fn step(&mut self, page: &[Song], offset: isize) -> Option<i64> {
        let current = self.session.song_id()?;
        let index = page.iter().position(|s| s.id == current)?;
        let len = page.len() as isize;
        let target = ((index as isize + offset + len) % len) as usize;
        let target_id = page[target].id;
        self.select(target_id, page);
        Some(target_id)
    }

    /// Jump to `position`; play/pause state is unchanged
    pub fn seek(&mut self, position: Duration) -> bool {
        if !matches!(self.session.state, PlaybackState::Playing | PlaybackState::Paused) {
            return false;
        }
        let position = match self.session.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
        self.session.elapsed = position;
        self.output.seek(position);
        true
    }

    pub fn seek_forward(&mut self) -> bool {
        self.seek(self.session.elapsed + SEEK_STEP)
    }

    pub fn seek_backward(&mut self) -> bool {
        self.seek(self.session.elapsed.saturating_sub(SEEK_STEP))
    }

    /// Kept across song changes
    pub fn set_volume(&mut self, volume: f32) {
        let volume = (volume.clamp(0.0, 1.0) * 100.0).round() / 100.0;
        self.volume = volume;
        self.output.set_volume(volume);
    }

    pub fn volume_up(&mut self) {
        self.set_volume(self.volume + VOLUME_STEP);
    }

    pub fn volume_down(&mut self) {
        self.set_volume(self.volume - VOLUME_STEP);
    }

    /// Called once per rendered frame
    pub fn tick(&mut self) {
        if self.session.state != PlaybackState::Playing {
            return;
        }
        let position = self.output.position();
        self.session.elapsed = match self.session.duration {
            Some(duration) => position.min(duration),
            None => position,
        };
    }

    /// Refresh the cached row of the current song without reloading it
    pub fn update_song(&mut self, song: &Song) {
        if let Some(current) = self.session.song.as_mut().filter(|s| s.id == song.id) {
            *current = song.clone();
        }
    }
}

/// Send the play-count increment for `credit` and return the row the backend now holds
pub async fn record_play(backend: &dyn Backend, credit: &PlayCredit) -> Result<Song, AppError> {
    let rows = backend
        .update(
            SONGS_TABLE,
            json!({ "play_count": credit.known_play_count + 1 }),
            &[Filter::eq("id", credit.song_id)],
        )
        .await?;
    let song: Song = decode_single(rows, "song")?;
    tracing::info!(song_id = song.id, play_count = song.play_count, "Play counted");
    Ok(song)
}

//! Audio event listener

use crate::audio::{AudioEvent, AudioEventChannel};
use crate::model::PlaybackEffect;
use super::AppController;

impl AppController {
    pub fn start_audio_event_listener(&self, mut events: AudioEventChannel) {
        let controller = self.clone();
        tracing::info!("Starting audio event listener");

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if controller.model.lock().await.should_quit() {
                    tracing::debug!("Audio event listener shutting down");
                    break;
                }
                controller.handle_audio_event(event).await;
            }
        });
    }

    pub(crate) async fn handle_audio_event(&self, event: AudioEvent) {
        tracing::trace!(?event, "Audio event");
        let effect = self.model.lock().await.handle_audio_event(event);

        match effect {
            PlaybackEffect::CreditPlay(credit) => {
                let controller = self.clone();
                self.spawn_background("credit_play", async move {
                    controller.credit_play(credit).await;
                });
            }
            PlaybackEffect::Advanced { from, to } => {
                tracing::info!(from, to = ?to, "Song ended, advancing");
            }
            PlaybackEffect::Failed(_) | PlaybackEffect::Nothing => {}
        }
    }
}

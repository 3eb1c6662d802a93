//! Playback control methods

use crate::model::{PlayCredit, record_play};

use super::AppController;

impl AppController {
    pub async fn play_selected(&self) {
        let mut model = self.model.lock().await;
        if model.play_selected() {
            tracing::info!(song_id = ?model.playback().current_song_id(), "Song selected");
        }
    }

    pub async fn toggle_playback(&self) {
        let mut model = self.model.lock().await;
        if model.toggle_pause() {
            tracing::info!(state = ?model.playback().state(), "Playback toggled");
        }
    }

    pub async fn next_track(&self) {
        let mut model = self.model.lock().await;
        if model.play_next().is_none() {
            tracing::debug!("Next track is a no-op: current song is not in the play context");
        }
    }

    pub async fn previous_track(&self) {
        let mut model = self.model.lock().await;
        if model.play_previous().is_none() {
            tracing::debug!("Previous track is a no-op: current song is not in the play context");
        }
    }

    pub async fn seek_forward(&self) {
        self.model.lock().await.seek_forward();
    }

    pub async fn seek_backward(&self) {
        self.model.lock().await.seek_backward();
    }

    pub async fn volume_up(&self) {
        self.model.lock().await.volume_up();
    }

    pub async fn volume_down(&self) {
        self.model.lock().await.volume_down();
    }

    /// Send the play-count increment and put the backend's row in place
    pub(crate) async fn credit_play(&self, credit: PlayCredit) {
        tracing::debug!(song_id = credit.song_id, "Crediting play");
        match record_play(self.backend.as_ref(), &credit).await {
            Ok(song) => self.model.lock().await.apply_song_update(&song),
            Err(e) => self.report("record_play", &e).await,
        }
    }

    pub async fn toggle_like_selected(&self) {
        let (song, currently_liked) = {
            let model = self.model.lock().await;
            let Some(song) = model.selected_song() else {
                return;
            };
            let liked = model.is_liked(song.id);
            (song, liked)
        };

        tracing::debug!(song_id = song.id, currently_liked, "Toggling like");
        let result = async {
            let user = self.session_user().await?;
            self.likes.toggle_like(user.as_ref(), &song, currently_liked).await
        }
        .await;
        let liked = self.likes.snapshot().await;

        let mut model = self.model.lock().await;
        model.set_liked(liked);
        match result {
            Ok(outcome) => {
                if let Some(updated) = &outcome.updated_song {
                    model.apply_song_update(updated);
                }
            }
            Err(e) => {
                drop(model);
                self.report("toggle_like", &e).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::audio::AudioEvent;
    use crate::backend::memory::{MemoryBackend, Op};
    use crate::controller::tests::controller;
    use crate::model::{PlaybackEffect, SONGS_TABLE};
    use serde_json::json;

    #[tokio::test]
    async fn liking_updates_row_and_set() {
        let backend = MemoryBackend::new();
        backend.seed_songs(5);
        let controller = controller(&backend).await;
        let song = controller.model.lock().await.selected_song().unwrap();

        controller.toggle_like_selected().await;
        {
            let model = controller.model.lock().await;
            assert!(model.is_liked(song.id));
            assert_eq!(
                model.current_page().song(song.id).unwrap().likes_count,
                song.likes_count + 1
            );
        }

        controller.toggle_like_selected().await;
        let model = controller.model.lock().await;
        assert!(!model.is_liked(song.id));
        assert_eq!(model.current_page().song(song.id).unwrap().likes_count, song.likes_count);
    }

    #[tokio::test]
    async fn counter_failure_is_shown_and_membership_kept() {
        let backend = MemoryBackend::new();
        backend.seed_songs(5);
        let controller = controller(&backend).await;
        backend.fail(SONGS_TABLE, Op::Update);

        controller.toggle_like_selected().await;

        let model = controller.model.lock().await;
        let song = model.selected_song().unwrap();
        assert!(model.is_liked(song.id));
        assert!(model.has_notice());
        assert_eq!(backend.rows("user_liked_songs").len(), 1);
    }

    #[tokio::test]
    async fn play_credit_overwrites_cached_row() {
        let backend = MemoryBackend::new();
        backend.seed_songs(3);
        let controller = controller(&backend).await;
        controller.play_selected().await;

        let effect = {
            let mut model = controller.model.lock().await;
            let load_id = model.playback().session().load_id;
            model.handle_audio_event(AudioEvent::Ready { load_id, duration: None });
            model.handle_audio_event(AudioEvent::Playing { load_id })
        };
        let PlaybackEffect::CreditPlay(credit) = effect else {
            panic!("expected a play credit");
        };
        controller.credit_play(credit.clone()).await;

        let model = controller.model.lock().await;
        let cached = model.current_page().song(credit.song_id).unwrap();
        assert_eq!(cached.play_count, credit.known_play_count + 1);
        assert_eq!(
            backend.row(SONGS_TABLE, credit.song_id).unwrap()["play_count"],
            json!(credit.known_play_count + 1)
        );
    }
}

//! Controller module - Application logic and event handling
//!
//! The controller turns key presses and audio events into model transitions
//! and runs the backend calls those transitions need. The model lock is never
//! held across a backend request.
//!
//! - `input`: Key event handling
//! - `playback`: transport keys, likes and play counting
//! - `navigation`: catalog pages, search, playlists
//! - `player_events`: audio event listener

mod input;
mod playback;
mod navigation;
mod player_events;

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::backend::{Backend, UserIdentity};
use crate::error::AppError;
use crate::model::{AppModel, CatalogLoader, Library, LikeTracker, PAGE_SIZE};

#[derive(Clone)]
pub struct AppController {
    pub(crate) model: Arc<Mutex<AppModel>>,
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) catalog: CatalogLoader,
    pub(crate) likes: LikeTracker,
    pub(crate) library: Library,
    background: Arc<std::sync::Mutex<Vec<JoinHandle<()>>>>,
}

impl AppController {
    pub fn new(model: Arc<Mutex<AppModel>>, backend: Arc<dyn Backend>) -> Self {
        Self {
            model,
            catalog: CatalogLoader::new(backend.clone(), PAGE_SIZE),
            likes: LikeTracker::new(backend.clone()),
            library: Library::new(backend.clone()),
            backend,
            background: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Run a backend operation off the input path
    pub(crate) fn spawn_background<F>(&self, operation: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::debug!(operation, "Starting background operation");
        let handle = tokio::spawn(task);
        if let Ok(mut tasks) = self.background.lock() {
            tasks.retain(|t| !t.is_finished());
            tasks.push(handle);
        }
    }

    /// Wait for every background operation, including ones started while waiting
    pub async fn finish_background(&self) {
        loop {
            let pending: Vec<JoinHandle<()>> = match self.background.lock() {
                Ok(mut tasks) => tasks.drain(..).collect(),
                Err(_) => return,
            };
            if pending.is_empty() {
                return;
            }
            for result in futures::future::join_all(pending).await {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Background operation panicked or was cancelled");
                }
            }
        }
    }

    /// Log `error` and show it in the notice area
    pub(crate) async fn report(&self, operation: &str, error: &AppError) {
        match error {
            AppError::NotFound(_) => tracing::info!(operation, reason = %error, "Nothing to do"),
            _ => tracing::error!(operation, error = %error, "Operation failed"),
        }
        self.model.lock().await.report(error);
    }

    /// Ask the gateway who is signed in and bring the model in line
    pub(crate) async fn session_user(&self) -> Result<Option<UserIdentity>, AppError> {
        let user = self.backend.current_user().await?;
        let mut model = self.model.lock().await;
        if model.user() != user.as_ref() {
            tracing::info!(
                user_id = ?user.as_ref().map(|u| u.id.as_str()),
                "Session user changed"
            );
            model.set_user(user.clone());
        }
        Ok(user)
    }

    /// Load everything that belongs to the signed-in user
    pub async fn load_user_data(&self) {
        let user = match self.session_user().await {
            Ok(Some(user)) => user,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Could not resolve the session user");
                return;
            }
        };

        match self.library.profile_name(&user).await {
            Ok(label) => self.model.lock().await.set_user_label(label),
            Err(e) => tracing::warn!(error = %e, "Could not load profile"),
        }
        match self.likes.load_liked_songs(Some(&user)).await {
            Ok(liked) => self.model.lock().await.set_liked(liked),
            Err(e) => self.report("load_liked_songs", &e).await,
        }
        self.load_user_playlists().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::AudioOutput;
    use crate::backend::memory::{MemoryBackend, Op};
    use std::time::Duration;

    pub(crate) struct SilentOutput;

    impl AudioOutput for SilentOutput {
        fn load(&mut self, _load_id: u64, _url: &str) {}
        fn play(&mut self) {}
        fn pause(&mut self) {}
        fn stop(&mut self) {}
        fn seek(&mut self, _position: Duration) {}
        fn set_volume(&mut self, _volume: f32) {}
        fn position(&self) -> Duration {
            Duration::ZERO
        }
    }

    /// A controller over `backend` with a signed-in `user-1` and the first page loaded
    pub(crate) async fn controller(backend: &MemoryBackend) -> AppController {
        let user = UserIdentity {
            id: "user-1".into(),
            email: Some("user-1@example.com".into()),
        };
        backend.set_user(Some(user.clone()));
        let mut model = AppModel::new(Box::new(SilentOutput), PAGE_SIZE);
        model.set_user(Some(user));
        let controller = AppController::new(Arc::new(Mutex::new(model)), Arc::new(backend.clone()));
        controller.load_catalog().await;
        controller
    }

    #[tokio::test]
    async fn user_data_is_loaded_after_sign_in() {
        let backend = MemoryBackend::new();
        backend.seed_songs(5);
        backend.seed(
            crate::model::PROFILES_TABLE,
            vec![serde_json::json!({ "id": "user-1", "name": "Ada" })],
        );
        backend.seed(
            "user_liked_songs",
            vec![serde_json::json!({ "user_id": "user-1", "song_id": 3 })],
        );
        let controller = controller(&backend).await;

        controller.load_user_data().await;

        let model = controller.model.lock().await;
        assert_eq!(model.ui_state.user_label.as_deref(), Some("Ada"));
        assert!(model.is_liked(3));
    }

    #[tokio::test]
    async fn expired_session_blocks_writes_and_signs_out() {
        let backend = MemoryBackend::new();
        backend.seed_songs(5);
        let controller = controller(&backend).await;
        backend.set_user(None);

        controller.toggle_like_selected().await;
        controller.create_playlist("Mix", "").await;

        assert_eq!(backend.calls("user_liked_songs", Op::Insert), 0);
        assert_eq!(backend.calls(crate::model::PLAYLIST_TABLE, Op::Insert), 0);
        let model = controller.model.lock().await;
        assert!(model.user().is_none());
        assert!(model.has_notice());
    }

    #[tokio::test]
    async fn signed_out_session_skips_user_data() {
        let backend = MemoryBackend::new();
        backend.seed_songs(5);
        let controller = controller(&backend).await;
        backend.set_user(None);

        controller.load_user_data().await;

        assert_eq!(backend.calls(crate::model::PROFILES_TABLE, Op::Select), 0);
        assert!(controller.model.lock().await.user().is_none());
    }
}

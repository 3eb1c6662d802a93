//! Navigation-related controller methods (catalog pages, search, playlists)

use std::path::Path;

use crate::error::AppError;
use crate::model::{ActiveSection, PageOutcome, PageRequest, PlaylistImage, SearchRequest, Song};
use super::AppController;

impl AppController {
    /// Load the current sort/page and wait for it
    pub async fn load_catalog(&self) {
        let request = self.model.lock().await.reload_catalog();
        self.fetch_page(request).await;
    }

    pub(crate) async fn fetch_page(&self, request: PageRequest) -> PageOutcome {
        tracing::debug!(
            generation = request.generation,
            sort = request.sort.column(),
            page = request.page,
            "Loading catalog page"
        );
        let result = self.catalog.load_page(request.sort, request.page).await;
        self.model.lock().await.apply_page(request, result)
    }

    /// Load in the background so input stays responsive; a newer request wins
    pub(crate) fn spawn_page_load(&self, request: Option<PageRequest>) {
        let Some(request) = request else {
            return;
        };
        let controller = self.clone();
        self.spawn_background("load_page", async move {
            controller.fetch_page(request).await;
        });
    }

    pub async fn toggle_sort(&self) {
        let request = self.model.lock().await.toggle_sort();
        self.spawn_page_load(request);
    }

    pub async fn next_page(&self) {
        let request = self.model.lock().await.next_page();
        self.spawn_page_load(request);
    }

    pub async fn previous_page(&self) {
        let request = self.model.lock().await.previous_page();
        self.spawn_page_load(request);
    }

    /// Search for the current query and wait for the results
    pub async fn perform_search(&self) {
        let request = self.model.lock().await.begin_search();
        self.fetch_search(request).await;
    }

    pub(crate) fn spawn_search(&self, request: SearchRequest) {
        let controller = self.clone();
        self.spawn_background("search", async move {
            controller.fetch_search(request).await;
        });
    }

    async fn fetch_search(&self, request: SearchRequest) {
        let result = self.library.search(&request.query, request.genre.as_deref()).await;

        let mut model = self.model.lock().await;
        if !model.is_current_search(request.generation) {
            tracing::debug!(
                generation = request.generation,
                query = %request.query,
                "Dropping superseded search results"
            );
            return;
        }
        match result {
            Ok(results) => {
                tracing::info!(
                    query = %request.query,
                    songs = results.songs.len(),
                    playlists = results.playlists.len(),
                    "Search completed successfully"
                );
                model.set_search_results(results);
            }
            Err(e) => {
                model.set_search_loading(false);
                drop(model);
                self.report("search", &e).await;
            }
        }
    }

    /// Step the genre filter and rerun the search in the background
    pub async fn cycle_search_genre(&self) {
        let request = {
            let mut model = self.model.lock().await;
            let genre = model.cycle_search_genre();
            tracing::debug!(genre = ?genre, "Search genre changed");
            (!model.ui_state.search_query.trim().is_empty()).then(|| model.begin_search())
        };
        if let Some(request) = request {
            self.spawn_search(request);
        }
    }

    pub async fn load_genres(&self) {
        match self.library.genres().await {
            Ok(genres) => self.model.lock().await.set_genres(genres),
            Err(e) => tracing::warn!(error = %e, "Could not load genres"),
        }
    }

    pub async fn load_user_playlists(&self) {
        self.model.lock().await.set_playlists_loading(true);

        let result = async {
            let user = self.session_user().await?;
            self.library.user_playlists(user.as_ref()).await
        }
        .await;
        match result {
            Ok(playlists) => self.model.lock().await.set_playlists(playlists),
            Err(e) => {
                self.model.lock().await.set_playlists_loading(false);
                self.report("load_playlists", &e).await;
            }
        }
    }

    /// Enter on a playlist in the search results: show it in the library
    pub async fn open_search_playlist(&self, index: usize) {
        let mut model = self.model.lock().await;
        let Some(found) = model.content_state.search.playlists.get(index).cloned() else {
            return;
        };
        let position = model
            .content_state
            .playlists
            .iter()
            .position(|p| p.playlist.id == found.id);

        match position {
            Some(position) => {
                model.ui_state.active_section = ActiveSection::Library;
                model.ui_state.playlist_selected = position;
                model.ui_state.track_selected = Some(0);
            }
            None => model.set_info(format!("\"{}\" belongs to another user.", found.name)),
        }
    }

    pub async fn create_playlist(&self, name: &str, image_path: &str) {
        let result = async {
            let image = read_image(image_path.trim()).await?;
            let user = self.session_user().await?;
            self.library.create_playlist(user.as_ref(), name, image).await
        }
        .await;

        match result {
            Ok(playlist) => {
                self.model
                    .lock()
                    .await
                    .set_info(format!("Created playlist \"{}\".", playlist.name));
                self.load_user_playlists().await;
            }
            Err(e) => self.report("create_playlist", &e).await,
        }
    }

    pub async fn add_to_playlist(&self, playlist_index: usize, song: &Song) {
        let playlist = self
            .model
            .lock()
            .await
            .content_state
            .playlists
            .get(playlist_index)
            .map(|p| p.playlist.clone());
        let Some(playlist) = playlist else {
            return;
        };

        let result = async {
            let user = self.session_user().await?;
            self.library.add_track(user.as_ref(), playlist.id, song.id).await
        }
        .await;
        match result {
            Ok(added) => {
                let message = if added {
                    format!("Added \"{}\" to \"{}\".", song.title, playlist.name)
                } else {
                    format!("\"{}\" is already on \"{}\".", song.title, playlist.name)
                };
                self.model.lock().await.set_info(message);
                if added {
                    self.load_user_playlists().await;
                }
            }
            Err(e) => self.report("add_to_playlist", &e).await,
        }
    }

    /// Remove the selected track from the open playlist
    pub async fn remove_selected_track(&self) {
        let target = {
            let model = self.model.lock().await;
            if model.ui_state.active_section != ActiveSection::Library {
                return;
            }
            let song = model.selected_song();
            let playlist = model.open_playlist().map(|p| p.playlist.id);
            song.zip(playlist)
        };
        let Some((song, playlist_id)) = target else {
            return;
        };

        let result = async {
            let user = self.session_user().await?;
            self.library.remove_track(user.as_ref(), playlist_id, song.id).await
        }
        .await;
        match result {
            Ok(()) => self.load_user_playlists().await,
            Err(e) => self.report("remove_from_playlist", &e).await,
        }
    }
}

async fn read_image(path: &str) -> Result<Option<PlaylistImage>, AppError> {
    if path.is_empty() {
        return Ok(None);
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::Invalid(format!("Cannot read image {}: {}", path, e)))?;
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    Ok(Some(PlaylistImage::from_file(&file_name, bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Op};
    use crate::controller::tests::controller;
    use crate::model::{PLAYLIST_TABLE, PLAYLIST_TRACKS_TABLE, SONGS_TABLE, SortKey};
    use serde_json::json;

    #[tokio::test]
    async fn pages_and_sort_reload_the_catalog() {
        let backend = MemoryBackend::new();
        backend.seed_songs(27);
        let controller = controller(&backend).await;

        let request = controller.model.lock().await.next_page().unwrap();
        assert!(matches!(controller.fetch_page(request).await, PageOutcome::Applied));
        {
            let model = controller.model.lock().await;
            assert_eq!(model.current_page().page, 2);
            assert_eq!(model.current_page().songs[0].id, 14);
        }

        let request = controller.model.lock().await.toggle_sort().unwrap();
        controller.fetch_page(request).await;
        let model = controller.model.lock().await;
        assert_eq!(model.sort(), SortKey::LikesCount);
        assert_eq!(model.current_page().page, 2);
        assert_eq!(model.current_page().songs[0].id, 14);
    }

    #[tokio::test]
    async fn failed_page_keeps_previous_and_notifies() {
        let backend = MemoryBackend::new();
        backend.seed_songs(27);
        let controller = controller(&backend).await;
        backend.fail(SONGS_TABLE, Op::Select);

        let request = controller.model.lock().await.next_page().unwrap();
        let outcome = controller.fetch_page(request).await;

        assert!(matches!(outcome, PageOutcome::Failed(_)));
        let model = controller.model.lock().await;
        assert_eq!(model.current_page().page, 1);
        assert_eq!(model.current_page().songs.len(), 13);
        assert!(model.has_notice());
    }

    #[tokio::test]
    async fn search_fills_results() {
        let backend = MemoryBackend::new();
        backend.seed_songs(12);
        let controller = controller(&backend).await;
        controller.model.lock().await.ui_state.search_query = "song 1".into();

        controller.perform_search().await;

        let model = controller.model.lock().await;
        assert_eq!(model.content_state.search.songs.len(), 4);
        assert!(!model.content_state.search_loading);
    }

    #[tokio::test]
    async fn playlist_round_trip() {
        let backend = MemoryBackend::new();
        backend.seed_songs(3);
        let controller = controller(&backend).await;

        controller.create_playlist("Mix", "").await;
        assert_eq!(backend.rows(PLAYLIST_TABLE).len(), 1);
        assert_eq!(controller.model.lock().await.content_state.playlists.len(), 1);

        let song = controller.model.lock().await.current_page().songs[0].clone();
        controller.add_to_playlist(0, &song).await;
        assert_eq!(backend.rows(PLAYLIST_TRACKS_TABLE).len(), 1);

        {
            let mut model = controller.model.lock().await;
            model.ui_state.active_section = ActiveSection::Library;
            model.toggle_playlist_focus();
            assert_eq!(model.selected_song().map(|s| s.id), Some(song.id));
        }
        controller.remove_selected_track().await;
        assert!(backend.rows(PLAYLIST_TRACKS_TABLE).is_empty());
        assert!(controller.model.lock().await.content_state.playlists[0].tracks.is_empty());
    }

    #[tokio::test]
    async fn missing_image_file_is_reported() {
        let backend = MemoryBackend::new();
        let controller = controller(&backend).await;

        controller.create_playlist("Mix", "/definitely/not/here.png").await;

        assert_eq!(backend.calls(PLAYLIST_TABLE, Op::Insert), 0);
        assert!(controller.model.lock().await.has_notice());
    }

    #[tokio::test]
    async fn foreign_search_playlist_is_not_opened() {
        let backend = MemoryBackend::new();
        backend.seed(
            PLAYLIST_TABLE,
            vec![json!({ "id": 5, "name": "Shared", "image_url": null, "user_id": "other" })],
        );
        let controller = controller(&backend).await;
        controller.model.lock().await.ui_state.search_query = "share".into();
        controller.perform_search().await;

        controller.open_search_playlist(0).await;

        let model = controller.model.lock().await;
        assert_eq!(model.ui_state.active_section, ActiveSection::Catalog);
        assert!(model.has_notice());
    }
}

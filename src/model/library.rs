//! Search, genres, the user's playlists and profile

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::{Value, json};

use crate::backend::{Backend, Filter, Query, UserIdentity, decode_rows, decode_single};
use crate::error::AppError;

use super::types::{
    PLAYLIST_IMAGES_BUCKET, PLAYLIST_TABLE, PLAYLIST_TRACKS_TABLE, PROFILES_TABLE, Playlist,
    PlaylistTrackRow, PlaylistWithTracks, Profile, SONGS_TABLE, Song,
};

const SEARCH_LIMIT: u64 = 50;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResults {
    pub query: String,
    pub genre: Option<String>,
    pub songs: Vec<Song>,
    pub playlists: Vec<Playlist>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty() && self.playlists.is_empty()
    }
}

/// An image picked for a new playlist
#[derive(Clone, Debug)]
pub struct PlaylistImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl PlaylistImage {
    /// Guess the content type from the file extension
    pub fn from_file(file_name: &str, bytes: Vec<u8>) -> Self {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        let content_type = match extension.as_str() {
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            _ => "application/octet-stream",
        };
        Self {
            file_name: file_name.to_string(),
            bytes,
            content_type: content_type.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Library {
    backend: Arc<dyn Backend>,
}

impl Library {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Songs by title and playlists by name. A blank query returns empty
    /// results without touching the backend.
    pub async fn search(&self, text: &str, genre: Option<&str>) -> Result<SearchResults, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SearchResults::default());
        }

        let mut songs_query = Query::select("*")
            .ilike("title", text)
            .order("play_count", false)
            .range(0, SEARCH_LIMIT - 1);
        if let Some(genre) = genre {
            songs_query = songs_query.eq("genre", genre);
        }
        let playlists_query = Query::select("*")
            .ilike("name", text)
            .range(0, SEARCH_LIMIT - 1);

        let (songs, playlists) = futures::try_join!(
            self.backend.select(SONGS_TABLE, &songs_query),
            self.backend.select(PLAYLIST_TABLE, &playlists_query),
        )?;

        let results = SearchResults {
            query: text.to_string(),
            genre: genre.map(str::to_string),
            songs: decode_rows(songs.rows)?,
            playlists: decode_rows(playlists.rows)?,
        };
        tracing::debug!(
            query = text,
            genre = ?genre,
            songs = results.songs.len(),
            playlists = results.playlists.len(),
            "Search finished"
        );
        Ok(results)
    }

    /// Distinct genres present in the catalog, sorted
    pub async fn genres(&self) -> Result<Vec<String>, AppError> {
        let query = Query::select("genre").not_null("genre");
        let rows = self.backend.select(SONGS_TABLE, &query).await?.rows;
        let genres: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| row.get("genre").and_then(Value::as_str))
            .filter(|g| !g.trim().is_empty())
            .map(str::to_string)
            .collect();
        Ok(genres.into_iter().collect())
    }

    /// Display name of the signed-in user; falls back to the email
    pub async fn profile_name(&self, user: &UserIdentity) -> Result<Option<String>, AppError> {
        let query = Query::select("*").eq("id", user.id.as_str());
        let rows = self.backend.select(PROFILES_TABLE, &query).await?.rows;
        let profile: Option<Profile> = decode_rows(rows)?.into_iter().next();
        Ok(profile
            .and_then(|p| p.name.or(p.email))
            .or_else(|| user.email.clone()))
    }

    pub async fn user_playlists(
        &self,
        user: Option<&UserIdentity>,
    ) -> Result<Vec<PlaylistWithTracks>, AppError> {
        let user = user.ok_or(AppError::AuthRequired("see your playlists"))?;
        let query = Query::select("*")
            .eq("user_id", user.id.as_str())
            .order("id", true);
        let playlists: Vec<Playlist> =
            decode_rows(self.backend.select(PLAYLIST_TABLE, &query).await?.rows)?;

        let with_tracks =
            try_join_all(playlists.into_iter().map(|playlist| self.with_tracks(playlist))).await?;
        tracing::info!(count = with_tracks.len(), "Playlists loaded");
        Ok(with_tracks)
    }

    async fn with_tracks(&self, playlist: Playlist) -> Result<PlaylistWithTracks, AppError> {
        let query = Query::select("*").eq("playlist_id", playlist.id);
        let track_rows: Vec<PlaylistTrackRow> =
            decode_rows(self.backend.select(PLAYLIST_TRACKS_TABLE, &query).await?.rows)?;
        if track_rows.is_empty() {
            return Ok(PlaylistWithTracks { playlist, tracks: Vec::new() });
        }

        let ids: Vec<Value> = track_rows.iter().map(|t| json!(t.songs_id)).collect();
        let songs: Vec<Song> = decode_rows(
            self.backend
                .select(SONGS_TABLE, &Query::select("*").is_in("id", ids))
                .await?
                .rows,
        )?;

        // Keep the order the tracks were added in
        let mut by_id: HashMap<i64, Song> = songs.into_iter().map(|s| (s.id, s)).collect();
        let tracks = track_rows
            .iter()
            .filter_map(|t| by_id.remove(&t.songs_id))
            .collect();
        Ok(PlaylistWithTracks { playlist, tracks })
    }

    /// Create a playlist owned by `user`, uploading its image first when one is given
    pub async fn create_playlist(
        &self,
        user: Option<&UserIdentity>,
        name: &str,
        image: Option<PlaylistImage>,
    ) -> Result<Playlist, AppError> {
        let user = user.ok_or(AppError::AuthRequired("create a playlist"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Invalid("Playlist name cannot be empty.".to_string()));
        }

        let image_url = match image {
            Some(image) => {
                let path = format!("playlist-images/{}", image.file_name);
                let stored = self
                    .backend
                    .upload(PLAYLIST_IMAGES_BUCKET, &path, image.bytes, &image.content_type)
                    .await?;
                Some(self.backend.public_url(PLAYLIST_IMAGES_BUCKET, &stored))
            }
            None => None,
        };

        let rows = self
            .backend
            .insert(
                PLAYLIST_TABLE,
                vec![json!({ "name": name, "image_url": image_url, "user_id": user.id })],
            )
            .await?;
        let playlist: Playlist = decode_single(rows, "playlist")?;
        tracing::info!(playlist_id = playlist.id, name = %playlist.name, "Playlist created");
        Ok(playlist)
    }

    /// Returns false when the song was already on the playlist
    pub async fn add_track(
        &self,
        user: Option<&UserIdentity>,
        playlist_id: i64,
        song_id: i64,
    ) -> Result<bool, AppError> {
        user.ok_or(AppError::AuthRequired("edit a playlist"))?;
        let filters = [Filter::eq("playlist_id", playlist_id), Filter::eq("songs_id", song_id)];
        let existing = Query {
            filters: filters.to_vec(),
            ..Query::select("playlist_id")
        };
        if !self.backend.select(PLAYLIST_TRACKS_TABLE, &existing).await?.rows.is_empty() {
            return Ok(false);
        }

        self.backend
            .insert(
                PLAYLIST_TRACKS_TABLE,
                vec![json!({ "playlist_id": playlist_id, "songs_id": song_id })],
            )
            .await?;
        tracing::info!(playlist_id, song_id, "Track added to playlist");
        Ok(true)
    }

    pub async fn remove_track(
        &self,
        user: Option<&UserIdentity>,
        playlist_id: i64,
        song_id: i64,
    ) -> Result<(), AppError> {
        user.ok_or(AppError::AuthRequired("edit a playlist"))?;
        let filters = [Filter::eq("playlist_id", playlist_id), Filter::eq("songs_id", song_id)];
        let existing = Query {
            filters: filters.to_vec(),
            ..Query::select("playlist_id")
        };
        if self.backend.select(PLAYLIST_TRACKS_TABLE, &existing).await?.rows.is_empty() {
            return Err(AppError::NotFound(format!(
                "song {} on playlist {}",
                song_id, playlist_id
            )));
        }

        self.backend.delete(PLAYLIST_TRACKS_TABLE, &filters).await?;
        tracing::info!(playlist_id, song_id, "Track removed from playlist");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Op};

    fn user() -> UserIdentity {
        UserIdentity {
            id: "user-1".into(),
            email: Some("user-1@example.com".into()),
        }
    }

    fn setup() -> (MemoryBackend, Library) {
        let backend = MemoryBackend::new();
        backend.seed_songs(12);
        backend.seed(
            PLAYLIST_TABLE,
            vec![
                json!({ "id": 1, "name": "Road trip", "image_url": null, "user_id": "user-1" }),
                json!({ "id": 2, "name": "Focus", "image_url": null, "user_id": "user-1" }),
                json!({ "id": 3, "name": "Road work", "image_url": null, "user_id": "other" }),
            ],
        );
        backend.seed(
            PLAYLIST_TRACKS_TABLE,
            vec![
                json!({ "playlist_id": 1, "songs_id": 7 }),
                json!({ "playlist_id": 1, "songs_id": 2 }),
            ],
        );
        let library = Library::new(Arc::new(backend.clone()));
        (backend, library)
    }

    #[tokio::test]
    async fn blank_search_makes_no_request() {
        let (backend, library) = setup();
        let results = library.search("   ", None).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(backend.calls(SONGS_TABLE, Op::Select), 0);
    }

    #[tokio::test]
    async fn search_matches_title_and_genre() {
        let (_, library) = setup();

        let all = library.search("song 1", None).await.unwrap();
        let mut ids: Vec<i64> = all.songs.iter().map(|s| s.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 10, 11, 12]);

        let rock = library.search("song 1", Some("rock")).await.unwrap();
        assert!(rock.songs.iter().all(|s| s.genre.as_deref() == Some("rock")));
        assert_eq!(rock.songs.len(), 2);

        let playlists = library.search("ROAD", None).await.unwrap().playlists;
        assert_eq!(playlists.len(), 2);
    }

    #[tokio::test]
    async fn genres_are_distinct_and_sorted() {
        let (backend, library) = setup();
        backend.seed(SONGS_TABLE, vec![json!({ "id": 99, "title": "x", "artist": "y", "file_url": "z", "genre": null })]);
        assert_eq!(library.genres().await.unwrap(), vec!["pop", "rock"]);
    }

    #[tokio::test]
    async fn profile_name_falls_back_to_email() {
        let (backend, library) = setup();
        assert_eq!(
            library.profile_name(&user()).await.unwrap().as_deref(),
            Some("user-1@example.com")
        );

        backend.seed(PROFILES_TABLE, vec![json!({ "id": "user-1", "name": "Ada" })]);
        assert_eq!(library.profile_name(&user()).await.unwrap().as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn playlists_come_with_tracks_in_order() {
        let (_, library) = setup();
        let playlists = library.user_playlists(Some(&user())).await.unwrap();

        assert_eq!(playlists.len(), 2);
        let road = &playlists[0];
        assert_eq!(road.playlist.name, "Road trip");
        assert_eq!(road.tracks.iter().map(|s| s.id).collect::<Vec<_>>(), vec![7, 2]);
        assert!(playlists[1].tracks.is_empty());

        assert!(matches!(
            library.user_playlists(None).await,
            Err(AppError::AuthRequired(_))
        ));
    }

    #[tokio::test]
    async fn create_playlist_uploads_image() {
        let (backend, library) = setup();
        let image = PlaylistImage::from_file("cover.PNG", vec![1, 2, 3]);
        assert_eq!(image.content_type, "image/png");

        let playlist = library
            .create_playlist(Some(&user()), "  Gym  ", Some(image))
            .await
            .unwrap();

        assert_eq!(playlist.name, "Gym");
        assert_eq!(playlist.user_id.as_deref(), Some("user-1"));
        assert_eq!(
            playlist.image_url.as_deref(),
            Some("memory://public/playlist_images/playlist-images/cover.PNG")
        );
        assert_eq!(
            backend.object("playlist_images/playlist-images/cover.PNG"),
            Some(vec![1, 2, 3])
        );
    }

    #[tokio::test]
    async fn create_playlist_validates_input() {
        let (backend, library) = setup();
        assert!(matches!(
            library.create_playlist(Some(&user()), " ", None).await,
            Err(AppError::Invalid(_))
        ));
        assert!(matches!(
            library.create_playlist(None, "Gym", None).await,
            Err(AppError::AuthRequired(_))
        ));
        assert_eq!(backend.calls(PLAYLIST_TABLE, Op::Insert), 0);
    }

    #[tokio::test]
    async fn failed_upload_creates_nothing() {
        let (backend, library) = setup();
        backend.fail(PLAYLIST_IMAGES_BUCKET, Op::Upload);

        let image = PlaylistImage::from_file("cover.jpg", vec![9]);
        let result = library.create_playlist(Some(&user()), "Gym", Some(image)).await;

        assert!(matches!(result, Err(AppError::Backend(_))));
        assert_eq!(backend.calls(PLAYLIST_TABLE, Op::Insert), 0);
    }

    #[tokio::test]
    async fn adding_and_removing_tracks() {
        let (backend, library) = setup();

        assert!(library.add_track(Some(&user()), 2, 5).await.unwrap());
        assert!(!library.add_track(Some(&user()), 2, 5).await.unwrap());
        assert_eq!(backend.calls(PLAYLIST_TRACKS_TABLE, Op::Insert), 1);
        let focus = library.user_playlists(Some(&user())).await.unwrap().remove(1);
        assert_eq!(focus.playlist.id, 2);
        assert_eq!(focus.tracks.iter().map(|s| s.id).collect::<Vec<_>>(), vec![5]);

        library.remove_track(Some(&user()), 2, 5).await.unwrap();
        let focus = library.user_playlists(Some(&user())).await.unwrap().remove(1);
        assert!(focus.tracks.is_empty());

        let err = library.remove_track(Some(&user()), 2, 5).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(backend.calls(PLAYLIST_TRACKS_TABLE, Op::Delete), 1);
    }
}

//! Liked-song tracking: a local mirror of the user's membership rows plus the
//! like/unlike write sequence.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;

use crate::backend::{Backend, BackendError, Filter, Query, UserIdentity, decode_single};
use crate::error::AppError;

use super::types::{LIKED_SONGS_TABLE, SONGS_TABLE, Song};

/// Result of a completed like/unlike
#[derive(Clone, Debug, PartialEq)]
pub struct LikeOutcome {
    pub song_id: i64,
    pub liked: bool,
    pub likes_count: i64,
    /// The song row as returned by the counter write, when one happened
    pub updated_song: Option<Song>,
}

/// Liked song ids of the current user, shared between the controller and the view
#[derive(Clone)]
pub struct LikeTracker {
    backend: Arc<dyn Backend>,
    liked_ids: Arc<RwLock<HashSet<i64>>>,
}

impl LikeTracker {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            liked_ids: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Replace the local set with every membership row of `user`
    pub async fn load_liked_songs(
        &self,
        user: Option<&UserIdentity>,
    ) -> Result<HashSet<i64>, AppError> {
        let user = user.ok_or(AppError::AuthRequired("see your liked songs"))?;

        let query = Query::select("song_id").eq("user_id", user.id.as_str());
        let rows = self.backend.select(LIKED_SONGS_TABLE, &query).await?.rows;
        let ids: HashSet<i64> = rows
            .iter()
            .filter_map(|row| row.get("song_id").and_then(|v| v.as_i64()))
            .collect();

        tracing::info!(count = ids.len(), "Liked songs loaded");
        *self.liked_ids.write().await = ids.clone();
        Ok(ids)
    }

    pub async fn snapshot(&self) -> HashSet<i64> {
        self.liked_ids.read().await.clone()
    }

    /// Like or unlike `song`.
    ///
    /// A like that finds an existing membership row on the backend becomes an
    /// unlike, so every toggle changes both the row and the counter. The membership write always happens before the counter write. If the
    /// membership write fails nothing else is touched. If the counter write
    /// fails the membership change stays and `CounterDrift` is returned.
    pub async fn toggle_like(
        &self,
        user: Option<&UserIdentity>,
        song: &Song,
        currently_liked: bool,
    ) -> Result<LikeOutcome, AppError> {
        let user = user.ok_or(AppError::AuthRequired("like a song"))?;
        let membership = [
            Filter::eq("user_id", user.id.as_str()),
            Filter::eq("song_id", song.id),
        ];

        if currently_liked {
            self.unlike(song, &membership).await
        } else {
            self.like(user, song, &membership).await
        }
    }

    async fn like(
        &self,
        user: &UserIdentity,
        song: &Song,
        membership: &[Filter],
    ) -> Result<LikeOutcome, AppError> {
        let existing = Query {
            filters: membership.to_vec(),
            ..Query::select("song_id")
        };
        if !self.backend.select(LIKED_SONGS_TABLE, &existing).await?.rows.is_empty() {
            tracing::info!(song_id = song.id, "Song already liked on the backend, unliking instead");
            return self.unlike(song, membership).await;
        }

        self.backend
            .insert(
                LIKED_SONGS_TABLE,
                vec![json!({ "user_id": user.id, "song_id": song.id })],
            )
            .await?;
        self.liked_ids.write().await.insert(song.id);

        let updated = self
            .write_likes_count(song, 1)
            .await
            .map_err(|source| AppError::CounterDrift {
                song_id: song.id,
                action: "liked",
                source,
            })?;

        tracing::info!(song_id = song.id, likes_count = updated.likes_count, "Song liked");
        Ok(LikeOutcome {
            song_id: song.id,
            liked: true,
            likes_count: updated.likes_count,
            updated_song: Some(updated),
        })
    }

    async fn unlike(&self, song: &Song, membership: &[Filter]) -> Result<LikeOutcome, AppError> {
        let deleted = self.backend.delete(LIKED_SONGS_TABLE, membership).await?;
        self.liked_ids.write().await.remove(&song.id);

        if deleted.is_empty() {
            let not_found = AppError::NotFound(format!("like for song {}", song.id));
            tracing::info!(song_id = song.id, reason = %not_found, "Unlike was a no-op");
            return Ok(LikeOutcome {
                song_id: song.id,
                liked: false,
                likes_count: song.likes_count,
                updated_song: None,
            });
        }

        let updated = self
            .write_likes_count(song, -1)
            .await
            .map_err(|source| AppError::CounterDrift {
                song_id: song.id,
                action: "unliked",
                source,
            })?;

        tracing::info!(song_id = song.id, likes_count = updated.likes_count, "Song unliked");
        Ok(LikeOutcome {
            song_id: song.id,
            liked: false,
            likes_count: updated.likes_count,
            updated_song: Some(updated),
        })
    }

    /// Set `likes_count` to the known value plus `delta` and return the row the backend now holds
    async fn write_likes_count(&self, song: &Song, delta: i64) -> Result<Song, BackendError> {
        let rows = self
            .backend
            .update(
                SONGS_TABLE,
                json!({ "likes_count": song.likes_count + delta }),
                &[Filter::eq("id", song.id)],
            )
            .await?;
        decode_single(rows, "song")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Op};

    fn user() -> UserIdentity {
        UserIdentity {
            id: "user-1".into(),
            email: None,
        }
    }

    fn setup(liked: &[i64]) -> (MemoryBackend, LikeTracker) {
        let backend = MemoryBackend::new();
        backend.seed_songs(10);
        backend.seed(
            LIKED_SONGS_TABLE,
            liked
                .iter()
                .map(|id| json!({ "user_id": "user-1", "song_id": id }))
                .collect(),
        );
        let tracker = LikeTracker::new(Arc::new(backend.clone()));
        (backend, tracker)
    }

    fn song(backend: &MemoryBackend, id: i64) -> Song {
        serde_json::from_value(backend.row(SONGS_TABLE, id).unwrap()).unwrap()
    }

    fn membership_exists(backend: &MemoryBackend, song_id: i64) -> bool {
        backend
            .rows(LIKED_SONGS_TABLE)
            .iter()
            .any(|r| r["user_id"] == json!("user-1") && r["song_id"] == json!(song_id))
    }

    #[tokio::test]
    async fn loading_requires_a_user() {
        let (_, tracker) = setup(&[]);
        let err = tracker.load_liked_songs(None).await.unwrap_err();
        assert!(matches!(err, AppError::AuthRequired(_)));
        assert!(tracker.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn loads_only_the_users_rows() {
        let (backend, tracker) = setup(&[5, 9]);
        backend.seed(LIKED_SONGS_TABLE, vec![json!({ "user_id": "other", "song_id": 1 })]);

        let ids = tracker.load_liked_songs(Some(&user())).await.unwrap();
        assert_eq!(ids, HashSet::from([5, 9]));
        assert!(tracker.snapshot().await.contains(&9));
        assert!(!tracker.snapshot().await.contains(&1));
    }

    #[tokio::test]
    async fn unliking_a_liked_song() {
        let (backend, tracker) = setup(&[5, 9]);
        tracker.load_liked_songs(Some(&user())).await.unwrap();
        let before = song(&backend, 9);

        let outcome = tracker
            .toggle_like(Some(&user()), &before, true)
            .await
            .unwrap();

        assert!(!outcome.liked);
        assert_eq!(outcome.likes_count, before.likes_count - 1);
        assert!(!membership_exists(&backend, 9));
        assert_eq!(song(&backend, 9).likes_count, before.likes_count - 1);
        assert_eq!(tracker.snapshot().await, HashSet::from([5]));
    }

    #[tokio::test]
    async fn toggling_twice_restores_state() {
        let (backend, tracker) = setup(&[]);
        let original = song(&backend, 3);

        let liked = tracker
            .toggle_like(Some(&user()), &original, false)
            .await
            .unwrap();
        assert!(liked.liked);
        assert!(membership_exists(&backend, 3));
        assert_eq!(liked.likes_count, original.likes_count + 1);

        let after_like = liked.updated_song.unwrap();
        let unliked = tracker
            .toggle_like(Some(&user()), &after_like, true)
            .await
            .unwrap();

        assert!(!unliked.liked);
        assert_eq!(unliked.likes_count, original.likes_count);
        assert!(!membership_exists(&backend, 3));
        assert_eq!(song(&backend, 3), original);
        assert!(!tracker.snapshot().await.contains(&3));
    }

    #[tokio::test]
    async fn failed_membership_write_touches_nothing() {
        let (backend, tracker) = setup(&[]);
        backend.fail(LIKED_SONGS_TABLE, Op::Insert);
        let before = song(&backend, 2);

        let err = tracker
            .toggle_like(Some(&user()), &before, false)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Backend(_)));
        assert_eq!(backend.calls(SONGS_TABLE, Op::Update), 0);
        assert_eq!(song(&backend, 2), before);
        assert!(!tracker.snapshot().await.contains(&2));
    }

    #[tokio::test]
    async fn failed_counter_write_keeps_membership() {
        let (backend, tracker) = setup(&[]);
        backend.fail(SONGS_TABLE, Op::Update);
        let before = song(&backend, 2);

        let err = tracker
            .toggle_like(Some(&user()), &before, false)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::CounterDrift { song_id: 2, .. }));
        assert!(membership_exists(&backend, 2));
        assert_eq!(song(&backend, 2).likes_count, before.likes_count);
        assert!(tracker.snapshot().await.contains(&2));
    }

    #[tokio::test]
    async fn like_with_existing_row_unlikes_instead() {
        let (backend, tracker) = setup(&[4]);
        let before = song(&backend, 4);

        let outcome = tracker
            .toggle_like(Some(&user()), &before, false)
            .await
            .unwrap();

        assert!(!outcome.liked);
        assert_eq!(outcome.likes_count, before.likes_count - 1);
        assert_eq!(backend.calls(LIKED_SONGS_TABLE, Op::Insert), 0);
        assert_eq!(backend.calls(LIKED_SONGS_TABLE, Op::Delete), 1);
        assert!(!membership_exists(&backend, 4));
        assert_eq!(song(&backend, 4).likes_count, before.likes_count - 1);
        assert!(!tracker.snapshot().await.contains(&4));
    }

    #[tokio::test]
    async fn unlike_without_row_is_a_no_op() {
        let (backend, tracker) = setup(&[]);
        let before = song(&backend, 6);

        let outcome = tracker
            .toggle_like(Some(&user()), &before, true)
            .await
            .unwrap();

        assert!(!outcome.liked);
        assert_eq!(outcome.updated_song, None);
        assert_eq!(backend.calls(SONGS_TABLE, Op::Update), 0);
        assert_eq!(song(&backend, 6), before);
    }

    #[tokio::test]
    async fn toggling_requires_a_user() {
        let (backend, tracker) = setup(&[]);
        let err = tracker
            .toggle_like(None, &song(&backend, 1), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthRequired(_)));
        assert_eq!(backend.calls(LIKED_SONGS_TABLE, Op::Insert), 0);
    }
}

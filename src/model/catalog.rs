//! Catalog loading: one sorted, paginated slice of the `songs` table

use std::sync::Arc;

use crate::backend::{Backend, Query, decode_rows};
use crate::error::AppError;

use super::types::{SONGS_TABLE, Song, SortKey};

pub const PAGE_SIZE: u32 = 13;

/// One fetched page of the catalog
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogPage {
    pub songs: Vec<Song>,
    pub sort: SortKey,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    /// Total rows in the table when the page was fetched
    pub total_count: u64,
}

impl CatalogPage {
    pub fn empty(sort: SortKey, page: u32, page_size: u32) -> Self {
        Self {
            songs: Vec::new(),
            sort,
            page,
            page_size,
            total_count: 0,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size as u64) as u32
    }

    pub fn song(&self, song_id: i64) -> Option<&Song> {
        self.songs.iter().find(|s| s.id == song_id)
    }

    /// Overwrite the cached row with one returned by the backend
    pub fn replace_song(&mut self, song: Song) -> bool {
        match self.songs.iter_mut().find(|s| s.id == song.id) {
            Some(slot) => {
                *slot = song;
                true
            }
            None => false,
        }
    }
}

#[derive(Clone)]
pub struct CatalogLoader {
    backend: Arc<dyn Backend>,
    page_size: u32,
}

impl CatalogLoader {
    pub fn new(backend: Arc<dyn Backend>, page_size: u32) -> Self {
        Self {
            backend,
            page_size: page_size.max(1),
        }
    }

    /// Fetch rows `(page-1)*size ..= page*size-1` ordered by `sort` descending,
    /// with the exact total count alongside.
    pub async fn load_page(&self, sort: SortKey, page: u32) -> Result<CatalogPage, AppError> {
        let page = page.max(1);
        let size = self.page_size as u64;
        let from = (page as u64 - 1) * size;
        let query = Query::select("*")
            .order(sort.column(), false)
            .range(from, from + size - 1)
            .exact_count();

        let result = self.backend.select(SONGS_TABLE, &query).await?;
        let songs: Vec<Song> = decode_rows(result.rows)?;
        let total_count = result.total.unwrap_or(0).max(songs.len() as u64);

        tracing::debug!(
            sort = sort.column(),
            page,
            returned = songs.len(),
            total_count,
            "Catalog page loaded"
        );

        Ok(CatalogPage {
            songs,
            sort,
            page,
            page_size: self.page_size,
            total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::{MemoryBackend, Op};

    fn loader(backend: &MemoryBackend) -> CatalogLoader {
        CatalogLoader::new(Arc::new(backend.clone()), PAGE_SIZE)
    }

    #[test]
    fn total_pages_rounds_up() {
        let mut page = CatalogPage::empty(SortKey::PlayCount, 1, 13);
        page.total_count = 27;
        assert_eq!(page.total_pages(), 3);

        page.total_count = 26;
        assert_eq!(page.total_pages(), 2);
        assert_eq!(CatalogPage::empty(SortKey::PlayCount, 1, 13).total_pages(), 0);
    }

    #[tokio::test]
    async fn loads_sorted_pages_with_total() {
        let backend = MemoryBackend::new();
        backend.seed_songs(27);

        let first = loader(&backend).load_page(SortKey::PlayCount, 1).await.unwrap();
        assert_eq!(first.songs.len(), 13);
        assert_eq!(first.total_count, 27);
        assert_eq!(first.songs[0].id, 27);
        assert!(first.songs.windows(2).all(|w| w[0].play_count >= w[1].play_count));

        let last = loader(&backend).load_page(SortKey::PlayCount, 3).await.unwrap();
        assert_eq!(last.songs.len(), 1);
        assert_eq!(last.songs[0].id, 1);
        assert_eq!(last.total_pages(), 3);

        let by_likes = loader(&backend).load_page(SortKey::LikesCount, 1).await.unwrap();
        assert_eq!(by_likes.songs[0].id, 1);
    }

    #[tokio::test]
    async fn pages_never_exceed_page_size() {
        let backend = MemoryBackend::new();
        backend.seed_songs(30);
        let loader = loader(&backend);

        for sort in [SortKey::PlayCount, SortKey::LikesCount] {
            for page in 1..=4 {
                let result = loader.load_page(sort, page).await.unwrap();
                assert!(result.songs.len() <= PAGE_SIZE as usize);
                assert!(result.total_count >= result.songs.len() as u64);
            }
        }
    }

    #[tokio::test]
    async fn page_zero_is_treated_as_first() {
        let backend = MemoryBackend::new();
        backend.seed_songs(5);
        let page = loader(&backend).load_page(SortKey::PlayCount, 0).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.songs.len(), 5);
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let backend = MemoryBackend::new();
        backend.seed_songs(5);
        backend.fail(SONGS_TABLE, Op::Select);

        let err = loader(&backend).load_page(SortKey::PlayCount, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
    }

    #[test]
    fn replace_song_only_touches_matching_row() {
        let mut page = CatalogPage::empty(SortKey::PlayCount, 1, 13);
        page.songs = vec![song(1, 5), song(2, 7)];

        assert!(page.replace_song(song(2, 8)));
        assert_eq!(page.song(2).unwrap().play_count, 8);
        assert_eq!(page.song(1).unwrap().play_count, 5);
        assert!(!page.replace_song(song(3, 1)));
    }

    fn song(id: i64, play_count: u64) -> Song {
        Song {
            id,
            title: format!("Song {}", id),
            artist: "Artist".into(),
            genre: None,
            file_url: format!("https://cdn.test/{}.mp3", id),
            image_url: None,
            play_count,
            likes_count: 0,
        }
    }
}

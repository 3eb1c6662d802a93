//! Core type definitions for the application

use serde::{Deserialize, Deserializer, Serialize};

pub const SONGS_TABLE: &str = "songs";
pub const LIKED_SONGS_TABLE: &str = "user_liked_songs";
pub const PLAYLIST_TABLE: &str = "playlist";
pub const PLAYLIST_TRACKS_TABLE: &str = "playlist_tracks";
pub const PROFILES_TABLE: &str = "profiles";
pub const PLAYLIST_IMAGES_BUCKET: &str = "playlist_images";

/// A row of the `songs` table. Counters are the backend's; this is a cached copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub genre: Option<String>,
    pub file_url: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub play_count: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes_count: i64,
}

/// Counters may be missing or an explicit `null`; both read as zero
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Catalog ordering; always descending
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    PlayCount,
    LikesCount,
}

impl SortKey {
    pub fn column(self) -> &'static str {
        match self {
            SortKey::PlayCount => "play_count",
            SortKey::LikesCount => "likes_count",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortKey::PlayCount => "Most played",
            SortKey::LikesCount => "Most liked",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            SortKey::PlayCount => SortKey::LikesCount,
            SortKey::LikesCount => SortKey::PlayCount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A playlist together with its resolved songs
#[derive(Clone, Debug, PartialEq)]
pub struct PlaylistWithTracks {
    pub playlist: Playlist,
    pub tracks: Vec<Song>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PlaylistTrackRow {
    pub playlist_id: i64,
    pub songs_id: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub file_url: Option<String>,
}

/// Which section of the UI is currently active/focused
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveSection {
    Catalog,
    Search,
    Library,
}

impl ActiveSection {
    pub fn next(self) -> Self {
        match self {
            ActiveSection::Catalog => ActiveSection::Search,
            ActiveSection::Search => ActiveSection::Library,
            ActiveSection::Library => ActiveSection::Catalog,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            ActiveSection::Catalog => ActiveSection::Library,
            ActiveSection::Search => ActiveSection::Catalog,
            ActiveSection::Library => ActiveSection::Search,
        }
    }
}

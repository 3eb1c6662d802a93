//! Model module - Application state and data types
//!
//! - `types`: rows of the backend tables and small UI enums
//! - `catalog`: loading one sorted page of songs
//! - `pagination`: sort/page changes and the stale-response guard
//! - `likes`: the user's liked songs and the like/unlike writes
//! - `playback`: the playback session state machine
//! - `library`: search, genres, playlists, profile
//! - `app_model`: the application model the controller mutates and the view reads

mod types;
mod catalog;
mod pagination;
mod likes;
mod playback;
mod library;
mod app_model;

pub use types::{
    ActiveSection, PLAYLIST_TABLE, PLAYLIST_TRACKS_TABLE, PROFILES_TABLE,
    Playlist, PlaylistWithTracks, SONGS_TABLE, Song, SortKey,
};

pub use catalog::{CatalogLoader, PAGE_SIZE};
pub use pagination::{PageOutcome, PageRequest};
pub use likes::LikeTracker;
pub use playback::{PlayCredit, PlaybackEffect, PlaybackInfo, PlaybackState, record_play};
pub use library::{Library, PlaylistImage};

pub use app_model::{
    AppModel, Notice, NoticeKind, Prompt, PromptField, RenderState, SearchRequest,
};

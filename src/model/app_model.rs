//! Main application model with state management

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::audio::{AudioEvent, AudioOutput};
use crate::backend::UserIdentity;
use crate::error::AppError;

use super::catalog::CatalogPage;
use super::library::SearchResults;
use super::pagination::{PageOutcome, PageRequest, Pagination};
use super::playback::{Playback, PlaybackEffect, PlaybackInfo};
use super::types::{ActiveSection, PlaylistWithTracks, Song, SortKey};

pub const NOTICE_TTL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

#[derive(Clone, Debug)]
pub struct Notice {
    pub message: String,
    pub kind: NoticeKind,
    pub shown_at: Instant,
}

/// Which list next/previous and auto-advance walk through
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayContext {
    Catalog,
    Search,
    Playlist(i64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptField {
    Name,
    ImagePath,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Prompt {
    NewPlaylist {
        name: String,
        image_path: String,
        field: PromptField,
    },
    AddToPlaylist {
        song: Song,
        selected: usize,
    },
}

#[derive(Clone, Debug)]
pub struct UiState {
    pub active_section: ActiveSection,
    pub search_query: String,
    pub search_genre: Option<String>,
    pub catalog_selected: usize,
    pub search_selected: usize,
    pub playlist_selected: usize,
    /// Selected track inside the open playlist; `None` while the playlist list has focus
    pub track_selected: Option<usize>,
    pub notice: Option<Notice>,
    pub show_help_popup: bool,
    pub prompt: Option<Prompt>,
    pub user_label: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            active_section: ActiveSection::Catalog,
            search_query: String::new(),
            search_genre: None,
            catalog_selected: 0,
            search_selected: 0,
            playlist_selected: 0,
            track_selected: None,
            notice: None,
            show_help_popup: false,
            prompt: None,
            user_label: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ContentState {
    pub search: SearchResults,
    pub search_loading: bool,
    pub playlists: Vec<PlaylistWithTracks>,
    pub playlists_loading: bool,
    pub genres: Vec<String>,
    pub liked: HashSet<i64>,
}

/// Everything the view needs for one frame
#[derive(Clone, Debug)]
pub struct RenderState {
    pub playback: PlaybackInfo,
    pub ui: UiState,
    pub content: ContentState,
    pub page: CatalogPage,
    pub page_loading: bool,
    pub signed_in: bool,
}

/// A search in flight; only the newest generation may fill the results
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchRequest {
    pub generation: u64,
    pub query: String,
    pub genre: Option<String>,
}

pub struct AppModel {
    pagination: Pagination,
    search_generation: u64,
    playback: Playback,
    pub ui_state: UiState,
    pub content_state: ContentState,
    user: Option<UserIdentity>,
    play_context: PlayContext,
    should_quit: bool,
}

impl AppModel {
    pub fn new(output: Box<dyn AudioOutput>, page_size: u32) -> Self {
        Self {
            pagination: Pagination::new(page_size),
            search_generation: 0,
            playback: Playback::new(output),
            ui_state: UiState::default(),
            content_state: ContentState::default(),
            user: None,
            play_context: PlayContext::Catalog,
            should_quit: false,
        }
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn set_user(&mut self, user: Option<UserIdentity>) {
        if user.is_none() {
            self.content_state.liked.clear();
            self.content_state.playlists.clear();
            self.ui_state.user_label = None;
        }
        self.user = user;
    }

    pub fn set_user_label(&mut self, label: Option<String>) {
        self.ui_state.user_label = label;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn set_should_quit(&mut self, quit: bool) {
        self.should_quit = quit;
    }

    // ========================================================================
    // Notices
    // ========================================================================

    pub fn set_error(&mut self, message: String) {
        self.set_notice(message, NoticeKind::Error);
    }

    pub fn set_info(&mut self, message: String) {
        self.set_notice(message, NoticeKind::Info);
    }

    fn set_notice(&mut self, message: String, kind: NoticeKind) {
        self.ui_state.notice = Some(Notice {
            message,
            kind,
            shown_at: Instant::now(),
        });
    }

    pub fn report(&mut self, error: &AppError) {
        self.set_error(error.user_message());
    }

    pub fn clear_notice(&mut self) {
        self.ui_state.notice = None;
    }

    pub fn has_notice(&self) -> bool {
        self.ui_state.notice.is_some()
    }

    pub fn auto_clear_old_notice(&mut self, now: Instant) {
        let expired = self
            .ui_state
            .notice
            .as_ref()
            .is_some_and(|n| now.duration_since(n.shown_at) > NOTICE_TTL);
        if expired {
            self.ui_state.notice = None;
        }
    }

    // ========================================================================
    // Sections & selection
    // ========================================================================

    pub fn cycle_section_forward(&mut self) {
        self.ui_state.active_section = self.ui_state.active_section.next();
    }

    pub fn cycle_section_backward(&mut self) {
        self.ui_state.active_section = self.ui_state.active_section.prev();
    }

    fn list_len(&self) -> usize {
        match self.ui_state.active_section {
            ActiveSection::Catalog => self.pagination.current().songs.len(),
            ActiveSection::Search => {
                self.content_state.search.songs.len() + self.content_state.search.playlists.len()
            }
            ActiveSection::Library => match self.ui_state.track_selected {
                Some(_) => self.open_playlist().map(|p| p.tracks.len()).unwrap_or(0),
                None => self.content_state.playlists.len(),
            },
        }
    }

    fn selection_mut(&mut self) -> &mut usize {
        match self.ui_state.active_section {
            ActiveSection::Catalog => &mut self.ui_state.catalog_selected,
            ActiveSection::Search => &mut self.ui_state.search_selected,
            ActiveSection::Library => match &mut self.ui_state.track_selected {
                Some(track) => track,
                None => &mut self.ui_state.playlist_selected,
            },
        }
    }

    pub fn move_selection_up(&mut self) {
        let selected = self.selection_mut();
        *selected = selected.saturating_sub(1);
    }

    pub fn move_selection_down(&mut self) {
        let last = self.list_len().saturating_sub(1);
        let selected = self.selection_mut();
        if *selected < last {
            *selected += 1;
        }
    }

    fn clamp_selections(&mut self) {
        let page_len = self.pagination.current().songs.len();
        self.ui_state.catalog_selected = self.ui_state.catalog_selected.min(page_len.saturating_sub(1));
        let search_len =
            self.content_state.search.songs.len() + self.content_state.search.playlists.len();
        self.ui_state.search_selected = self.ui_state.search_selected.min(search_len.saturating_sub(1));
        let playlists = self.content_state.playlists.len();
        self.ui_state.playlist_selected =
            self.ui_state.playlist_selected.min(playlists.saturating_sub(1));
        let tracks = self.open_playlist().map(|p| p.tracks.len());
        if let (Some(track), Some(len)) = (self.ui_state.track_selected.as_mut(), tracks) {
            *track = (*track).min(len.saturating_sub(1));
        }
    }

    /// The playlist under the library cursor
    pub fn open_playlist(&self) -> Option<&PlaylistWithTracks> {
        self.content_state.playlists.get(self.ui_state.playlist_selected)
    }

    /// Enter or leave the track list of the selected playlist
    pub fn toggle_playlist_focus(&mut self) {
        self.ui_state.track_selected = match self.ui_state.track_selected {
            Some(_) => None,
            None if self.open_playlist().is_some() => Some(0),
            None => None,
        };
    }

    /// The song under the cursor of the active section
    pub fn selected_song(&self) -> Option<Song> {
        match self.ui_state.active_section {
            ActiveSection::Catalog => self
                .pagination
                .current()
                .songs
                .get(self.ui_state.catalog_selected)
                .cloned(),
            ActiveSection::Search => self
                .content_state
                .search
                .songs
                .get(self.ui_state.search_selected)
                .cloned(),
            ActiveSection::Library => {
                let track = self.ui_state.track_selected?;
                self.open_playlist()?.tracks.get(track).cloned()
            }
        }
    }

    /// Index into `search.playlists` when the search cursor is past the songs
    pub fn selected_search_playlist(&self) -> Option<usize> {
        let songs = self.content_state.search.songs.len();
        let selected = self.ui_state.search_selected;
        (selected >= songs && selected - songs < self.content_state.search.playlists.len())
            .then(|| selected - songs)
    }

    // ========================================================================
    // Search input
    // ========================================================================

    pub fn append_to_search(&mut self, c: char) {
        self.ui_state.search_query.push(c);
    }

    pub fn backspace_search(&mut self) {
        self.ui_state.search_query.pop();
    }

    pub fn clear_search(&mut self) {
        self.search_generation += 1;
        self.ui_state.search_query.clear();
        self.content_state.search = SearchResults::default();
        self.content_state.search_loading = false;
        self.ui_state.search_selected = 0;
    }

    /// Step through `None -> genre 1 -> ... -> genre n -> None`
    pub fn cycle_search_genre(&mut self) -> Option<String> {
        let genres = &self.content_state.genres;
        let next = match &self.ui_state.search_genre {
            None => genres.first().cloned(),
            Some(current) => genres
                .iter()
                .position(|g| g == current)
                .and_then(|i| genres.get(i + 1))
                .cloned(),
        };
        self.ui_state.search_genre = next.clone();
        next
    }

    /// Start a search for the current query and genre, superseding any in flight
    pub fn begin_search(&mut self) -> SearchRequest {
        self.search_generation += 1;
        self.content_state.search_loading = true;
        SearchRequest {
            generation: self.search_generation,
            query: self.ui_state.search_query.clone(),
            genre: self.ui_state.search_genre.clone(),
        }
    }

    pub fn is_current_search(&self, generation: u64) -> bool {
        generation == self.search_generation
    }

    pub fn set_search_loading(&mut self, loading: bool) {
        self.content_state.search_loading = loading;
    }

    pub fn set_search_results(&mut self, results: SearchResults) {
        self.content_state.search = results;
        self.content_state.search_loading = false;
        self.ui_state.search_selected = 0;
    }

    pub fn set_genres(&mut self, genres: Vec<String>) {
        self.content_state.genres = genres;
    }

    // ========================================================================
    // Playlists
    // ========================================================================

    pub fn set_playlists(&mut self, playlists: Vec<PlaylistWithTracks>) {
        self.content_state.playlists = playlists;
        self.content_state.playlists_loading = false;
        self.clamp_selections();
    }

    pub fn set_playlists_loading(&mut self, loading: bool) {
        self.content_state.playlists_loading = loading;
    }

    pub fn open_prompt(&mut self, prompt: Prompt) {
        self.ui_state.prompt = Some(prompt);
    }

    pub fn close_prompt(&mut self) -> Option<Prompt> {
        self.ui_state.prompt.take()
    }

    pub fn prompt_mut(&mut self) -> Option<&mut Prompt> {
        self.ui_state.prompt.as_mut()
    }

    pub fn show_help_popup(&mut self) {
        self.ui_state.show_help_popup = true;
    }

    pub fn hide_help_popup(&mut self) {
        self.ui_state.show_help_popup = false;
    }

    pub fn is_help_popup_open(&self) -> bool {
        self.ui_state.show_help_popup
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    pub fn sort(&self) -> SortKey {
        self.pagination.sort()
    }

    pub fn current_page(&self) -> &CatalogPage {
        self.pagination.current()
    }

    pub fn reload_catalog(&mut self) -> PageRequest {
        self.pagination.reload()
    }

    pub fn toggle_sort(&mut self) -> Option<PageRequest> {
        let next = self.pagination.sort().toggle();
        self.pagination.set_sort(next)
    }

    pub fn next_page(&mut self) -> Option<PageRequest> {
        self.pagination.next_page()
    }

    pub fn previous_page(&mut self) -> Option<PageRequest> {
        self.pagination.previous_page()
    }

    /// Apply a finished page load. A newly displayed page is a page reload
    /// for playback when the catalog is what is being played.
    pub fn apply_page(
        &mut self,
        request: PageRequest,
        result: Result<CatalogPage, AppError>,
    ) -> PageOutcome {
        let outcome = self.pagination.apply(request, result);
        match &outcome {
            PageOutcome::Applied => {
                self.clamp_selections();
                if self.play_context == PlayContext::Catalog {
                    let songs = self.pagination.current().songs.clone();
                    self.playback.page_reloaded(&songs);
                }
            }
            PageOutcome::Failed(e) => {
                tracing::error!(page = request.page, error = %e, "Catalog page load failed");
                self.report(e);
            }
            PageOutcome::Stale => {}
        }
        outcome
    }

    /// Overwrite every cached copy of `song` with the backend's row
    pub fn apply_song_update(&mut self, song: &Song) {
        self.pagination.current_mut().replace_song(song.clone());
        for cached in self.content_state.search.songs.iter_mut().filter(|s| s.id == song.id) {
            *cached = song.clone();
        }
        for playlist in self.content_state.playlists.iter_mut() {
            for cached in playlist.tracks.iter_mut().filter(|s| s.id == song.id) {
                *cached = song.clone();
            }
        }
        self.playback.update_song(song);
    }

    pub fn set_liked(&mut self, liked: HashSet<i64>) {
        self.content_state.liked = liked;
    }

    pub fn is_liked(&self, song_id: i64) -> bool {
        self.content_state.liked.contains(&song_id)
    }

    // ========================================================================
    // Playback
    // ========================================================================

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn play_context(&self) -> PlayContext {
        self.play_context
    }

    fn context_songs(&self) -> Vec<Song> {
        match self.play_context {
            PlayContext::Catalog => self.pagination.current().songs.clone(),
            PlayContext::Search => self.content_state.search.songs.clone(),
            PlayContext::Playlist(id) => self
                .content_state
                .playlists
                .iter()
                .find(|p| p.playlist.id == id)
                .map(|p| p.tracks.clone())
                .unwrap_or_default(),
        }
    }

    /// Start the song under the cursor, making its list the play context
    pub fn play_selected(&mut self) -> bool {
        let Some(song) = self.selected_song() else {
            return false;
        };
        self.play_context = match self.ui_state.active_section {
            ActiveSection::Catalog => PlayContext::Catalog,
            ActiveSection::Search => PlayContext::Search,
            ActiveSection::Library => match self.open_playlist() {
                Some(p) => PlayContext::Playlist(p.playlist.id),
                None => return false,
            },
        };
        let songs = self.context_songs();
        self.playback.select(song.id, &songs)
    }

    pub fn play_next(&mut self) -> Option<i64> {
        let songs = self.context_songs();
        self.playback.play_next(&songs)
    }

    pub fn play_previous(&mut self) -> Option<i64> {
        let songs = self.context_songs();
        self.playback.play_previous(&songs)
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.playback.toggle_pause()
    }

    pub fn seek_forward(&mut self) -> bool {
        self.playback.seek_forward()
    }

    pub fn seek_backward(&mut self) -> bool {
        self.playback.seek_backward()
    }

    pub fn volume_up(&mut self) {
        self.playback.volume_up();
    }

    pub fn volume_down(&mut self) {
        self.playback.volume_down();
    }

    pub fn handle_audio_event(&mut self, event: AudioEvent) -> PlaybackEffect {
        let songs = self.context_songs();
        let effect = self.playback.handle_event(event, &songs);
        if let PlaybackEffect::Failed(reason) = &effect {
            self.set_error(format!("Could not play this song: {}", reason));
        }
        effect
    }

    pub fn tick(&mut self) {
        self.playback.tick();
    }

    pub fn render_state(&self) -> RenderState {
        RenderState {
            playback: self.playback.info(),
            ui: self.ui_state.clone(),
            content: self.content_state.clone(),
            page: self.pagination.current().clone(),
            page_loading: self.pagination.is_loading(),
            signed_in: self.user.is_some(),
        }
    }
}

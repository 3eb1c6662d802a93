//! Main content area rendering (catalog, search results, playlist tracks)

use std::collections::HashSet;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{ListItem, Paragraph},
    Frame,
};

use crate::model::{ActiveSection, Playlist, RenderState, Song};
use super::utils::{
    COUNT_WIDTH, LIKED_WIDTH, SongColumns, panel, render_scrollable_list, row_style,
    truncate_string,
};

pub fn render_main_content(frame: &mut Frame, area: Rect, state: &RenderState) {
    match state.ui.active_section {
        ActiveSection::Catalog => render_catalog(frame, area, state),
        ActiveSection::Search => render_search_results(frame, area, state),
        ActiveSection::Library => render_playlist_tracks(frame, area, state),
    }
}

fn playing_song_id(state: &RenderState) -> Option<i64> {
    state.playback.song.as_ref().map(|s| s.id)
}

fn render_message(frame: &mut Frame, area: Rect, title: String, message: &str, is_focused: bool) {
    let paragraph = Paragraph::new(format!("  {}", message))
        .style(Style::default().fg(Color::DarkGray))
        .block(panel(title, is_focused));
    frame.render_widget(paragraph, area);
}

fn render_catalog(frame: &mut Frame, area: Rect, state: &RenderState) {
    let page = &state.page;
    let title = format!(
        " Catalog · {} · Page {}/{} ({} songs) ",
        page.sort.label(),
        page.page,
        page.total_pages().max(1),
        page.total_count
    );

    if state.page_loading && page.songs.is_empty() {
        render_message(frame, area, title, "Loading...", true);
        return;
    }
    if page.songs.is_empty() {
        render_message(frame, area, title, "No songs in the catalog", true);
        return;
    }

    let title = if state.page_loading {
        format!("{}Loading... ", title)
    } else {
        title
    };
    let content_width = area.width.saturating_sub(4) as usize;
    let items = song_items(
        &page.songs,
        state.ui.catalog_selected,
        true,
        playing_song_id(state),
        &state.content.liked,
        content_width,
    );
    // +1 for the header row
    render_scrollable_list(frame, area, items, state.ui.catalog_selected + 1, panel(title, true));
}

fn render_search_results(frame: &mut Frame, area: Rect, state: &RenderState) {
    let results = &state.content.search;
    let title = match &results.genre {
        Some(genre) => format!(" Results for \"{}\" in {} ", results.query, genre),
        None if results.query.is_empty() => " Results ".to_string(),
        None => format!(" Results for \"{}\" ", results.query),
    };

    if state.content.search_loading {
        render_message(frame, area, title, "Searching...", true);
        return;
    }
    if results.query.is_empty() {
        render_message(frame, area, title, "Type a query and press Enter", true);
        return;
    }
    if results.is_empty() {
        render_message(frame, area, title, "No songs or playlists found", true);
        return;
    }

    let content_width = area.width.saturating_sub(4) as usize;
    let selected = state.ui.search_selected;
    let song_count = results.songs.len();

    let mut items = if results.songs.is_empty() {
        Vec::new()
    } else {
        song_items(
            &results.songs,
            selected,
            true,
            playing_song_id(state),
            &state.content.liked,
            content_width,
        )
    };
    let header_rows = items.len().saturating_sub(song_count);

    if !results.playlists.is_empty() {
        items.push(
            ListItem::new(format!(" Playlists ({})", results.playlists.len()))
                .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        );
        items.extend(playlist_items(
            &results.playlists,
            selected.checked_sub(song_count),
            content_width,
        ));
    }

    let selected_row = if selected < song_count {
        selected + header_rows
    } else {
        selected + header_rows + 1
    };
    render_scrollable_list(frame, area, items, selected_row, panel(title, true));
}

fn render_playlist_tracks(frame: &mut Frame, area: Rect, state: &RenderState) {
    let is_focused = state.ui.track_selected.is_some();

    if !state.signed_in {
        render_message(frame, area, " Playlist ".to_string(), "Sign in to see your playlists", false);
        return;
    }
    if state.content.playlists_loading && state.content.playlists.is_empty() {
        render_message(frame, area, " Playlist ".to_string(), "Loading...", false);
        return;
    }
    let Some(open) = state.content.playlists.get(state.ui.playlist_selected) else {
        render_message(
            frame,
            area,
            " Playlist ".to_string(),
            "No playlists yet. Press c to create one",
            false,
        );
        return;
    };

    let title = format!(" {} ({} tracks) ", open.playlist.name, open.tracks.len());
    if open.tracks.is_empty() {
        render_message(frame, area, title, "This playlist is empty. Press a on a song to add it", is_focused);
        return;
    }

    let selected = state.ui.track_selected.unwrap_or(0);
    let content_width = area.width.saturating_sub(4) as usize;
    let items = song_items(
        &open.tracks,
        selected,
        is_focused,
        playing_song_id(state),
        &state.content.liked,
        content_width,
    );
    render_scrollable_list(frame, area, items, selected + 1, panel(title, is_focused));
}

/// Header row followed by one row per song
fn song_items(
    songs: &[Song],
    selected_index: usize,
    is_focused: bool,
    playing_id: Option<i64>,
    liked: &HashSet<i64>,
    content_width: usize,
) -> Vec<ListItem<'static>> {
    let columns = SongColumns::fit(content_width, songs.len());

    let mut items: Vec<ListItem<'static>> = vec![
        ListItem::new(format!(
            " {:<num_width$}   {}   {:<title_width$}   {:<artist_width$}   {:<genre_width$}   {:>count_width$}   {:>count_width$}",
            "#", "  ", "Title", "Artist", "Genre", "Plays", "Likes",
            num_width = columns.num,
            title_width = columns.title,
            artist_width = columns.artist,
            genre_width = columns.genre,
            count_width = COUNT_WIDTH,
        ))
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
    ];

    let rows = songs.iter().enumerate().map(|(i, song)| {
        let is_playing = playing_id == Some(song.id);
        let style = row_style(i == selected_index, is_focused, is_playing);

        let liked_indicator = if liked.contains(&song.id) { "💚" } else { "  " };
        let playing_indicator = if is_playing { "▶" } else { " " };
        let track_num = format!("{}{:<num_width$}", playing_indicator, i + 1, num_width = columns.num);

        ListItem::new(format!(
            "{}   {:<liked_width$}   {}   {}   {}   {:>count_width$}   {:>count_width$}",
            track_num,
            liked_indicator,
            truncate_string(&song.title, columns.title),
            truncate_string(&song.artist, columns.artist),
            truncate_string(song.genre.as_deref().unwrap_or("-"), columns.genre),
            song.play_count,
            song.likes_count,
            liked_width = LIKED_WIDTH,
            count_width = COUNT_WIDTH,
        ))
        .style(style)
    });

    items.extend(rows);
    items
}

fn playlist_items(
    playlists: &[Playlist],
    selected_index: Option<usize>,
    content_width: usize,
) -> Vec<ListItem<'static>> {
    playlists
        .iter()
        .enumerate()
        .map(|(i, playlist)| {
            let style = row_style(selected_index == Some(i), true, false);
            ListItem::new(format!(
                "  ♫ {}",
                truncate_string(&playlist.name, content_width.saturating_sub(4))
            ))
            .style(style)
        })
        .collect()
}

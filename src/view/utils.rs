//! Utility functions for rendering UI components

use std::time::Duration;

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Padding},
    Frame,
};

pub fn render_scrollable_list(
    frame: &mut Frame,
    area: Rect,
    items: Vec<ListItem>,
    selected_index: usize,
    block: Block,
) {
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default()); // Highlight handled by item styles

    let mut list_state = ListState::default();
    list_state.select(Some(selected_index));

    frame.render_stateful_widget(list, area, &mut list_state);
}

pub fn focus_style(is_focused: bool) -> Style {
    if is_focused {
        Style::default().fg(Color::Green)
    } else {
        Style::default()
    }
}

pub fn panel(title: String, is_focused: bool) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .padding(Padding::horizontal(1))
        .border_style(focus_style(is_focused))
}

/// Row style for a list entry; the cursor wins over the playing marker
pub fn row_style(is_selected: bool, is_focused: bool, is_playing: bool) -> Style {
    if is_selected && is_focused {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else if is_playing {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else if is_selected {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let minutes = total_seconds / 60;
    let seconds = total_seconds % 60;
    format!("{}:{:02}", minutes, seconds)
}

/// Calculate width needed for index column (log10(n) + padding)
pub fn calculate_num_width(item_count: usize) -> usize {
    if item_count == 0 {
        2
    } else {
        let digits = (item_count as f64).log10().floor() as usize + 1;
        digits + 1
    }
}

pub fn truncate_string(s: &str, max_width: usize) -> String {
    if s.chars().count() > max_width {
        let truncated: String = s.chars().take(max_width.saturating_sub(3)).collect();
        format!("{:<width$}", format!("{}...", truncated), width = max_width)
    } else {
        format!("{:<width$}", s, width = max_width)
    }
}

/// Column widths for song rows
///
/// Format: `{marker}{num}   {liked}   {title}   {artist}   {genre}   {plays}   {likes}`
pub struct SongColumns {
    pub num: usize,
    pub title: usize,
    pub artist: usize,
    pub genre: usize,
}

pub const LIKED_WIDTH: usize = 2;
pub const COUNT_WIDTH: usize = 7;

impl SongColumns {
    pub fn fit(content_width: usize, item_count: usize) -> Self {
        let num = calculate_num_width(item_count);
        let fixed = 1 + num + 3 + LIKED_WIDTH + 3 + 3 + 3 + 3 + COUNT_WIDTH + 3 + COUNT_WIDTH;
        let remaining = content_width.saturating_sub(fixed);
        let title = (remaining * 40) / 100;
        let artist = (remaining * 35) / 100;
        let genre = remaining.saturating_sub(title + artist);
        Self { num, title, artist, genre }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_minutes_and_padded_seconds() {
        assert_eq!(format_duration(Duration::ZERO), "0:00");
        assert_eq!(format_duration(Duration::from_millis(65_900)), "1:05");
        assert_eq!(format_duration(Duration::from_secs(3600)), "60:00");
    }

    #[test]
    fn long_strings_get_ellipsis_and_short_ones_padding() {
        assert_eq!(truncate_string("abcdefgh", 6), "abc...");
        assert_eq!(truncate_string("ab", 4), "ab  ");
    }

    #[test]
    fn num_width_grows_with_digits() {
        assert_eq!(calculate_num_width(0), 2);
        assert_eq!(calculate_num_width(9), 2);
        assert_eq!(calculate_num_width(13), 3);
        assert_eq!(calculate_num_width(100), 4);
    }

    #[test]
    fn columns_share_the_leftover_width() {
        let columns = SongColumns::fit(120, 13);
        let fixed = 1 + columns.num + 3 + LIKED_WIDTH + 3 + 3 + 3 + 3 + COUNT_WIDTH + 3 + COUNT_WIDTH;
        assert_eq!(columns.title + columns.artist + columns.genre, 120 - fixed);

        let narrow = SongColumns::fit(10, 13);
        assert_eq!(narrow.title + narrow.artist + narrow.genre, 0);
    }
}

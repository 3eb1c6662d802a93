//! Layout rendering (top bar, sidebar, main area structure)

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};
use ratatui::widgets::Padding;

use crate::model::{ActiveSection, RenderState};
use super::utils::{focus_style, truncate_string};

const SECTIONS: [(ActiveSection, &str); 3] = [
    (ActiveSection::Catalog, "Catalog"),
    (ActiveSection::Search, "Search"),
    (ActiveSection::Library, "Your playlists"),
];

pub fn render_top_bar(frame: &mut Frame, area: Rect, state: &RenderState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),     // Search input
            Constraint::Length(30), // Signed-in user
        ])
        .split(area);

    let searching = state.ui.active_section == ActiveSection::Search;
    let search_style = if searching {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::White)
    };

    let search_text = if state.ui.search_query.is_empty() {
        "Press / to search...".to_string()
    } else if searching {
        format!("{}▏", state.ui.search_query)
    } else {
        state.ui.search_query.clone()
    };

    let title = match &state.ui.search_genre {
        Some(genre) => format!(" Search · {} (Ctrl+G) ", genre),
        None => " Search · All genres (Ctrl+G) ".to_string(),
    };

    let search = Paragraph::new(search_text)
        .style(search_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .padding(Padding::horizontal(1))
                .border_style(focus_style(searching)),
        );
    frame.render_widget(search, chunks[0]);

    let user = if state.signed_in {
        let label = state.ui.user_label.as_deref().unwrap_or("Signed in");
        Paragraph::new(format!("👤 {}", truncate_string(label, 24).trim_end()))
            .style(Style::default().fg(Color::Cyan))
    } else {
        Paragraph::new("Signed out").style(Style::default().fg(Color::DarkGray))
    };
    frame.render_widget(
        user.block(Block::default().borders(Borders::ALL).title(" User ")),
        chunks[1],
    );
}

pub fn render_sidebar(frame: &mut Frame, area: Rect, state: &RenderState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Sections (3 items + 2 borderlines)
            Constraint::Min(0),    // Playlists (fills remaining space)
        ])
        .split(area);

    let active = state.ui.active_section;
    let section_items: Vec<ListItem> = SECTIONS
        .iter()
        .map(|(section, name)| {
            let style = if *section == active {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(*name).style(style)
        })
        .collect();

    let sections = List::new(section_items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Browse ")
            .padding(Padding::horizontal(1)),
    );
    frame.render_widget(sections, chunks[0]);

    let in_library = active == ActiveSection::Library;
    let choosing_playlist = in_library && state.ui.track_selected.is_none();
    let playlist_items: Vec<ListItem> = state
        .content
        .playlists
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let style = if i == state.ui.playlist_selected && choosing_playlist {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if i == state.ui.playlist_selected && in_library {
                Style::default().fg(Color::White).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(format!("{} ({})", item.playlist.name, item.tracks.len())).style(style)
        })
        .collect();

    let title = if state.content.playlists_loading {
        " Playlists (loading) "
    } else {
        " Playlists "
    };
    let playlists = List::new(playlist_items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .padding(Padding::horizontal(1))
                .border_style(focus_style(choosing_playlist)),
        )
        .highlight_style(Style::default()); // Highlight handled by item styles

    let mut list_state = ListState::default();
    list_state.select(Some(state.ui.playlist_selected));

    frame.render_stateful_widget(playlists, chunks[1], &mut list_state);
}

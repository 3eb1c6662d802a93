//! Overlay rendering (notices, prompts, help popup)

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::model::{Notice, NoticeKind, PlaylistWithTracks, Prompt, PromptField};

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + area.width.saturating_sub(width) / 2,
        y: area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    }
}

fn popup_block(title: &'static str, color: Color) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title)
        .title_style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .style(Style::default().bg(Color::Black))
}

pub fn render_notice(frame: &mut Frame, notice: &Notice) {
    let area = frame.area();

    let popup_width = 52.min(area.width.saturating_sub(4));
    let inner_width = popup_width.saturating_sub(4).max(1) as usize;

    let line_count = notice.message.chars().count().div_ceil(inner_width) as u16;
    // top border + message lines + bottom border
    let popup_height = (2 + line_count.max(1)).min(area.height.saturating_sub(4));

    let (title, color) = match notice.kind {
        NoticeKind::Error => (" Error (Esc to dismiss) ", Color::Red),
        NoticeKind::Info => (" Info ", Color::Cyan),
    };

    let popup_area = centered(area, popup_width, popup_height);
    frame.render_widget(Clear, popup_area);

    let widget = Paragraph::new(notice.message.clone())
        .style(Style::default().fg(color))
        .wrap(Wrap { trim: false })
        .block(popup_block(title, color));
    frame.render_widget(widget, popup_area);
}

pub fn render_prompt(frame: &mut Frame, prompt: &Prompt, playlists: &[PlaylistWithTracks]) {
    match prompt {
        Prompt::NewPlaylist { name, image_path, field } => {
            render_new_playlist(frame, name, image_path, *field)
        }
        Prompt::AddToPlaylist { song, selected } => {
            render_playlist_picker(frame, &song.title, *selected, playlists)
        }
    }
}

fn render_new_playlist(frame: &mut Frame, name: &str, image_path: &str, field: PromptField) {
    let popup_area = centered(frame.area(), 60, 7);
    frame.render_widget(Clear, popup_area);

    let input_line = |label: &'static str, value: &str, active: bool| {
        let style = if active {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };
        let cursor = if active { "▏" } else { "" };
        Line::from(vec![
            Span::styled(format!("{:>12}", label), style),
            Span::raw("  "),
            Span::styled(format!("{}{}", value, cursor), style),
        ])
    };

    let lines = vec![
        input_line("Name", name, field == PromptField::Name),
        input_line("Image file", image_path, field == PromptField::ImagePath),
        Line::from(""),
        Line::from(Span::styled(
            "Tab switch field · Enter create · Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let widget = Paragraph::new(lines).block(popup_block(" New playlist ", Color::Cyan));
    frame.render_widget(widget, popup_area);
}

fn render_playlist_picker(
    frame: &mut Frame,
    song_title: &str,
    selected: usize,
    playlists: &[PlaylistWithTracks],
) {
    let area = frame.area();

    let max_name_len = playlists
        .iter()
        .map(|p| p.playlist.name.chars().count() + 4)
        .max()
        .unwrap_or(30);
    let popup_width = (max_name_len as u16 + 6).clamp(35, 60);
    let popup_height = (playlists.len() as u16 + 3).min(area.height.saturating_sub(4)).max(6);

    let popup_area = centered(area, popup_width, popup_height);
    frame.render_widget(Clear, popup_area);

    let items: Vec<ListItem> = playlists
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let style = if i == selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Green)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(format!("♫ {}", p.playlist.name)).style(style)
        })
        .collect();

    let list = List::new(items).block(
        popup_block(" Add to playlist (↑↓ Enter Esc) ", Color::Cyan)
            .title_bottom(Line::from(format!(" {} ", song_title)).right_aligned()),
    );

    let mut list_state = ListState::default();
    list_state.select(Some(selected));

    frame.render_stateful_widget(list, popup_area, &mut list_state);
}

pub fn render_help_popup(frame: &mut Frame) {
    let area = frame.area();

    let keybindings = [
        ("", "── Navigation ──"),
        ("Tab / Shift+Tab", "Cycle sections"),
        ("↑ / ↓", "Move selection"),
        ("Enter", "Play / Open playlist"),
        ("Backspace / Esc", "Back to playlists"),
        ("/", "Focus search"),
        ("", ""),
        ("", "── Catalog ──"),
        ("] / [", "Next / previous page"),
        ("S", "Sort by plays / likes"),
        ("R", "Reload page"),
        ("", ""),
        ("", "── Playback ──"),
        ("Space", "Play / Pause"),
        ("N / B", "Next / previous song"),
        ("← / →", "Seek 5 seconds"),
        ("+ / -", "Volume up / down"),
        ("", ""),
        ("", "── Actions ──"),
        ("L", "Like / Unlike song"),
        ("A", "Add song to playlist"),
        ("C", "Create playlist"),
        ("X", "Remove from playlist"),
        ("Ctrl+G", "Cycle search genre"),
        ("", ""),
        ("", "── General ──"),
        ("H", "Toggle this help"),
        ("Q", "Quit (Ctrl+Q in search)"),
    ];

    let popup_height = (keybindings.len() as u16 + 2).min(area.height.saturating_sub(4));
    let popup_area = centered(area, 62, popup_height);
    frame.render_widget(Clear, popup_area);

    let lines: Vec<Line> = keybindings
        .iter()
        .map(|(key, desc)| {
            if key.is_empty() {
                // Section header or empty line
                Line::from(Span::styled(
                    format!("{:^38}", desc),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(vec![
                    Span::styled(
                        format!("{:>18}", key),
                        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  "),
                    Span::styled(desc.to_string(), Style::default().fg(Color::White)),
                ])
            }
        })
        .collect();

    let help_text = Paragraph::new(lines)
        .block(popup_block(" Help (H or Esc to close) ", Color::Cyan))
        .style(Style::default().bg(Color::Black));

    frame.render_widget(help_text, popup_area);
}

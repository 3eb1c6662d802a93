//! Progress bar rendering

use std::time::Duration;

use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Gauge},
    Frame,
};

use crate::model::{PlaybackInfo, PlaybackState, RenderState};
use super::utils::format_duration;

fn status_text(playback: &PlaybackInfo) -> String {
    let Some(song) = &playback.song else {
        return " Nothing playing".to_string();
    };
    let icon = match playback.state {
        PlaybackState::Playing => "▶",
        PlaybackState::Paused => "⏸",
        PlaybackState::Loading => "…",
        PlaybackState::Ended => "■",
        PlaybackState::Idle => " ",
    };
    format!(" {} {} | {}", icon, song.title, song.artist)
}

fn progress_ratio(elapsed: Duration, duration: Option<Duration>) -> f64 {
    match duration {
        Some(total) if !total.is_zero() => {
            (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

pub fn render_progress_bar(frame: &mut Frame, area: Rect, state: &RenderState) {
    let playback = &state.playback;

    let time_str = match playback.duration {
        Some(total) => format!("{} / {}", format_duration(playback.elapsed), format_duration(total)),
        None => format_duration(playback.elapsed),
    };

    let title = format!("{} ", status_text(playback));
    let controls_info = format!(
        " {} | Page {}/{} | Vol: {}% | h for help ",
        state.page.sort.label(),
        state.page.page,
        state.page.total_pages().max(1),
        playback.volume_percent()
    );

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .title_bottom(Line::from(controls_info).right_aligned()),
        )
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(progress_ratio(playback.elapsed, playback.duration))
        .label(time_str);

    frame.render_widget(gauge, area);
}

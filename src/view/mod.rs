//! View module - UI rendering
//!
//! This module handles all UI rendering for the application using ratatui.
//! It is organized into submodules by component type:
//!
//! - `utils`: Shared utility functions (formatting, scrollable lists)
//! - `layout`: Main layout structure (top bar, sidebar)
//! - `content`: Main content area rendering
//! - `progress`: Progress bar rendering
//! - `overlays`: Notices, prompts and the help popup

mod utils;
mod layout;
mod content;
mod progress;
mod overlays;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

use crate::model::RenderState;

pub struct AppView;

impl AppView {
    pub fn render(frame: &mut Frame, state: &RenderState) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Search bar + user
                Constraint::Min(0),    // Main content (sidebar + content)
                Constraint::Length(3), // Progress bar with playback info
            ])
            .split(frame.area());

        layout::render_top_bar(frame, chunks[0], state);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(30), // Sections + playlists
                Constraint::Percentage(70), // Main content
            ])
            .split(chunks[1]);

        layout::render_sidebar(frame, main_chunks[0], state);
        content::render_main_content(frame, main_chunks[1], state);
        progress::render_progress_bar(frame, chunks[2], state);

        if let Some(prompt) = &state.ui.prompt {
            overlays::render_prompt(frame, prompt, &state.content.playlists);
        }

        if state.ui.show_help_popup {
            overlays::render_help_popup(frame);
        }

        // Drawn last so it sits above prompts
        if let Some(notice) = &state.ui.notice {
            overlays::render_notice(frame, notice);
        }
    }
}

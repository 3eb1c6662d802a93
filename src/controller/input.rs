//! Key event handling

use std::future::Future;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::model::{ActiveSection, NoticeKind, Prompt, PromptField};
use super::AppController;

impl AppController {
    pub async fn handle_key_event(&self, key: KeyEvent) -> Result<()> {
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        let mut model = self.model.lock().await;

        // Errors block input until dismissed or expired
        let blocking = model
            .ui_state
            .notice
            .as_ref()
            .is_some_and(|n| n.kind == NoticeKind::Error);
        if blocking {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                model.clear_notice();
            }
            return Ok(());
        }

        if model.is_help_popup_open() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('H')) {
                model.hide_help_popup();
            }
            return Ok(());
        }

        if model.ui_state.prompt.is_some() {
            drop(model);
            return self.handle_prompt_key(key).await;
        }

        let section = model.ui_state.active_section;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        // Typing goes to the query in the search section; commands need Ctrl there
        if section == ActiveSection::Search {
            match key.code {
                KeyCode::Char(c) if !ctrl => {
                    model.append_to_search(c);
                    return Ok(());
                }
                KeyCode::Char('q') if ctrl => {
                    model.set_should_quit(true);
                    return Ok(());
                }
                KeyCode::Char('g') if ctrl => {
                    drop(model);
                    self.cycle_search_genre().await;
                    return Ok(());
                }
                KeyCode::Char('l') if ctrl => {
                    drop(model);
                    self.spawn_action("toggle_like", |c| async move { c.toggle_like_selected().await });
                    return Ok(());
                }
                KeyCode::Char('a') if ctrl => {
                    drop(model);
                    self.open_add_to_playlist().await;
                    return Ok(());
                }
                KeyCode::Char('p') if ctrl => {
                    drop(model);
                    self.toggle_playback().await;
                    return Ok(());
                }
                KeyCode::Backspace => {
                    model.backspace_search();
                    return Ok(());
                }
                KeyCode::Esc => {
                    model.clear_search();
                    return Ok(());
                }
                KeyCode::Enter => {
                    let stale = model.ui_state.search_query.trim()
                        != model.content_state.search.query.as_str();
                    if stale {
                        let request = model.begin_search();
                        drop(model);
                        self.spawn_search(request);
                    } else if let Some(index) = model.selected_search_playlist() {
                        drop(model);
                        self.open_search_playlist(index).await;
                    } else {
                        drop(model);
                        self.play_selected().await;
                    }
                    return Ok(());
                }
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                model.set_should_quit(true);
            }
            KeyCode::Tab => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    model.cycle_section_backward();
                } else {
                    model.cycle_section_forward();
                }
            }
            KeyCode::BackTab => {
                model.cycle_section_backward();
            }
            KeyCode::Up => {
                model.move_selection_up();
            }
            KeyCode::Down => {
                model.move_selection_down();
            }
            KeyCode::Enter => match section {
                ActiveSection::Library if model.ui_state.track_selected.is_none() => {
                    model.toggle_playlist_focus();
                }
                _ => {
                    drop(model);
                    self.play_selected().await;
                }
            },
            KeyCode::Esc | KeyCode::Backspace => {
                if section == ActiveSection::Library && model.ui_state.track_selected.is_some() {
                    model.toggle_playlist_focus();
                } else {
                    model.clear_notice();
                }
            }
            // Transport
            KeyCode::Char(' ') => {
                drop(model);
                self.toggle_playback().await;
            }
            KeyCode::Char('n') | KeyCode::Char('N') => {
                drop(model);
                self.next_track().await;
            }
            KeyCode::Char('b') | KeyCode::Char('B') => {
                drop(model);
                self.previous_track().await;
            }
            KeyCode::Right => {
                drop(model);
                self.seek_forward().await;
            }
            KeyCode::Left => {
                drop(model);
                self.seek_backward().await;
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                drop(model);
                self.volume_up().await;
            }
            KeyCode::Char('-') => {
                drop(model);
                self.volume_down().await;
            }
            // Catalog
            KeyCode::Char(']') => {
                drop(model);
                self.next_page().await;
            }
            KeyCode::Char('[') => {
                drop(model);
                self.previous_page().await;
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                drop(model);
                self.toggle_sort().await;
            }
            KeyCode::Char('r') | KeyCode::Char('R') => {
                let request = model.reload_catalog();
                drop(model);
                self.spawn_page_load(Some(request));
            }
            // Likes and playlists
            KeyCode::Char('l') | KeyCode::Char('L') => {
                drop(model);
                self.spawn_action("toggle_like", |c| async move { c.toggle_like_selected().await });
            }
            KeyCode::Char('a') | KeyCode::Char('A') => {
                drop(model);
                self.open_add_to_playlist().await;
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                model.open_prompt(Prompt::NewPlaylist {
                    name: String::new(),
                    image_path: String::new(),
                    field: PromptField::Name,
                });
            }
            KeyCode::Char('x') | KeyCode::Char('X') => {
                drop(model);
                self.spawn_action("remove_from_playlist", |c| async move {
                    c.remove_selected_track().await
                });
            }
            KeyCode::Char('/') => {
                model.ui_state.active_section = ActiveSection::Search;
            }
            KeyCode::Char('h') | KeyCode::Char('H') => {
                model.show_help_popup();
            }
            _ => {}
        }
        Ok(())
    }

    fn spawn_action<F, Fut>(&self, operation: &'static str, action: F)
    where
        F: FnOnce(AppController) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.spawn_background(operation, action(self.clone()));
    }

    async fn open_add_to_playlist(&self) {
        let mut model = self.model.lock().await;
        let Some(song) = model.selected_song() else {
            return;
        };
        if model.user().is_none() {
            model.set_error("You must be logged in to edit a playlist.".to_string());
            return;
        }
        if model.content_state.playlists.is_empty() {
            model.set_info("Create a playlist first (press c).".to_string());
            return;
        }
        model.open_prompt(Prompt::AddToPlaylist { song, selected: 0 });
    }

    async fn handle_prompt_key(&self, key: KeyEvent) -> Result<()> {
        let mut model = self.model.lock().await;
        let playlist_count = model.content_state.playlists.len();

        if key.code == KeyCode::Esc {
            model.close_prompt();
            return Ok(());
        }

        if key.code == KeyCode::Enter {
            let Some(prompt) = model.close_prompt() else {
                return Ok(());
            };
            drop(model);
            match prompt {
                Prompt::NewPlaylist { name, image_path, .. } => {
                    self.spawn_action("create_playlist", move |c| async move {
                        c.create_playlist(&name, &image_path).await
                    });
                }
                Prompt::AddToPlaylist { song, selected } => {
                    self.spawn_action("add_to_playlist", move |c| async move {
                        c.add_to_playlist(selected, &song).await
                    });
                }
            }
            return Ok(());
        }

        match model.prompt_mut() {
            Some(Prompt::NewPlaylist { name, image_path, field }) => {
                let target = match *field {
                    PromptField::Name => name,
                    PromptField::ImagePath => image_path,
                };
                match key.code {
                    KeyCode::Tab | KeyCode::BackTab => {
                        *field = match *field {
                            PromptField::Name => PromptField::ImagePath,
                            PromptField::ImagePath => PromptField::Name,
                        };
                    }
                    KeyCode::Backspace => {
                        target.pop();
                    }
                    KeyCode::Char(c) => target.push(c),
                    _ => {}
                }
            }
            Some(Prompt::AddToPlaylist { selected, .. }) => match key.code {
                KeyCode::Up => *selected = selected.saturating_sub(1),
                KeyCode::Down => {
                    if *selected + 1 < playlist_count {
                        *selected += 1;
                    }
                }
                _ => {}
            },
            None => {}
        }
        Ok(())
    }
}

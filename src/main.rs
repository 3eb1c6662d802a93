mod audio;
mod auth;
mod backend;
mod config;
mod controller;
mod error;
mod logging;
mod model;
mod view;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::Mutex;

use audio::AudioBackend;
use backend::{Backend, RestBackend};
use config::AppConfig;
use controller::AppController;
use model::{AppModel, PAGE_SIZE};
use view::AppView;

const FRAME_POLL: Duration = Duration::from_millis(50);
const SESSION_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = logging::init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::info!("=== tunebase starting ===");

    let config = AppConfig::from_env()?;
    let rest = Arc::new(RestBackend::new(&config).context("Could not create backend client")?);

    let session = auth::authenticate(&rest, &config).await?;
    match &session {
        Some(s) => tracing::info!(user_id = %s.user.id, "Session established"),
        None => tracing::info!("Running signed out"),
    }

    let (audio, audio_events) = AudioBackend::new(config.request_timeout)?;

    let mut app_model = AppModel::new(Box::new(audio), PAGE_SIZE);
    app_model.set_user(session.map(|s| s.user));
    let model = Arc::new(Mutex::new(app_model));

    let shared: Arc<dyn Backend> = rest.clone();
    let controller = AppController::new(model.clone(), shared);
    controller.start_audio_event_listener(audio_events);

    controller.load_catalog().await;
    let controller_for_init = controller.clone();
    controller.spawn_background("load_user_data", async move {
        controller_for_init.load_genres().await;
        controller_for_init.load_user_data().await;
    });

    tracing::info!("Starting TUI...");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let res = run_app(&mut terminal, model, controller, rest, config.cache_dir.clone()).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = ?err, "Application error");
    }

    tracing::info!("tunebase shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    model: Arc<Mutex<AppModel>>,
    controller: AppController,
    rest: Arc<RestBackend>,
    cache_dir: PathBuf,
) -> Result<()> {
    let mut last_session_check = Instant::now();

    loop {
        if last_session_check.elapsed() >= SESSION_CHECK_INTERVAL {
            last_session_check = Instant::now();
            let rest = rest.clone();
            let cache_dir = cache_dir.clone();
            tokio::spawn(async move {
                if let Err(e) = auth::refresh_if_needed(&rest, &cache_dir).await {
                    tracing::warn!(error = %e, "Session refresh check failed");
                }
            });
        }

        let (state, should_quit) = {
            let mut model = model.lock().await;
            model.auto_clear_old_notice(Instant::now());
            model.tick();
            (model.render_state(), model.should_quit())
        };

        if should_quit {
            if tokio::time::timeout(SHUTDOWN_GRACE, controller.finish_background())
                .await
                .is_err()
            {
                tracing::warn!("Background operations still running at shutdown");
            }
            break;
        }

        terminal.draw(|f| AppView::render(f, &state))?;

        if event::poll(FRAME_POLL)? {
            if let Event::Key(key) = event::read()? {
                if let Err(e) = controller.handle_key_event(key).await {
                    tracing::warn!(error = %e, "Key handling failed");
                }
            }
        }
    }

    Ok(())
}

mod cli;
pub mod conversation;
pub mod desktop_bridge;
pub mod error;
pub mod models;
pub mod normalize;
pub mod sensing;
pub mod settings;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use uuid::Uuid;

use cli::Cli;
use conversation::OpenAiClient;
use desktop_bridge::{
    find_window, CommandOcrEngine, DesktopReplyDispatcher, DesktopWindowCapture, WindowCapture,
};
use error::WatchError;
use sensing::{Collaborators, LoopConfig, Pipeline, WatchController};
use settings::Settings;

pub use utils::logging::init_logging;

/// Log every visible window title and return the first one matching `prefix`.
fn resolve_window_title(capture: &dyn WindowCapture, prefix: &str) -> Result<String, WatchError> {
    let windows = capture.list_windows()?;

    info!("---------------------------------");
    info!("All visible windows' titles are:");
    for window in windows.iter().filter(|window| window.visible) {
        info!("{}", window.title);
    }

    let visible: Vec<_> = windows.into_iter().filter(|window| window.visible).collect();
    let window = find_window(&visible, prefix).ok_or_else(|| WatchError::WindowNotFound {
        prefix: prefix.to_string(),
    })?;
    Ok(window.title.clone())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug || utils::logging::debug_requested());

    let mut settings = Settings::load(cli.settings.as_deref())?;
    cli.apply_overrides(&mut settings);
    settings.validate()?;

    let capture = Arc::new(DesktopWindowCapture::new());

    if cli.list_windows {
        for window in capture.list_windows()? {
            let marker = if window.visible { "" } else { " (hidden)" };
            println!("{}{}", window.title, marker);
        }
        return Ok(());
    }

    // Credentials are checked before the first capture.
    let api_key = settings::api_key_from_env()?;

    let run_id = Uuid::new_v4();
    info!("chatwatch run {run_id} starting up...");

    let window_title = resolve_window_title(capture.as_ref(), &settings.window_title_prefix)?;
    info!("Matched one: chat_window_title={window_title}");

    let collaborators = Collaborators {
        capture,
        ocr: Arc::new(CommandOcrEngine::new(&settings.ocr_command)?),
        completion: Arc::new(OpenAiClient::new(
            api_key,
            Some(settings.completion_base_url.clone()),
        )?),
        dispatcher: Arc::new(DesktopReplyDispatcher::new()),
    };
    let config = LoopConfig {
        title_prefix: settings.window_title_prefix.clone(),
        input_box: settings.input_box.into(),
        poll_interval: settings.poll_interval(),
        run_budget: settings.run_budget(),
    };
    let pipeline = Pipeline::from_settings(&settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    runtime.block_on(async move {
        let mut controller = WatchController::new();
        let cancel_token = controller.start(pipeline, collaborators, config)?;

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current cycle");
                cancel_token.cancel();
            }
        });

        let stats = controller.wait().await?;
        info!(
            "chatwatch run {run_id} finished: {} questions answered in {} cycles",
            stats.answered_count, stats.cycles
        );
        Ok::<(), anyhow::Error>(())
    })
}

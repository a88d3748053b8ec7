// ChessMate client entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config
// 3. Build the HTTP action client
// 4. Create mpsc channels
// 5. Initialize AppState
// 6. Spawn the channel task and request the initial connect
// 7. Spawn the app event loop
// 8. Run the TUI until the user quits
// 9. Cleanup on exit

use chessmate::api::ActionClient;
use chessmate::app::{self, AppState};
use chessmate::channel::{self, ChannelConfig};
use chessmate::config;
use chessmate::protocol::ChannelCommand;
use chessmate::tui;

use anyhow::Context;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not the terminal owned by the TUI)
    init_tracing()?;
    info!("chessmate client starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "config loaded: authority at {}, channel at {}",
        config.server.http_url, config.server.ws_url
    );

    // 3. Build the HTTP action client
    let api = ActionClient::new(
        config.server.http_url.clone(),
        config.connect_timeout(),
        config.request_timeout(),
    )
    .context("failed to build HTTP client")?;

    // 4. Create mpsc channels
    let (channel_cmd_tx, channel_cmd_rx) = mpsc::channel(64);
    let (channel_event_tx, channel_event_rx) = mpsc::channel(256);
    let (action_tx, action_rx) = mpsc::channel(64);
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (ui_tx, ui_rx) = mpsc::channel(256);

    // 5. Initialize AppState
    let state = AppState::new(
        config.clone(),
        api,
        action_tx,
        channel_cmd_tx.clone(),
    );

    // 6. Spawn the channel task and request the initial connect
    let channel_cfg = ChannelConfig {
        url: config.server.ws_url.clone(),
        connect_timeout: config.connect_timeout(),
        base_delay: config.base_delay(),
        max_attempts: config.connection.max_attempts,
    };
    let channel_handle = tokio::spawn(async move {
        if let Err(e) = channel::run(channel_cfg, channel_cmd_rx, channel_event_tx).await {
            error!("channel task error: {}", e);
        }
    });
    channel_cmd_tx
        .send(ChannelCommand::Connect)
        .await
        .context("channel task unavailable at startup")?;

    // 7. Spawn the app event loop
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(channel_event_rx, action_rx, cmd_rx, ui_tx, state).await {
            error!("application loop error: {}", e);
        }
    });

    // 8. Run the TUI (blocks until the user quits)
    if let Err(e) = tui::run(ui_rx, cmd_tx).await {
        error!("TUI error: {}", e);
    }

    // 9. Cleanup: give the app loop a moment to drain, then stop the channel
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;
    channel_handle.abort();

    info!("chessmate client shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by
/// the TUI).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("chessmate.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chessmate=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

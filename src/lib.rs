//! simplerpc: a headless bridge that mirrors editor activity to Discord Rich
//! Presence.
//!
//! The editor plugin pushes active-file/workspace/configuration events over a
//! localhost control surface; the bridge keeps one Discord session alive and
//! refreshes the presence payload on a fixed cadence.

pub mod control_server;
pub mod discord;
pub mod editor;
pub mod logging;
pub mod notify;
pub mod presence;
pub mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use control_server::ControlServer;
use discord::DiscordClient;
use notify::NotificationHub;
use presence::PresenceManager;
use settings::SettingsStore;

pub use control_server::DEFAULT_PORT;

pub struct RunOptions {
    pub port: u16,
    pub config_path: Option<PathBuf>,
}

/// Wire everything up, perform the initial connect, and run until ctrl-c.
pub async fn run(options: RunOptions) -> Result<(), String> {
    let config_path = options
        .config_path
        .unwrap_or_else(SettingsStore::default_path);
    let settings = Arc::new(SettingsStore::load(config_path));

    let hub = Arc::new(NotificationHub::new());
    let manager = Arc::new(PresenceManager::new(
        Box::new(DiscordClient::new()),
        Arc::clone(&settings),
        hub.clone(),
    ));

    let server = ControlServer::start(
        options.port,
        Arc::clone(&manager),
        Arc::clone(&hub),
        tokio::runtime::Handle::current(),
    )?;

    manager.connect().await;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to listen for shutdown signal: {}", e))?;

    tracing::info!("Shutting down");
    manager.disconnect().await;
    server.stop();

    Ok(())
}

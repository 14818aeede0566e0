//! cloudtray
//!
//! Keeps a live list of cloud servers with their reachability and shows it
//! in a fixed set of menu slots. This binary drives the menu from the
//! console.

use clap::Parser;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cloudtray_core::config::default_settings_path;
use cloudtray_core::{
    ConfigStore, DisplaySlotPool, EntityTable, JsonSettingsFile, Settings, SettingsStore, Shutdown,
};
use cloudtray_plugin_ping::IcmpCheck;
use cloudtray_plugin_scaleway::ScalewayInventory;
use cloudtray_scheduler::{HealthProbe, InventoryRefresher};

mod app;
mod clipboard;
mod commands;
mod tray;

use app::App;
use commands::{parse_command, Command};
use tray::ConsoleTray;

/// cloudtray
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the settings file
    #[arg(short, long, env = "CLOUDTRAY_CONFIG")]
    config: Option<PathBuf>,

    /// Number of menu slots
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(u16).range(1..=500))]
    slots: u16,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Print exported text instead of using the system clipboard
    #[arg(long)]
    no_clipboard: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,cloudtray=debug".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Settings from `path`, defaults when the file is missing or unreadable
fn load_settings(path: Option<&Path>) -> Settings {
    let Some(path) = path else {
        warn!("No configuration directory, using default settings");
        return Settings::default();
    };

    if !path.exists() {
        info!(path = %path.display(), "No settings file yet, using defaults");
        return Settings::default();
    }

    match JsonSettingsFile.load(path) {
        Ok(settings) => {
            debug!(path = %path.display(), "Settings loaded");
            settings
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load settings, using defaults");
            Settings::default()
        }
    }
}

/// Forward console lines to the coordinator until stdin closes.
///
/// Runs on its own thread: a blocking stdin read must not hold up runtime
/// shutdown.
fn spawn_console(commands: mpsc::Sender<Command>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(error = %e, "Failed to read console input");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(command) => {
                        if commands.blocking_send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => println!("{:#}", e),
                }
            }
        })?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Parse CLI args
    let args = Args::parse();

    init_tracing(args.log_json);

    // Load configuration
    let settings_path = args.config.clone().or_else(default_settings_path);
    let mut settings = load_settings(settings_path.as_deref());
    let env_overrides = settings.apply_env_overrides();
    if !env_overrides.is_empty() {
        let vars: Vec<_> = env_overrides.iter().map(|o| o.var()).collect();
        info!(?vars, "Credentials taken from the environment, not saved");
    }
    info!(
        settings = ?settings,
        slots = args.slots,
        "Starting cloudtray"
    );

    // Shared state
    let config = Arc::new(ConfigStore::new(settings).with_env_overrides(env_overrides));
    let table = Arc::new(EntityTable::new());
    let tray = Arc::new(ConsoleTray::new(usize::from(args.slots)));
    let (pool, clicks) = DisplaySlotPool::new(tray.items());
    let pool = Arc::new(pool);

    // Workers
    let (refresher, refresher_handle) = InventoryRefresher::new(
        config.clone(),
        table.clone(),
        pool.clone(),
        Arc::new(ScalewayInventory::new()),
    );
    let (prober, probe_handle) = HealthProbe::new(
        config.clone(),
        table.clone(),
        Arc::new(IcmpCheck::new()),
        refresher_handle.redraw_notifier(),
    );
    let refresher = refresher.with_probe_trigger(probe_handle.trigger_notifier());

    let mut shutdown = Shutdown::new();
    shutdown.register(refresher_handle.stop_notifier());
    shutdown.register(probe_handle.stop_notifier());
    let app_stop = shutdown.subscribe();
    let shutdown = Arc::new(shutdown);

    info!("Starting workers");
    let workers = vec![refresher.spawn(), prober.spawn()];

    // Ctrl-C stops everything
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupted, shutting down");
                signal_shutdown.trigger();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let (command_tx, command_rx) = mpsc::channel(16);
    spawn_console(command_tx)?;

    let app = App::new(
        config,
        table,
        pool,
        tray,
        clipboard::select(args.no_clipboard),
        refresher_handle,
        probe_handle,
    )
    .with_settings_path(settings_path);

    println!("Type `help` for commands");
    app.run(clicks, command_rx, app_stop).await;

    // Stop workers, then persist
    shutdown.trigger();
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(error = %e, "Worker task failed");
        }
    }

    if let Some(path) = app.settings_path() {
        info!(path = %path.display(), "Saving settings");
    }
    app.save_settings();

    info!("Stopped");
    Ok(())
}

pub mod classifier;
pub mod duration;
pub mod error;
pub mod log_source;
pub mod notifier;
pub mod respawn;
pub mod session;
pub mod settings;
#[cfg(test)]
pub(crate) mod test_support;
pub mod time_normalizer;
pub mod tracker;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::notifier::{CollectingSink, StdoutSink, WebhookDispatcher};
use crate::respawn::RespawnTable;
use crate::session::LogSession;
use crate::settings::{Settings, DEFAULT_SETTINGS_PATH};
use crate::tracker::{DeathTracker, Features};

#[derive(Debug, Parser)]
#[command(name = "time-of-death", version, about = "Announces hailed corpses with their time of death")]
pub struct Cli {
    /// Settings file.
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Follow a live game log and send notifications to the webhook.
    Watch {
        /// Game log file or game folder; overrides the settings file.
        #[arg(long)]
        log: Option<PathBuf>,

        /// Only track kills and hails, without zones, time normalization or respawn timers.
        #[arg(long)]
        basic: bool,
    },
    /// Process an existing game log from the beginning.
    Replay {
        file: PathBuf,

        /// Send notifications to the webhook instead of printing them.
        #[arg(long)]
        deliver: bool,

        #[arg(long)]
        basic: bool,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("failed to load settings from {}", cli.config.display()))?;
    init_logging(settings.log_level.as_deref());

    match cli.command {
        Command::Watch { log, basic } => watch(&settings, log, basic).await,
        Command::Replay {
            file,
            deliver,
            basic,
        } => replay(&settings, &file, deliver, basic).await,
    }
}

fn init_logging(log_level: Option<&str>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(log_level.unwrap_or("info"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn watch(settings: &Settings, log: Option<PathBuf>, basic: bool) -> anyhow::Result<()> {
    let location = log
        .or_else(|| settings.log.path.clone())
        .context("no game log configured; pass --log or set [log] path")?;
    let log_path = log_source::resolve_log_path(&location)?;

    let tracker = build_tracker(settings, basic)?;
    let dispatcher = WebhookDispatcher::spawn(
        settings.webhook.destination(),
        settings.webhook.queue_capacity,
    );
    let mut session = LogSession::new(tracker, dispatcher);

    tokio::select! {
        result = log_source::watch_game_log(&log_path, &mut session) => {
            if let Err(error) = result {
                tracing::error!("Game log watcher stopped: {error}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, stopping game log watch");
        }
    }

    tracing::info!(
        notifications = session.notifications_submitted(),
        "Game log watch finished"
    );
    session.into_sink().shutdown().await;
    Ok(())
}

async fn replay(settings: &Settings, file: &Path, deliver: bool, basic: bool) -> anyhow::Result<()> {
    let tracker = build_tracker(settings, basic)?;

    let summary = if deliver {
        let mut session = LogSession::new(tracker, CollectingSink::default());
        let summary = log_source::replay_log_file(file, &mut session)?;
        let notifications = session.into_sink().into_notifications();

        let dispatcher = WebhookDispatcher::spawn(
            settings.webhook.destination(),
            settings.webhook.queue_capacity,
        );
        let queued = dispatcher.deliver_all(notifications).await;
        dispatcher.shutdown().await;
        tracing::info!(queued, "Replayed notifications handed to the webhook");
        summary
    } else {
        let mut session = LogSession::new(tracker, StdoutSink);
        log_source::replay_log_file(file, &mut session)?
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn build_tracker(settings: &Settings, basic: bool) -> anyhow::Result<DeathTracker> {
    let features = if basic {
        Features::basic()
    } else {
        settings.features()
    };

    if !features.annotate_respawn {
        return Ok(DeathTracker::new(features, RespawnTable::default()));
    }

    let respawn_table = match RespawnTable::load(&settings.respawn.table_path) {
        Ok(table) => table,
        Err(Error::RespawnTableMissing(path)) => {
            tracing::warn!(
                table_path = %path.display(),
                "Respawn table not found; no respawn timers will be reported"
            );
            RespawnTable::default()
        }
        Err(error) => return Err(error).context("failed to load respawn table"),
    };

    Ok(DeathTracker::new(features, respawn_table))
}

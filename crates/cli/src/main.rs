mod config_commands;
mod db_commands;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    relaydesk_config::RelaydeskConfig,
    relaydesk_media::CaptureSettings,
    relaydesk_metrics::{MetricsRecorderConfig, init_metrics},
    relaydesk_routing::{DeskConfig, Dispatcher},
    relaydesk_tickets::SqliteTicketStore,
    tracing::{error, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "relaydesk", about = "relaydesk: Telegram support desk bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (skips discovery in ./ and the user config dir).
    #[arg(long, global = true, env = "RELAYDESK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot (default when no subcommand is provided).
    Run,
    /// Database management (migrate, reset).
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Validate the configuration and report errors/warnings.
    Check,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "relaydesk starting");

    let config = config_commands::load(cli.config.as_deref())?;

    match cli.command {
        None | Some(Commands::Run) => run(config).await,
        Some(Commands::Db { action }) => db_commands::handle_db(action, &config).await,
        Some(Commands::Check) => config_commands::check(&config),
    }
}

async fn run(config: RelaydeskConfig) -> anyhow::Result<()> {
    let report = relaydesk_config::validate(&config);
    for d in &report.diagnostics {
        match d.severity {
            relaydesk_config::Severity::Error => error!(path = d.path, "{}", d.message),
            relaydesk_config::Severity::Warning => warn!(path = d.path, "{}", d.message),
        }
    }
    if report.has_errors() {
        anyhow::bail!("configuration has errors, run `relaydesk check` for details");
    }

    init_metrics(&MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        listen: config.metrics.listen.clone(),
    })?;

    let url = db_commands::prepare_database_url(&config)?;
    let store = Arc::new(
        SqliteTicketStore::new(&url, config.database.max_connections)
            .await
            .context("failed to open ticket database")?,
    );

    let bot = relaydesk_telegram::connect(&config.telegram)
        .await
        .context("failed to connect to telegram")?;

    let dispatcher = Dispatcher::new(store, bot.outbound.clone(), DeskConfig {
        operators_chat_id: config.telegram.operators_chat_id,
        abandon_after: Duration::from_secs(config.intake.abandon_after_secs),
        capture: CaptureSettings {
            persist: config.media.persist,
            root: config.media_root(),
            download_timeout: Duration::from_secs(config.media.download_timeout_secs),
        },
        default_country_code: config.intake.default_country_code.clone(),
    });

    let polling = relaydesk_telegram::start_polling(bot, dispatcher);
    info!(
        operators_chat_id = config.telegram.operators_chat_id,
        persist_media = config.media.persist,
        "relaydesk running"
    );

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("shutdown requested");
        },
        () = polling.cancel.cancelled() => {
            warn!("telegram polling stopped on its own");
        },
    }
    polling.shutdown().await;
    Ok(())
}

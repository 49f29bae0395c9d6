//! SNIPER: Smart Money Concepts signal scanner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the preference store, starts the poll scheduler (and the
//! autopilot if enabled) and serves the dashboard until Ctrl+C.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use sniper::analyst::anthropic::AnthropicAnalyst;
use sniper::analyst::EventAnalyst;
use sniper::backtest::Backtester;
use sniper::config;
use sniper::dashboard::{self, routes::DashboardState};
use sniper::data::SimulatedSideData;
use sniper::engine::notify::{NotificationPolicy, TerminalBell};
use sniper::engine::{ScanContext, ScanSettings, ScanState, Scheduler};
use sniper::scanner::sniper::SniperScanner;
use sniper::sink::telegram::TelegramSink;
use sniper::storage::daily::DailyPrep;
use sniper::storage::prefs::Preferences;
use sniper::storage::{JsonFileStore, KeyValueStore};

const BANNER: &str = r#"
 ____  _   _ ___ ____  _____ ____
/ ___|| \ | |_ _|  _ \| ____|  _ \
\___ \|  \| || || |_) |  _| | |_) |
 ___) | |\  || ||  __/| |___|  _ <
|____/|_| \_|___|_|   |_____|_| \_\

  Smart Money Concepts Scanner
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        poll_interval_secs = cfg.scanner.poll_interval_secs,
        autopilot = cfg.autopilot.enabled,
        autopilot_interval_secs = cfg.autopilot.interval_secs,
        balance = cfg.account.balance,
        risk_pct = cfg.account.risk_pct,
        "SNIPER starting up"
    );

    // -- Preferences -----------------------------------------------------

    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&cfg.storage.path)?);
    let prefs = Preferences::load(store.clone());
    let daily = DailyPrep::load(store, Utc::now().date_naive());
    info!(
        path = %cfg.storage.path,
        watchlist = prefs.watchlist().len(),
        favorites = prefs.favorites().len(),
        "Preferences loaded"
    );

    // -- Collaborators ---------------------------------------------------

    let sink = TelegramSink::from_config(&cfg.telegram)?;
    if sink.is_enabled() {
        info!("Telegram delivery enabled");
    }

    let analyst: Option<Arc<dyn EventAnalyst>> = match &cfg.analyst {
        Some(analyst_cfg) => AnthropicAnalyst::from_config(analyst_cfg)?.map(|client| {
            info!(model = %analyst_cfg.model, "Using Anthropic event analyst");
            Arc::new(client) as Arc<dyn EventAnalyst>
        }),
        None => None,
    };

    let ctx = Arc::new(ScanContext {
        generator: Arc::new(SniperScanner::new()),
        side_data: Arc::new(SimulatedSideData::new()),
        sink: Arc::new(sink),
        chime: Arc::new(TerminalBell),
        state: Arc::new(ScanState::new(
            cfg.scanner.max_opportunities,
            cfg.alerts.notification_ttl(),
            cfg.alerts.action_ttl(),
            cfg.account,
        )),
        prefs: Arc::new(RwLock::new(prefs)),
        policy: NotificationPolicy::new(cfg.alerts.sound),
        settings: ScanSettings::from_config(&cfg),
    });

    // -- Scheduler and dashboard -----------------------------------------

    let mut scheduler = Scheduler::new(ctx.clone());
    scheduler.start(cfg.autopilot.enabled).await;

    let app_state = Arc::new(DashboardState::new(scheduler, daily, analyst, Backtester::new()));

    let server = if cfg.dashboard.enabled {
        Some(dashboard::spawn_dashboard(app_state.clone(), cfg.dashboard.port).await?)
    } else {
        info!("Dashboard disabled");
        None
    };

    info!("Scanner running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received.");

    app_state.scheduler.lock().await.shutdown().await;
    if let Some(server) = server {
        server.abort();
    }

    let status = ctx.state.status().await;
    info!(
        cycles = status.cycles,
        failed_cycles = status.failed_cycles,
        retained = ctx.state.book().await.len(),
        "SNIPER shut down cleanly."
    );

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sniper=info"));

    let json_logging = std::env::var("SNIPER_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

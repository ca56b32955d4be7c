//! PADDOCK: racing odds monitor.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! starts the refresh scheduler over the scraping backend, serves the
//! dashboard and optionally writes every new board to disk, with graceful
//! shutdown on Ctrl+C.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use paddock::config;
use paddock::dashboard::{self, routes::DashboardState};
use paddock::engine::{self, Notice, SchedulerView};
use paddock::export::{self, CourseSelection};
use paddock::feed::client::ApiClient;
use paddock::feed::{FetchRequest, RaceSource};
use paddock::storage::PreferenceStore;

const BANNER: &str = r#"
 ____   _    ____  ____   ___   ____ _  __
|  _ \ / \  |  _ \|  _ \ / _ \ / ___| |/ /
| |_) / _ \ | | | | | | | | | | |   | ' /
|  __/ ___ \| |_| | |_| | |_| | |___| . \
|_| /_/   \_\____/|____/ \___/ \____|_|\_\

  Racing odds monitor
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        api = %cfg.api.base_url,
        odds_field = %cfg.normalizer.odds_field,
        interval_minutes = cfg.refresh.interval_minutes,
        auto_export = cfg.export.auto_export,
        "PADDOCK starting up"
    );

    // -- Initialise components -------------------------------------------

    let client = ApiClient::new(&cfg.api.base_url, Duration::from_secs(cfg.api.timeout_secs))?;
    match client.health().await {
        Ok(()) => info!(url = %client.base_url(), "Scraping backend reachable"),
        Err(e) => warn!(url = %client.base_url(), error = %e, "Scraping backend health check failed"),
    }

    let (scheduler, scheduler_task) = engine::spawn(
        Arc::new(client),
        cfg.normalizer.options(),
        cfg.normalizer.skip_first_upcoming_race,
    );

    let _dashboard = if cfg.dashboard.enabled {
        let prefs = PreferenceStore::open(Some(&cfg.storage.preferences_path))?;
        let state = Arc::new(DashboardState::new(scheduler.clone(), prefs));
        Some(dashboard::spawn_dashboard(state, cfg.dashboard.port).await?)
    } else {
        None
    };

    if cfg.refresh.auto_start {
        scheduler.start(cfg.refresh.interval_minutes).await?;
    } else {
        scheduler.refresh(FetchRequest::AllRaces).await?;
    }

    // -- Main loop -------------------------------------------------------

    let mut views = scheduler.subscribe();
    let mut exported = 0u64;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering main loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    error!("Scheduler stopped unexpectedly");
                    break;
                }
                let view = views.borrow_and_update().clone();
                if view.updates > exported {
                    exported = view.updates;
                    on_new_board(&view, &cfg);
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    if let Err(e) = scheduler.stop().await {
        warn!(error = %e, "Failed to stop auto-refresh timer");
    }
    drop(scheduler);
    drop(views);
    scheduler_task.abort();

    info!(boards = exported, "PADDOCK shut down cleanly.");
    Ok(())
}

/// Log the freshly installed board and write it out when auto-export is on.
fn on_new_board(view: &SchedulerView, cfg: &config::AppConfig) {
    let Some(board) = view.board.as_ref() else {
        return;
    };
    info!(
        title = %board.title,
        racecourses = board.racecourses.len(),
        rounds = board.round_count(),
        winners = board.winners.len(),
        "Board updated"
    );
    if matches!(view.notice, Some(Notice::NoData)) || !cfg.export.auto_export {
        return;
    }

    let now = Utc::now();
    for format in &cfg.export.formats {
        if let Err(e) = export::save(&cfg.export.output_dir, board, &CourseSelection::All, *format, now) {
            error!(error = %e, %format, "Auto-export failed");
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("paddock=info"));

    let json_logging = std::env::var("PADDOCK_LOG_JSON").is_ok();

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

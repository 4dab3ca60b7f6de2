//! Smart Money Tracker server
//!
//! Usage:
//!   smart-money serve --port 3001          Launch the HTTP API
//!   smart-money replay --file events.jsonl Feed a JSONL event file through
//!                                          the pipeline and print the board

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use clap::{Parser, Subcommand};
use engine::{IngestError, SmartMoneyTracker, SortMetric, TrackerConfig, TransactionEvent};
use persistence::{CheckpointStore, Database, MemoryCheckpointStore, SqliteCheckpointStore};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "smart-money")]
#[command(about = "Smart money wallet tracker and leaderboard", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the tracker web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3001)]
        port: u16,
        /// Seconds between background checkpoints
        #[arg(long, default_value_t = 60)]
        checkpoint_secs: u64,
        /// Number of worker shards
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Replay a JSONL event file through the pipeline (no web server)
    Replay {
        /// Path to a JSONL file, one TransactionEvent per line
        #[arg(long)]
        file: String,
        /// Metric to rank by: annualized_return, sharpe_ratio, win_rate, realized_pnl
        #[arg(long, default_value = "annualized_return")]
        sort_by: String,
        /// Lookback window in days
        #[arg(long, default_value_t = 30)]
        window: u32,
        /// Number of leaderboard rows to print
        #[arg(long, default_value_t = 10)]
        top_n: usize,
    },
}

#[derive(Clone)]
struct AppState {
    tracker: Arc<SmartMoneyTracker>,
    store: Arc<dyn CheckpointStore>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "debug,engine=debug,smart_money=debug"
    } else {
        "info,engine=info,smart_money=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve {
            host,
            port,
            checkpoint_secs,
            workers,
        } => {
            cmd_serve(&host, port, checkpoint_secs, workers).await?;
        }
        Commands::Replay {
            file,
            sort_by,
            window,
            top_n,
        } => {
            cmd_replay(&file, &sort_by, window, top_n).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(
    host: &str,
    port: u16,
    checkpoint_secs: u64,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    info!("Smart Money Tracker v{} starting...", APP_VERSION);

    let db_path =
        std::env::var("SMART_MONEY_DB_PATH").unwrap_or_else(|_| "data/tracker.db".to_string());
    let db = Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);

    let mut config = TrackerConfig::default();
    if let Some(workers) = workers {
        config.workers = workers;
    }
    let history_keep = config.history_cap as i64;
    let store: Arc<dyn CheckpointStore> = Arc::new(SqliteCheckpointStore::new(db, history_keep));

    // Rehydrate from the latest checkpoint instead of replaying history
    let restored = store.load().await?;
    if !restored.is_empty() {
        info!(
            positions = restored.positions.len(),
            wallets = restored.pnl.len(),
            "Rehydrating tracker from checkpoint"
        );
    }
    let tracker = Arc::new(SmartMoneyTracker::spawn_with(config, restored));

    let state = AppState {
        tracker: tracker.clone(),
        store: store.clone(),
    };

    // Periodic checkpoint flush
    let bg_tracker = tracker.clone();
    let bg_store = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(checkpoint_secs.max(1)));
        interval.tick().await;
        loop {
            interval.tick().await;
            bg_tracker.flush().await;
            let snapshot = bg_tracker.checkpoint().await;
            if let Err(e) = bg_store.save(&snapshot).await {
                error!("Checkpoint save failed: {}", e);
            }
        }
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/events", post(api_ingest_event))
        .route("/prices", post(api_observe_price))
        .route("/wallets", get(api_wallets))
        .route("/wallets/:wallet/pnl", get(api_wallet_pnl))
        .route("/wallets/:wallet/metrics", get(api_wallet_metrics))
        .route("/wallets/:wallet", delete(api_untrack_wallet))
        .route("/leaderboard", get(api_leaderboard))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Smart Money Tracker v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET    /api/health                    - Health check");
    println!("  POST   /api/events                    - Ingest a transaction event");
    println!("  POST   /api/prices                    - Observe a mark price");
    println!("  GET    /api/wallets                   - Tracked wallets overview");
    println!("  GET    /api/wallets/:wallet/pnl       - Wallet P&L record");
    println!("  GET    /api/wallets/:wallet/metrics   - Wallet metrics history");
    println!("  DELETE /api/wallets/:wallet           - Stop tracking a wallet");
    println!("  GET    /api/leaderboard               - Ranked wallets");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown requested");
        })
        .await?;

    // Final checkpoint before exit
    tracker.flush().await;
    let snapshot = tracker.checkpoint().await;
    if let Err(e) = store.save(&snapshot).await {
        error!("Final checkpoint failed: {}", e);
    }
    tracker.shutdown().await?;

    Ok(())
}

// ============================================================================
// Replay command — CLI mode (no web server)
// ============================================================================

async fn cmd_replay(file: &str, sort_by: &str, window: u32, top_n: usize) -> anyhow::Result<()> {
    println!("\n=== Smart Money Tracker v{} ===", APP_VERSION);

    let metric = SortMetric::parse(sort_by)
        .ok_or_else(|| anyhow::anyhow!("unknown sort metric: {sort_by}"))?;
    let config = TrackerConfig::default();
    if !config.windows.contains(&window) {
        anyhow::bail!(
            "window {window} not configured (available: {:?})",
            config.windows
        );
    }

    let content = std::fs::read_to_string(file)?;
    let tracker = SmartMoneyTracker::spawn(config);
    let store = MemoryCheckpointStore::new();

    let mut accepted = 0usize;
    let mut rejected = 0usize;
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: TransactionEvent = match serde_json::from_str(line) {
            Ok(ev) => ev,
            Err(e) => {
                warn!("line {}: unparseable event: {}", lineno + 1, e);
                rejected += 1;
                continue;
            }
        };
        let mut event = Some(event);
        while let Some(ev) = event.take() {
            match tracker.ingest(ev) {
                Ok(()) => accepted += 1,
                Err(IngestError::OverloadRejected { .. }) => {
                    // drain the queues, then retry the same event
                    let retry = serde_json::from_str(line)?;
                    tracker.flush().await;
                    event = Some(retry);
                }
                Err(e) => {
                    warn!("line {}: rejected: {}", lineno + 1, e);
                    rejected += 1;
                }
            }
        }
    }
    tracker.flush().await;

    println!("Replayed {} events ({} rejected)", accepted, rejected);
    print_leaderboard(&tracker, metric, window, top_n);

    store.save(&tracker.checkpoint().await).await?;
    tracker.shutdown().await?;
    Ok(())
}

fn print_leaderboard(tracker: &SmartMoneyTracker, metric: SortMetric, window: u32, top_n: usize) {
    let rows = tracker.top(top_n, metric, window, 0);
    println!(
        "\nTop {} by {} ({}d window):",
        rows.len(),
        metric.as_str(),
        window
    );
    println!("  {:>3}  {:<44} {:>14}", "#", "Wallet", "Value");
    println!("  {}", "-".repeat(65));
    for row in &rows {
        println!("  {:>3}  {:<44} {:>14}", row.rank, row.wallet, row.value);
    }
}

// ============================================================================
// API Handlers
// ============================================================================

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(serde_json::json!({ "success": false, "message": message.to_string() })),
    )
}

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "smart-money",
        "version": APP_VERSION,
    }))
}

/// POST /api/events — ingest one transaction event
async fn api_ingest_event(
    State(state): State<AppState>,
    Json(event): Json<TransactionEvent>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.tracker.ingest(event) {
        Ok(()) => Ok(Json(serde_json::json!({ "accepted": true }))),
        Err(e) => {
            let status = match &e {
                IngestError::DuplicateEvent(_) | IngestError::OutOfOrderEvent { .. } => {
                    StatusCode::CONFLICT
                }
                IngestError::InvalidEventData(_) => StatusCode::UNPROCESSABLE_ENTITY,
                IngestError::OverloadRejected { .. } => StatusCode::TOO_MANY_REQUESTS,
            };
            Err((
                status,
                Json(serde_json::json!({
                    "accepted": false,
                    "reason": e.kind(),
                    "message": e.to_string(),
                })),
            ))
        }
    }
}

#[derive(Deserialize)]
struct PriceObservation {
    token: String,
    price: String,
}

/// POST /api/prices — observe a mark price without a trade
async fn api_observe_price(
    State(state): State<AppState>,
    Json(obs): Json<PriceObservation>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let price = Decimal::from_str(&obs.price)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, format!("bad price: {e}")))?;
    if price <= Decimal::ZERO {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "price must be positive",
        ));
    }
    state.tracker.observe_price(&obs.token, price).await;
    Ok(Json(serde_json::json!({ "success": true })))
}

/// GET /api/wallets — tracked wallets with P&L and default-window metrics
async fn api_wallets(State(state): State<AppState>) -> Json<serde_json::Value> {
    let wallets = state.tracker.wallets();
    Json(serde_json::json!({
        "count": wallets.len(),
        "wallets": wallets,
    }))
}

/// GET /api/wallets/:wallet/pnl
async fn api_wallet_pnl(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.tracker.pnl(&wallet) {
        Some(record) => Ok(Json(serde_json::json!(&*record))),
        None => Err(api_error(StatusCode::NOT_FOUND, "wallet not tracked")),
    }
}

#[derive(Deserialize)]
struct MetricsQuery {
    window: Option<u32>,
}

/// GET /api/wallets/:wallet/metrics?window= — current snapshot + history
async fn api_wallet_metrics(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let config = state.tracker.config();
    let window = query.window.unwrap_or(config.default_window);
    if !config.windows.contains(&window) {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("window {window} not configured (available: {:?})", config.windows),
        ));
    }

    if let Some(current) = state.tracker.metrics(&wallet, window) {
        let history = state.tracker.history(&wallet, window);
        return Ok(Json(serde_json::json!({
            "wallet": wallet,
            "window_days": window,
            "current": &*current,
            "history": history,
        })));
    }

    // not in memory (e.g. fresh restart): serve the persisted history
    let rows = state
        .store
        .history(&wallet, i64::from(window), config.history_cap as i64)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    if rows.is_empty() {
        return Err(api_error(StatusCode::NOT_FOUND, "wallet not tracked"));
    }
    Ok(Json(serde_json::json!({
        "wallet": wallet,
        "window_days": window,
        "current": rows.first(),
        "history": rows,
    })))
}

/// DELETE /api/wallets/:wallet — stop tracking
async fn api_untrack_wallet(
    State(state): State<AppState>,
    Path(wallet): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.tracker.untrack(&wallet).await;
    state
        .store
        .delete_wallet(&wallet)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    info!(%wallet, "Wallet untracked via API");
    Ok(Json(serde_json::json!({ "success": true })))
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    sort_by: Option<String>,
    window: Option<u32>,
    limit: Option<usize>,
    offset: Option<usize>,
}

/// GET /api/leaderboard?sort_by=&window=&limit=&offset=
async fn api_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let config = state.tracker.config();
    let metric = match query.sort_by.as_deref() {
        Some(s) => SortMetric::parse(s).ok_or_else(|| {
            api_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("unknown sort metric: {s}"),
            )
        })?,
        None => SortMetric::AnnualizedReturn,
    };
    let window = query.window.unwrap_or(config.default_window);
    if !config.windows.contains(&window) {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("window {window} not configured (available: {:?})", config.windows),
        ));
    }
    let limit = query.limit.unwrap_or(25).min(500);
    let offset = query.offset.unwrap_or(0);

    let rows = state.tracker.top(limit, metric, window, offset);
    Ok(Json(serde_json::json!({
        "sort_by": metric.as_str(),
        "window_days": window,
        "offset": offset,
        "rows": rows,
    })))
}

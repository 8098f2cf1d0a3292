//! factlens-api - HTTP API server for factlens

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use factlens_api::{cors_layer_from_env, router, AppState};
use factlens_core::defaults::{SERVER_HOST, SERVER_PORT};
use factlens_core::{ActivityRecorder, MediaAcquirer, ResultStore};
use factlens_db::{Database, MemoryResultStore, NoopActivityRecorder, PoolConfig};
use factlens_inference::{GeminiBackend, GeminiConfig, RetryPolicy, RetryingAnalyzer};
use factlens_jobs::{MediaConfig, PipelineConfig, PipelineRunner, YtDlpAcquirer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "factlens_api=debug,factlens_jobs=debug,factlens_inference=info,tower_http=debug".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("factlens-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let host = std::env::var("HOST").unwrap_or_else(|_| SERVER_HOST.to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(SERVER_PORT);

    // Pipeline configuration
    let pipeline_config = PipelineConfig::from_env();
    std::fs::create_dir_all(&pipeline_config.temp_dir)?;
    info!(
        max_duration_secs = pipeline_config.max_duration_secs,
        max_concurrent_jobs = pipeline_config.max_concurrent_jobs,
        temp_dir = %pipeline_config.temp_dir.display(),
        "Pipeline configured"
    );

    // Result store: Postgres when configured, otherwise process memory
    let (store, activity): (Arc<dyn ResultStore>, Arc<dyn ActivityRecorder>) =
        match std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty()) {
            Some(url) => {
                let db = Database::connect(&url, &PoolConfig::from_env()).await?;
                db.migrate().await?;
                info!("Connected to database, migrations applied");
                (Arc::new(db.results.clone()), Arc::new(db.activity.clone()))
            }
            None => {
                warn!("DATABASE_URL not set, results are kept in memory only");
                (
                    Arc::new(MemoryResultStore::new()),
                    Arc::new(NoopActivityRecorder),
                )
            }
        };

    // Media acquisition
    let acquirer = YtDlpAcquirer::new(MediaConfig::from_env());
    match acquirer.health_check().await {
        Ok(true) => info!("yt-dlp and ffmpeg available"),
        Ok(false) => warn!("yt-dlp or ffmpeg not available, jobs will fail at acquire"),
        Err(e) => warn!(error = %e, "Media tool check failed"),
    }

    // Analysis
    let gemini = GeminiBackend::new(GeminiConfig::from_env()?)?;
    let policy = RetryPolicy::from_env();
    info!(
        model = gemini.config().model.as_str(),
        strategy = gemini.config().strategy.as_str(),
        max_attempts = policy.max_attempts,
        "Analysis backend configured"
    );
    let analyzer = RetryingAnalyzer::new(gemini, policy);

    let runner = PipelineRunner::new(
        pipeline_config,
        Arc::new(acquirer),
        Arc::new(analyzer),
        store,
        activity,
    );

    let app = router(AppState::new(runner), cors_layer_from_env());

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

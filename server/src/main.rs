//! coverdiff HTTP server.
//!
//! Loads the JSON config, opens the job database, starts the worker pool
//! and serves the comparison API. The config path comes from the first
//! CLI argument, then `COVERDIFF_CONFIG`, then `./coverdiff.json`.

use std::path::Path;
use std::sync::Arc;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coverdiff::db::Database;
use coverdiff::{
    load_config, AnthropicClient, Config, Orchestrator, PipelineConfig, StorageConfig, WorkerPool,
};
use coverdiff::{storage, JobStore};

mod routes;
mod state;

use state::AppState;

fn init_tracing() {
    // Route `log` records from the core crate into tracing.
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("failed to initialize log bridge: {}", e);
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("COVERDIFF_CONFIG").ok())
        .unwrap_or_else(|| "coverdiff.json".to_string())
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.server.allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring unparseable CORS origin: {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let path = config_path();
    let config = load_config(&path)?;
    info!("Loaded config from {}", path);

    let db = Database::open(Path::new(&config.database_path))?;
    let store = JobStore::new(db);

    let objects = storage::build_store(&config.storage)?;
    if let StorageConfig::Http { base_url, .. } = &config.storage {
        info!(
            "Using HTTP object storage at {}",
            coverdiff::sanitize::redact_url(base_url)
        );
    }

    let model = Arc::new(AnthropicClient::from_config(&config.model)?);
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        objects,
        model,
        PipelineConfig::from_config(&config),
    ));
    let pool = Arc::new(WorkerPool::new(orchestrator, config.worker_count));

    // Jobs left pending by a previous shutdown go back on the queue.
    let pending = store.pending_job_ids()?;
    if !pending.is_empty() {
        info!("Requeueing {} pending jobs", pending.len());
        for job_id in pending {
            if let Err(e) = pool.submit(job_id).await {
                warn!(error = %e, "failed to requeue pending job");
            }
        }
    }

    let state = AppState {
        store,
        pool,
        model_timeout_seconds: config.model.timeout_seconds,
    };

    let app = routes::router(state).layer(cors_layer(&config));

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("coverdiff server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::EnvFilter;

use nutriscan::app_state::AppState;
use nutriscan::config::AppConfig;
use nutriscan::routes;
use nutriscan::services::{inference::InferenceClient, references::ReferenceClient};
use nutriscan::store::JobStore;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing nutriscan server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_histogram!(
        "analysis_processing_seconds",
        "Time to run the analysis pipeline for one job"
    );
    metrics::describe_counter!("analysis_jobs_total", "Total analysis jobs submitted");
    metrics::describe_counter!("analysis_jobs_completed", "Total analysis jobs completed");
    metrics::describe_counter!("analysis_jobs_failed", "Total analysis jobs that failed");
    metrics::describe_gauge!(
        "analysis_jobs_stored",
        "Job records currently held in the store"
    );

    // Open the job record store and start the expiry sweep
    tracing::info!(data_dir = %config.data_dir.display(), "Opening job record store");
    let store = Arc::new(
        JobStore::open(&config.data_dir, Duration::from_secs(config.retention_secs))
            .await
            .expect("Failed to open job record store"),
    );
    let _sweeper = Arc::clone(&store).start_sweeper(Duration::from_secs(config.sweep_secs));

    // Initialize Workers AI inference client
    tracing::info!("Initializing Workers AI inference client");
    let inference = InferenceClient::new(
        &config.inference_base_url,
        &config.cf_account_id,
        &config.cf_api_token,
        Duration::from_secs(config.inference_timeout_secs),
    )
    .expect("Failed to initialize inference client");

    // Initialize Europe PMC reference client
    let references = ReferenceClient::new(&config.reference_base_url)
        .expect("Failed to initialize reference client");

    // Create shared application state
    let state = AppState::new(store, inference, references);

    // Build API routes, plus the Prometheus scrape endpoint (separate state)
    let app = routes::build_app(state).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    tracing::info!("Starting nutriscan on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}

//! SolarScan HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use solarscan::cache::{ResultCache, build_blob_store};
use solarscan::config::Config;
use solarscan::detection::{DetectionAdapter, HttpDetector};
use solarscan::discovery::OverpassSource;
use solarscan::gateway::{HandlerState, create_router_with_state};
use solarscan::geocode::GoogleGeocoder;
use solarscan::imagery::{ImageryFetcher, StaticMapsProvider};
use solarscan::pipeline::PipelineOrchestrator;
use solarscan::ranking::{HttpSolarScorer, RankingFilter};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--health-check") {
        std::process::exit(run_health_check().await);
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        cache_backend = ?config.cache_backend,
        "SolarScan starting"
    );

    let pipeline = build_pipeline(&config)?;
    let app = create_router_with_state(HandlerState::new(Arc::new(pipeline)));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("SolarScan shutdown complete");
    Ok(())
}

fn build_pipeline(config: &Config) -> anyhow::Result<PipelineOrchestrator> {
    let api_key = config
        .maps_api_key
        .clone()
        .context("maps API key not configured")?;
    let scoring_url = config
        .scoring_url
        .clone()
        .context("scoring URL not configured")?;
    let detector_url = config
        .detector_url
        .clone()
        .context("detector URL not configured")?;

    let source = Arc::new(OverpassSource::new(
        config.overpass_url.clone(),
        config.request_timeout,
    )?);
    let ranking = RankingFilter::new(Arc::new(HttpSolarScorer::new(
        scoring_url,
        config.request_timeout,
    )?))
    .top_k(config.top_k)
    .max_scored(config.max_scored_addresses)
    .concurrency(config.max_concurrency);
    let geocoder = Arc::new(GoogleGeocoder::new(
        config.geocode_url.clone(),
        api_key.clone(),
        config.request_timeout,
    )?);
    let imagery = ImageryFetcher::new(Arc::new(StaticMapsProvider::new(
        config.staticmap_url.clone(),
        api_key,
        config.request_timeout,
    )?));
    let detection = DetectionAdapter::new(Arc::new(HttpDetector::new(
        detector_url,
        config.detector_timeout,
    )?));
    let cache = ResultCache::new(build_blob_store(config)?, config.l1_capacity);

    Ok(PipelineOrchestrator::new(source, ranking, geocoder, imagery, detection, cache)
        .scratch_root(config.scratch_root.clone())
        .concurrency(config.max_concurrency))
}

async fn run_health_check() -> i32 {
    let port = std::env::var("SOLARSCAN_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(5000);

    let url = format!("http://127.0.0.1:{}/healthz", port);
    let Ok(client) = solarscan::upstream::http_client("health check", Duration::from_secs(1)) else {
        return 1;
    };

    match client.get(&url).send().await {
        Ok(res) if res.status().is_success() => 0,
        _ => 1,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

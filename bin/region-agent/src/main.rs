use anyhow::{Context, Result};
use region_cache::RoutingResolver;
use region_core::{RoutingConfig, SharedExcludedRegions};
use region_discovery::HttpTopologyFetcher;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod server;

use server::AgentState;

/// How often the agent checks whether failures call for an early refresh
const REFRESH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting region-agent...");

    let config = load_config()?;
    info!(
        default_endpoint = %config.default_endpoint,
        discovery = config.enable_endpoint_discovery,
        preferred = ?config.preferred_regions,
        "Routing configuration loaded"
    );

    let exclusions = Arc::new(SharedExcludedRegions::new(config.initial_excluded_regions()));
    let fetcher = Arc::new(HttpTopologyFetcher::new(region_discovery::client::DEFAULT_FETCH_TIMEOUT)?);
    let refresh_interval = config.refresh_interval();

    let resolver = Arc::new(
        RoutingResolver::builder(config, fetcher)
            .excluded_regions_source(exclusions.clone())
            .build()?,
    );
    info!("Routing resolver initialized");

    if resolver.config().enable_endpoint_discovery {
        resolver.refresher().spawn_periodic(refresh_interval);
        tokio::spawn(watch_refresh_needs(resolver.clone()));
        info!("Topology refresh scheduled every {:?}", refresh_interval);
    } else {
        warn!("Endpoint discovery disabled, all requests use the default endpoint");
    }

    let listen_addr: SocketAddr = std::env::var("REGION_AGENT_LISTEN")
        .unwrap_or_else(|_| "0.0.0.0:9464".to_string())
        .parse()
        .context("REGION_AGENT_LISTEN must be a socket address")?;
    let listener = TcpListener::bind(&listen_addr).await?;
    info!("HTTP server listening on {}", listen_addr);

    let state = Arc::new(AgentState {
        resolver,
        exclusions,
    });

    tokio::select! {
        result = server::serve(listener, state) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, exiting...");
        }
    }

    Ok(())
}

/// Load configuration from `REGION_AGENT_CONFIG` if set, then apply
/// environment overrides
fn load_config() -> Result<RoutingConfig> {
    let mut config = match std::env::var("REGION_AGENT_CONFIG") {
        Ok(path) => RoutingConfig::from_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        Err(_) => {
            let endpoint = std::env::var("REGION_DEFAULT_ENDPOINT").context(
                "set REGION_AGENT_CONFIG or REGION_DEFAULT_ENDPOINT to configure the agent",
            )?;
            let endpoint = region_api::uri_serde::parse_endpoint(&endpoint)
                .map_err(anyhow::Error::msg)?;
            RoutingConfig::new(endpoint)
        }
    };
    config.apply_env_overrides()?;
    Ok(config)
}

/// Trigger an early refresh when the preferred endpoints have failed.
///
/// When no fallback endpoint exists the refresh is awaited before the next
/// check; otherwise it runs alongside traffic.
async fn watch_refresh_needs(resolver: Arc<RoutingResolver>) {
    let mut ticker = tokio::time::interval(REFRESH_CHECK_INTERVAL);
    loop {
        ticker.tick().await;

        let decision = resolver.should_refresh_endpoints();
        if !decision.needs_refresh {
            continue;
        }

        debug!(
            background = decision.can_refresh_in_background,
            "Preferred endpoints unavailable, refreshing topology"
        );
        if decision.can_refresh_in_background {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                if let Err(e) = resolver.refresh_topology().await {
                    warn!("Background topology refresh failed: {}", e);
                }
            });
        } else if let Err(e) = resolver.refresh_topology().await {
            warn!("Topology refresh failed: {}", e);
        }
    }
}

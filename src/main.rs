//! Contrarian: recommendation engine for binary prediction markets
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the analyzer and its data collaborators, and serves the HTTP
//! API until Ctrl+C.

use anyhow::{Context, Result};
use chrono::Utc;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use contrarian::api::{self, ApiState};
use contrarian::config::{self, OracleProvider};
use contrarian::data::{MockMarketSource, PriceOracle, PythOracle, StaticOracle};
use contrarian::strategy::Analyzer;
use contrarian::throttle::RequestThrottle;

/// Interval between sweeps of idle throttle identities.
const THROTTLE_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("CONTRARIAN_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = if Path::new(&config_path).exists() {
        config::AppConfig::load(&config_path)?
    } else {
        config::AppConfig::default()
    };

    init_logging();

    info!(
        agent_name = %cfg.agent.name,
        config = %config_path,
        min_confidence = cfg.agent.min_confidence,
        "Contrarian engine starting up"
    );

    // -- Initialise components -------------------------------------------

    let analyzer = Analyzer::from_config(
        &cfg.reasoner,
        &cfg.reasoning,
        cfg.risk.clone(),
        cfg.price_targets.clone(),
    );

    let oracle: Arc<dyn PriceOracle> = match cfg.oracle.provider {
        OracleProvider::Pyth => {
            info!(endpoint = %cfg.oracle.endpoint, "Using Pyth price oracle");
            Arc::new(PythOracle::new(&cfg.oracle)?)
        }
        OracleProvider::Static => {
            warn!("Using static mock prices, no live price feed");
            Arc::new(StaticOracle::with_mock_prices())
        }
    };

    let throttle = RequestThrottle::new(&cfg.throttle);
    info!(
        window_secs = throttle.window_secs(),
        max_requests = throttle.cap(),
        "Request throttle configured"
    );

    let state = Arc::new(ApiState {
        analyzer,
        markets: Arc::new(MockMarketSource::default()),
        oracle,
        throttle,
        agent: cfg.agent.clone(),
        price_assets: cfg.oracle.assets.clone(),
        started_at: Utc::now(),
    });

    // -- Background maintenance -----------------------------------------

    let purge_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(THROTTLE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let removed = purge_state.throttle.purge_idle(Utc::now());
            if removed > 0 {
                debug!(removed, "Purged idle throttle identities");
            }
        }
    });

    // -- Serve -------------------------------------------------------------

    let addr: SocketAddr = format!("{}:{}", cfg.api.host, cfg.api.port)
        .parse()
        .with_context(|| format!("Invalid API address {}:{}", cfg.api.host, cfg.api.port))?;

    api::serve(state, addr, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received");
    })
    .await?;

    info!("Contrarian engine stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("contrarian=info"));

    let json_logging = std::env::var("CONTRARIAN_LOG_JSON").is_ok();

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

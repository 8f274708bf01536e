//! API server entry point.

use std::error::Error;
use std::sync::Arc;

use api::{AppState, Config, LogFormat, MarketSeed, Sweeper};
use domain::MarketPorts;
use domain::ports::{
    InMemoryCatalog, InMemoryPresenceRegistry, InMemorySellerDirectory, PresenceRegistry,
    SystemClock,
};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use fanout::{DeliveryPolicy, FanOut, LogTransport};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// In-memory catalog, seller directory and presence, seeded from
/// `MARKET_SEED` when set. Notifications go through the fan-out dispatcher.
async fn collaborators(config: &Config, publisher: FanOut) -> Result<MarketPorts, BoxError> {
    let catalog = Arc::new(InMemoryCatalog::new());
    let sellers = Arc::new(InMemorySellerDirectory::new());
    let presence = Arc::new(InMemoryPresenceRegistry::new(sellers.clone()));

    if let Some(path) = &config.market_seed {
        let summary = MarketSeed::load(path)?.apply(&catalog, &sellers)?;
        for seller_id in &summary.online {
            presence.set_online(*seller_id, true).await?;
        }
        tracing::info!(
            path = %path.display(),
            products = summary.products,
            sellers = summary.sellers,
            listings = summary.listings,
            "market seeded"
        );
    }

    Ok(MarketPorts {
        catalog,
        sellers,
        presence,
        publisher: Arc::new(publisher),
        clock: Arc::new(SystemClock),
    })
}

async fn serve<S: EventStore + Clone + 'static>(
    store: S,
    config: Config,
    ports: MarketPorts,
    metrics_handle: PrometheusHandle,
) -> Result<(), BoxError> {
    let state = Arc::new(AppState::new(store, ports, config.policy()));

    // Replay whatever the log already holds before taking traffic.
    state.refresh().await?;

    let (stop_sweeper, sweeper_stopped) = watch::channel(false);
    let sweeper = Sweeper::new(state.clone(), config.sweep_interval()).spawn(sweeper_stopped);

    let app = api::create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = stop_sweeper.send(true);
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "expiry sweeper ended abnormally");
    }

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env()?;
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let (fanout, _dispatcher) = FanOut::spawn(Arc::new(LogTransport), DeliveryPolicy::default());
    let ports = collaborators(&config, fanout).await?;

    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresEventStore::connect(&url).await?;
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL event store");
            serve(store, config, ports, metrics_handle).await
        }
        None => {
            tracing::info!("using in-memory event store");
            serve(InMemoryEventStore::new(), config, ports, metrics_handle).await
        }
    }
}

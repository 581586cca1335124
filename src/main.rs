//! Testroom Back binary entrypoint wiring REST, WebSocket, SSE and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use testroom_back::{
    cache::{Cache, MemoryCache, NoopCache},
    config::{AppConfig, CacheBackend},
    dao::store::{Store, memory::MemoryStore},
    routes,
    services::{
        attachments::LocalAttachmentStore,
        ticket::{DisabledTicketBridge, TicketBridge},
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let store = build_store().await?;
    let cache = build_cache(&config)?;
    let bridge = build_bridge(&config)?;
    let attachments = Arc::new(LocalAttachmentStore::new(config.uploads_dir().clone()));

    let app_state = AppState::new(config, store, cache, bridge, attachments);
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// CouchDB when `COUCH_BASE_URL` is set, the in-process store otherwise.
async fn build_store() -> anyhow::Result<Arc<dyn Store>> {
    #[cfg(feature = "couch-store")]
    {
        use testroom_back::dao::store::couchdb::{CouchConfig, CouchStore};

        if let Some(couch) = CouchConfig::from_env().context("reading CouchDB settings")? {
            let store = CouchStore::connect(couch)
                .await
                .context("connecting to CouchDB")?;
            info!("using CouchDB store");
            return Ok(Arc::new(store));
        }
    }

    warn!("no external store configured; data lives in memory only");
    Ok(Arc::new(MemoryStore::new()))
}

fn build_cache(config: &AppConfig) -> anyhow::Result<Arc<dyn Cache>> {
    let settings = config.cache();
    let cache: Arc<dyn Cache> = match settings.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new(settings.capacity, settings.default_ttl)),
        CacheBackend::None => Arc::new(NoopCache),
        #[cfg(feature = "redis-cache")]
        CacheBackend::Redis => {
            let url = settings
                .redis_url
                .as_deref()
                .context("cache.redis_url is required for the redis backend")?;
            Arc::new(
                testroom_back::cache::RedisCache::new(
                    url,
                    &settings.redis_prefix,
                    settings.default_ttl,
                )
                .context("opening redis cache")?,
            )
        }
        #[cfg(not(feature = "redis-cache"))]
        CacheBackend::Redis => {
            anyhow::bail!("redis cache requested but the `redis-cache` feature is disabled")
        }
    };
    info!(backend = ?settings.backend, "cache ready");
    Ok(cache)
}

fn build_bridge(config: &AppConfig) -> anyhow::Result<Arc<dyn TicketBridge>> {
    let tickets = config.tickets();
    #[cfg(feature = "jira-bridge")]
    if let Some(base_url) = tickets.base_url.as_deref() {
        match testroom_back::services::ticket::JiraBridge::from_env(base_url, tickets.timeout) {
            Some(bridge) => {
                info!(base_url, project = %tickets.project_key, "ticket tracker enabled");
                return Ok(Arc::new(bridge.context("building ticket tracker client")?));
            }
            None => warn!("ticket tracker URL set but JIRA_USER/JIRA_TOKEN missing"),
        }
    }

    if tickets.base_url.is_none() {
        info!("ticket tracker not configured; linking disabled");
    }
    Ok(Arc::new(DisabledTicketBridge))
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: testroom_back::state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

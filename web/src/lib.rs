use axum::middleware::from_fn_with_state;
use axum::Router;
use domain::graph::Connector;
use domain::QueryResult;
use log::*;
use result_cache::ResultCache;
use service::config::Config;
use session::ConnectionRegistry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

mod controller;
mod error;
mod extractors;
mod middleware;
mod params;
pub mod router;
pub mod session;

#[cfg(test)]
mod test_support;

pub use error::{Error, Result};

/// Everything a request handler needs. Cheap to clone: all shared state sits
/// behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub connector: Arc<dyn Connector>,
    pub connections: Arc<ConnectionRegistry>,
    pub results: Arc<ResultCache<QueryResult>>,
}

impl AppState {
    pub fn new(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            connections: Arc::new(ConnectionRegistry::new()),
            results: Arc::new(ResultCache::new()),
        }
    }
}

/// The full application: routes, session handling and CORS.
pub fn app(app_state: AppState) -> Router {
    let expiry = time::Duration::seconds(
        i64::try_from(app_state.config.session_expiry_seconds).unwrap_or(i64::MAX),
    );
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(app_state.config.is_production())
        .with_expiry(Expiry::OnInactivity(expiry));

    router::define_routes(app_state.clone())
        .layer(session_layer)
        .layer(from_fn_with_state(app_state, middleware::cors::cors))
}

pub async fn init_server(app_state: AppState) -> std::io::Result<()> {
    let host = app_state
        .config
        .interface
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let listen_addr = format!("{host}:{}", app_state.config.port);

    info!("Server starting... listening for connections on http://{listen_addr}");

    let listener = TcpListener::bind(&listen_addr).await?;
    axum::serve(listener, app(app_state)).await
}

use domain::gateway::falkordb::FalkorConnector;
use log::*;
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use std::time::Duration;
use web::session::spawn_connection_sweeper;
use web::AppState;

#[tokio::main]
async fn main() {
    let config = Config::new();
    if let Err(e) = Logger::init_logger(&config) {
        eprintln!("Failed to start logging: {e}");
        std::process::exit(1);
    }

    info!(
        "Starting FalkorDB browser API [{}], default database at {}:{}",
        config.runtime_env(),
        config.falkordb_default_host,
        config.falkordb_default_port
    );
    debug!("Allowed CORS origins: {:?}", config.allowed_origins);

    let connector = Arc::new(FalkorConnector::new(
        config.falkordb_default_host.clone(),
        config.falkordb_default_port,
    ));
    let app_state = AppState::new(config.clone(), connector);

    result_cache::spawn_sweeper(Arc::clone(&app_state.results), config.result_ttl());
    spawn_connection_sweeper(
        Arc::clone(&app_state.connections),
        Duration::from_secs(config.session_expiry_seconds),
    );

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}

use crate::{controller::health_check_controller, params, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::controller::{
    count_controller, db_version_controller, graph_controller, query_controller,
    user_session_controller,
};

use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI spec. To be a part
// of the rendered spec, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "FalkorDB Browser API"
        ),
        paths(
            count_controller::read,
            count_controller::nodes,
            count_controller::edges,
            count_controller::schema,
            db_version_controller::read,
            graph_controller::index,
            graph_controller::read,
            graph_controller::create,
            graph_controller::update,
            graph_controller::delete,
            graph_controller::memory,
            graph_controller::explain,
            graph_controller::profile,
            health_check_controller::health_check,
            query_controller::read,
            user_session_controller::login,
            user_session_controller::logout,
        ),
        components(
            schemas(
                params::user_session::LoginParams,
            )
        ),
        modifiers(&SecurityAddon),
        tags(
            (name = "falkordb_browser", description = "FalkorDB Browser API")
        )
    )]
struct ApiDoc;

struct SecurityAddon;

// Defines our cookie session based authentication requirement for gaining access to our
// API endpoints for OpenAPI.
impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                    "id",
                    "Session id value returned from successful login via Set-Cookie header",
                ))),
            )
        }
    }
}

pub fn define_routes(app_state: AppState) -> Router {
    let static_dir = app_state.config.static_dir.clone();

    Router::new()
        .merge(health_routes())
        .merge(user_session_routes(app_state.clone()))
        .merge(graph_routes(app_state.clone()))
        .merge(count_routes(app_state))
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/docs"))
        .fallback_service(static_routes(&static_dir))
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}

fn user_session_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/auth/login", post(user_session_controller::login))
        .route("/api/auth/logout", post(user_session_controller::logout))
        .route("/api/auth/DBVersion", get(db_version_controller::read))
        .with_state(app_state)
}

fn graph_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/graph", get(graph_controller::index))
        .route(
            "/api/graph/{graph}",
            get(graph_controller::read)
                .post(graph_controller::create)
                .patch(graph_controller::update)
                .delete(graph_controller::delete),
        )
        .route("/api/graph/{graph}/query", get(query_controller::read))
        .route("/api/graph/{graph}/memory", get(graph_controller::memory))
        .route("/api/graph/{graph}/explain", get(graph_controller::explain))
        .route("/api/graph/{graph}/profile", get(graph_controller::profile))
        .with_state(app_state)
}

fn count_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/api/graph/{graph}/count", get(count_controller::read))
        .route("/api/graph/{graph}/count/nodes", get(count_controller::nodes))
        .route("/api/graph/{graph}/count/edges", get(count_controller::edges))
        .route("/api/schema/{schema}/count", get(count_controller::schema))
        .with_state(app_state)
}

// Everything outside the API is the browser UI
fn static_routes(static_dir: &str) -> ServeDir {
    ServeDir::new(static_dir)
}

//! Helpers for driving the full router in controller tests.

use crate::{app, AppState};
use axum::{
    body::Body,
    http::{header, Method, Request, Response},
    Router,
};
use domain::graph::mock::{RecordingClient, StaticConnector};
use domain::Role;
use serde_json::{json, Value};
use service::config::Config;
use std::sync::Arc;
use tower::ServiceExt;

pub(crate) fn test_config() -> Config {
    Config::default()
        .set_initial(0)
        .set_allowed_origins(vec!["http://localhost:3000".to_string()])
}

/// Router whose logins all connect to `client` with `role`.
pub(crate) fn app_with(
    client: RecordingClient,
    role: Role,
    config: Config,
) -> (Router, Arc<RecordingClient>) {
    let client = Arc::new(client);
    let connector = Arc::new(StaticConnector {
        client: client.clone(),
        role,
    });
    (app(AppState::new(config, connector)), client)
}

/// Logs in and returns the `Cookie` header value for later requests.
pub(crate) async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "host": "localhost", "port": 6379, "username": "default" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login sets a session cookie")
        .to_str()
        .unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

pub(crate) async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
) -> Response<Body> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub(crate) async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response<Body> {
    send(app, Method::GET, uri, cookie).await
}

pub(crate) async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub(crate) async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

use crate::error::{Error as WebError, Result as WebResult};
use crate::params::user_session::LoginParams;
use crate::session::{SessionUser, SESSION_USER_KEY};
use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};
use domain::Credentials;
use log::*;
use serde_json::json;
use tower_sessions::Session;

/// Connects to FalkorDB with the given credentials and returns a new session cookie.
///
/// Successful login will return a session cookie with id, e.g.:
/// set-cookie: id=07bbbe54-bd35-425f-8e63-618a8d8612df; HttpOnly; SameSite=Strict; Path=/; Max-Age=86399
///
/// After logging in successfully, you must pass the session id back to the server for
/// every API call, e.g.:
/// curl -v --header "Cookie: id=07bbbe54-bd35-425f-8e63-618a8d8612df" --request GET http://localhost:4000/api/graph
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body(content = LoginParams, content_type = "application/json"),
    responses(
        (status = 200, description = "Logs in and returns session authentication cookie with `{id, username, role}`"),
        (status = 401, description = "The database refused the connection or credentials"),
        (status = 500, description = "Session store failure")
    )
)]
pub async fn login(
    session: Session,
    State(app_state): State<AppState>,
    Json(params): Json<LoginParams>,
) -> WebResult<impl IntoResponse> {
    let credentials = Credentials::from(params);

    let (client, role) = app_state
        .connector
        .connect(&credentials)
        .await
        .map_err(|err| {
            warn!("Login failed for {credentials:?}: {err}");
            WebError::Unauthenticated(err.message())
        })?;

    // Replacing an existing login releases its connection.
    if let Some(previous) = session
        .remove::<SessionUser>(SESSION_USER_KEY)
        .await
        .map_err(WebError::session)?
    {
        app_state.connections.unregister(&previous.id);
    }
    session.cycle_id().await.map_err(WebError::session)?;

    let connection_id = app_state.connections.register(client);
    let user = SessionUser {
        id: connection_id.as_str().to_string(),
        username: credentials.username.unwrap_or_else(|| "default".to_string()),
        role,
    };
    if let Err(err) = session.insert(SESSION_USER_KEY, &user).await {
        app_state.connections.unregister(&user.id);
        return Err(WebError::session(err));
    }

    info!("User {} logged in as {}", user.username, user.role);

    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "role": user.role,
    })))
}

/// Logs the user out, closing their database connection and clearing the session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Successfully logged out"),
        (status = 500, description = "Session store failure")
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn logout(
    session: Session,
    State(app_state): State<AppState>,
) -> WebResult<impl IntoResponse> {
    if let Some(user) = session
        .remove::<SessionUser>(SESSION_USER_KEY)
        .await
        .map_err(WebError::session)?
    {
        app_state.connections.unregister(&user.id);
        info!("User {} logged out", user.username);
    }
    session.flush().await.map_err(WebError::session)?;

    Ok(Json(json!({ "message": "Logged out" })))
}

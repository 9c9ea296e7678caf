use crate::controller::ApiResponse;
use crate::error::Result as WebResult;
use crate::extractors::GraphSession;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::*;
use serde_json::{json, Value};

/// GET name and version of the first loaded database module
///
/// Users without permission to list modules get their permission error back
/// with 200 so the browser can carry on without a version.
#[utoipa::path(
    get,
    path = "/api/auth/DBVersion",
    responses(
        (status = 200, description = "`{result: [name, version]}`, or `{message}` when the user may not list modules"),
        (status = 400, description = "The database rejected the command"),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn read(GraphSession { client, .. }: GraphSession) -> WebResult<Response> {
    match client.module_list().await {
        Ok(modules) => {
            // Each module is a flat [key, value, key, value, ...] array: name at 1, version at 3.
            let first = modules.first();
            let field = |index: usize| {
                first
                    .and_then(|module| module.get(index))
                    .cloned()
                    .unwrap_or(Value::Null)
            };
            Ok(Json(ApiResponse::new(vec![field(1), field(3)])).into_response())
        }
        Err(err) if err.is_permission_denied() => {
            debug!("User may not list modules: {err}");
            Ok((StatusCode::OK, Json(json!({ "message": err.message() }))).into_response())
        }
        Err(err) => Err(err.into()),
    }
}

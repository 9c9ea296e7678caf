use crate::controller::ApiResponse;
use crate::error::{Error as WebError, Result as WebResult};
use crate::extractors::GraphSession;
use crate::params::graph::PollParams;
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::QueryResult;
use log::*;
use result_cache::{PollOutcome, RequestId};
use serde_json::json;

/// GET the result of a previously dispatched query
///
/// Waits up to the configured initial interval for a pending query. A
/// finished result is handed out once; polling the same id again is a 404,
/// as is polling an id dispatched by another login.
#[utoipa::path(
    get,
    path = "/api/graph/{graph}/query",
    params(
        ("graph" = String, Path, description = "Graph the query was dispatched against"),
        PollParams
    ),
    responses(
        (status = 200, description = "Either `{result: id}` while the query is still running, or `{result: {data, metadata}}`"),
        (status = 400, description = "Missing or malformed id, or the query failed (`{error}`)"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No request found for the id"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn read(
    session: GraphSession,
    State(app_state): State<AppState>,
    Query(params): Query<PollParams>,
) -> WebResult<Response> {
    let raw_id = params
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| WebError::bad_request("Missing parameter id"))?;
    let id: RequestId = raw_id
        .parse()
        .map_err(|_| WebError::bad_request(format!("Invalid parameter id: {raw_id}")))?;

    debug!("Polling query result {id}");
    let outcome = app_state
        .results
        .poll(&session.user.id, id, app_state.config.initial_wait())
        .await;
    Ok(poll_response(outcome))
}

/// HTTP rendering of a poll, shared with query dispatch.
pub(crate) fn poll_response(outcome: PollOutcome<QueryResult>) -> Response {
    match outcome {
        PollOutcome::Pending(id) => Json(ApiResponse::new(id)).into_response(),
        PollOutcome::Success(result) => Json(ApiResponse::new(result)).into_response(),
        PollOutcome::Failure(message) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        PollOutcome::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No request found" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{app_with, body_json, get, login, test_config};
    use axum::http::StatusCode;
    use domain::graph::mock::RecordingClient;
    use domain::Role;
    use serde_json::json;

    #[tokio::test]
    async fn polling_requires_a_session() {
        let (app, _) = app_with(RecordingClient::new(), Role::Admin, test_config());

        let response = get(&app, "/api/graph/g/query?id=1", None).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Not authenticated" })
        );
    }

    #[tokio::test]
    async fn missing_id_is_a_bad_request() {
        let (app, _) = app_with(RecordingClient::new(), Role::Admin, test_config());
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g/query", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Missing parameter id" })
        );
    }

    #[tokio::test]
    async fn non_numeric_id_is_a_bad_request() {
        let (app, _) = app_with(RecordingClient::new(), Role::Admin, test_config());
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g/query?id=abc", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (app, _) = app_with(RecordingClient::new(), Role::Admin, test_config());
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g/query?id=999", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "No request found" })
        );
    }
}

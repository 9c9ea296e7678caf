use crate::controller::query_controller::poll_response;
use crate::controller::ApiResponse;
use crate::error::{Error as WebError, Result as WebResult};
use crate::extractors::GraphSession;
use crate::params::graph::{timeout_from_ms, CopyParams, PlanParams, QueryParams, RenameParams};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use domain::graph::run_query;
use domain::Role;
use log::*;
use serde_json::json;
use std::sync::Arc;

/// GET all graphs on the connected server
#[utoipa::path(
    get,
    path = "/api/graph",
    responses(
        (status = 200, description = "`{result: {graphs: [name]}}`"),
        (status = 400, description = "The database rejected the command"),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn index(GraphSession { client, .. }: GraphSession) -> WebResult<impl IntoResponse> {
    let graphs = client.list().await?;
    debug!("Found {} graphs", graphs.len());

    Ok(Json(ApiResponse::new(json!({ "graphs": graphs }))))
}

/// GET dispatch a query against a graph
///
/// The query runs in the background. The response is the query's result if
/// it finishes within the configured initial interval, otherwise a request id
/// to poll with `GET /api/graph/{graph}/query?id=`. Read-Only users always run
/// the read-only query command.
#[utoipa::path(
    get,
    path = "/api/graph/{graph}",
    params(
        ("graph" = String, Path, description = "Graph to query"),
        QueryParams
    ),
    responses(
        (status = 200, description = "`{result: id}` or `{result: {data, metadata}}`"),
        (status = 400, description = "Missing query, or the query failed (`{error}`)"),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn read(
    session: GraphSession,
    State(app_state): State<AppState>,
    Path(graph): Path<String>,
    Query(params): Query<QueryParams>,
) -> WebResult<Response> {
    let query = params
        .query
        .filter(|query| !query.trim().is_empty())
        .ok_or_else(|| WebError::bad_request("Missing parameter query"))?;
    let timeout = timeout_from_ms(params.timeout);
    let mode = session.mode();

    let owner = session.user.id.clone();
    let id = app_state.results.register(&owner);
    debug!("Dispatching query {id} against graph {graph} ({mode:?})");

    let results = Arc::clone(&app_state.results);
    let client = session.client;
    tokio::spawn(async move {
        let outcome = run_query(client.as_ref(), mode, &graph, &query, timeout)
            .await
            .map_err(|err| {
                debug!("Query {id} failed: {err}");
                err.message()
            });
        if !results.complete(id, outcome) {
            debug!("Query {id} finished after its entry was evicted");
        }
    });

    let outcome = app_state
        .results
        .poll(&owner, id, app_state.config.initial_wait())
        .await;
    Ok(poll_response(outcome))
}

/// POST copy a graph under a new name
#[utoipa::path(
    post,
    path = "/api/graph/{graph}",
    params(
        ("graph" = String, Path, description = "Graph to copy"),
        CopyParams
    ),
    responses(
        (status = 200, description = "Graph copied, `{success: true}`"),
        (status = 400, description = "Missing newName, or the database rejected the copy"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Read-Only users cannot create graphs"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn create(
    session: GraphSession,
    Path(graph): Path<String>,
    Query(params): Query<CopyParams>,
) -> WebResult<impl IntoResponse> {
    require_write(&session)?;
    let new_name = params
        .new_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| WebError::bad_request("Missing parameter newName"))?;

    info!("Copying graph {graph} to {new_name}");
    session.client.copy(&graph, &new_name).await?;

    Ok(Json(json!({ "success": true })))
}

/// PATCH rename a graph
///
/// Refuses to overwrite: fails when a graph named `newName` already exists.
#[utoipa::path(
    patch,
    path = "/api/graph/{graph}",
    params(
        ("graph" = String, Path, description = "Graph to rename"),
        RenameParams
    ),
    responses(
        (status = 200, description = "Graph renamed, `{message: 1}`"),
        (status = 400, description = "Missing newName, the name is taken, or the database rejected the rename"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Read-Only users cannot rename graphs"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn update(
    session: GraphSession,
    Path(graph): Path<String>,
    Query(params): Query<RenameParams>,
) -> WebResult<impl IntoResponse> {
    require_write(&session)?;
    let new_name = params
        .new_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| WebError::bad_request("Missing parameter 'newName'"))?;

    let renamed = session
        .client
        .rename(&graph, &new_name)
        .await
        .map_err(|err| WebError::bad_request(err.message()))?;
    if !renamed {
        debug!("Not renaming {graph}: {new_name} already exists");
        return Err(WebError::bad_request(format!("{new_name} already exists")));
    }

    info!("Renamed graph {graph} to {new_name}");
    Ok(Json(json!({ "message": 1 })))
}

/// DELETE a graph
#[utoipa::path(
    delete,
    path = "/api/graph/{graph}",
    params(
        ("graph" = String, Path, description = "Graph to delete"),
    ),
    responses(
        (status = 200, description = "Graph deleted"),
        (status = 400, description = "The database rejected the delete"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Read-Only users cannot delete graphs"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn delete(
    session: GraphSession,
    Path(graph): Path<String>,
) -> WebResult<impl IntoResponse> {
    require_write(&session)?;

    info!("Deleting graph {graph}");
    session.client.delete(&graph).await?;

    Ok(Json(json!({ "message": format!("{graph} graph deleted") })))
}

/// GET memory usage of a graph
#[utoipa::path(
    get,
    path = "/api/graph/{graph}/memory",
    params(
        ("graph" = String, Path, description = "Graph to inspect"),
    ),
    responses(
        (status = 200, description = "`{result: <memory report>}`"),
        (status = 400, description = "The database rejected the command"),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn memory(
    GraphSession { client, .. }: GraphSession,
    Path(graph): Path<String>,
) -> WebResult<impl IntoResponse> {
    let report = client.memory_usage(&graph).await?;

    Ok(Json(ApiResponse::new(report)))
}

/// GET the execution plan of a query
#[utoipa::path(
    get,
    path = "/api/graph/{graph}/explain",
    params(
        ("graph" = String, Path, description = "Graph the query targets"),
        PlanParams
    ),
    responses(
        (status = 200, description = "`{result: [plan line]}`"),
        (status = 400, description = "Missing query, or the database rejected it"),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn explain(
    GraphSession { client, .. }: GraphSession,
    Path(graph): Path<String>,
    Query(params): Query<PlanParams>,
) -> WebResult<impl IntoResponse> {
    let query = required_query(params)?;
    let plan = client
        .explain(&graph, &query)
        .await
        .map_err(|err| WebError::bad_request(err.message()))?;

    Ok(Json(ApiResponse::new(plan)))
}

/// GET the profiled execution plan of a query
///
/// Profiling runs the query, so its side effects apply.
#[utoipa::path(
    get,
    path = "/api/graph/{graph}/profile",
    params(
        ("graph" = String, Path, description = "Graph the query targets"),
        PlanParams
    ),
    responses(
        (status = 200, description = "`{result: [plan line with records and timing]}`"),
        (status = 400, description = "Missing query, or the database rejected it"),
        (status = 401, description = "Not authenticated"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn profile(
    GraphSession { client, .. }: GraphSession,
    Path(graph): Path<String>,
    Query(params): Query<PlanParams>,
) -> WebResult<impl IntoResponse> {
    let query = required_query(params)?;
    let plan = client
        .profile(&graph, &query)
        .await
        .map_err(|err| WebError::bad_request(err.message()))?;

    Ok(Json(ApiResponse::new(plan)))
}

fn required_query(params: PlanParams) -> WebResult<String> {
    params
        .query
        .filter(|query| !query.trim().is_empty())
        .ok_or_else(|| WebError::bad_request("Missing parameter query"))
}

fn require_write(session: &GraphSession) -> WebResult<()> {
    if session.user.role == Role::ReadOnly {
        warn!(
            "Read-Only user {} attempted a write operation",
            session.user.username
        );
        return Err(WebError::Forbidden(
            "Read-Only users cannot modify graphs".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::test_support::{app_with, body_json, get, login, send, test_config};
    use axum::http::{Method, StatusCode};
    use domain::graph::mock::{row, Call, RecordingClient};
    use domain::Role;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn index_lists_graphs() {
        let (app, _) = app_with(
            RecordingClient::new().with_graphs(&["movies", "social"]),
            Role::Admin,
            test_config(),
        );
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "result": { "graphs": ["movies", "social"] } })
        );
    }

    #[tokio::test]
    async fn dispatch_answers_with_the_result_when_it_finishes_within_initial() {
        let (app, _) = app_with(
            RecordingClient::new().with_result("MATCH (n) RETURN count(n) as c", row(&[("c", 7)])),
            Role::Admin,
            test_config().set_initial(2000),
        );
        let cookie = login(&app).await;

        let response = get(
            &app,
            "/api/graph/movies?query=MATCH%20(n)%20RETURN%20count(n)%20as%20c",
            Some(&cookie),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "result": { "data": [{ "c": 7 }], "metadata": [] } })
        );
    }

    #[tokio::test]
    async fn dispatch_without_initial_returns_an_id_to_poll() {
        let (app, _) = app_with(
            RecordingClient::new().with_result("RETURN 1 as one", row(&[("one", 1)])),
            Role::Admin,
            test_config(),
        );
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g?query=RETURN%201%20as%20one", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let id = body_json(response).await["result"]
            .as_u64()
            .expect("pending dispatch returns a numeric id");

        let uri = format!("/api/graph/g/query?id={id}");
        let mut body = Value::Null;
        for _ in 0..20 {
            tokio::task::yield_now().await;
            let response = get(&app, &uri, Some(&cookie)).await;
            assert_eq!(response.status(), StatusCode::OK);
            body = body_json(response).await;
            if body["result"].is_object() {
                break;
            }
        }
        assert_eq!(
            body,
            json!({ "result": { "data": [{ "one": 1 }], "metadata": [] } })
        );

        // Results are handed out once.
        let response = get(&app, &uri, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn results_are_only_visible_to_the_dispatching_login() {
        let (app, _) = app_with(
            RecordingClient::new().with_result("RETURN 2 as two", row(&[("two", 2)])),
            Role::Admin,
            test_config(),
        );
        let alice = login(&app).await;
        let bob = login(&app).await;
        assert_ne!(alice, bob);

        let response = get(&app, "/api/graph/g?query=RETURN%202%20as%20two", Some(&alice)).await;
        let id = body_json(response).await["result"]
            .as_u64()
            .expect("pending dispatch returns a numeric id");
        let uri = format!("/api/graph/g/query?id={id}");

        let response = get(&app, &uri, Some(&bob)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let mut body = Value::Null;
        for _ in 0..20 {
            tokio::task::yield_now().await;
            body = body_json(get(&app, &uri, Some(&alice)).await).await;
            if body["result"].is_object() {
                break;
            }
        }
        assert_eq!(
            body,
            json!({ "result": { "data": [{ "two": 2 }], "metadata": [] } })
        );
    }

    #[tokio::test]
    async fn failed_query_is_reported_as_error() {
        let (app, _) = app_with(
            RecordingClient::new().with_failure("RETRN 1", "Invalid input 'RETRN'"),
            Role::Admin,
            test_config().set_initial(2000),
        );
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g?query=RETRN%201", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Invalid input 'RETRN'" })
        );
    }

    #[tokio::test]
    async fn dispatch_without_query_is_a_bad_request() {
        let (app, _) = app_with(RecordingClient::new(), Role::Admin, test_config());
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn read_only_users_dispatch_read_only_queries() {
        let (app, client) = app_with(
            RecordingClient::new().with_result("MATCH (n) RETURN n", row(&[])),
            Role::ReadOnly,
            test_config().set_initial(2000),
        );
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g?query=MATCH%20(n)%20RETURN%20n", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            client.calls(),
            vec![Call::RoQuery {
                graph: "g".to_string(),
                query: "MATCH (n) RETURN n".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn read_only_users_cannot_delete() {
        let (app, client) = app_with(RecordingClient::new(), Role::ReadOnly, test_config());
        let cookie = login(&app).await;

        let response = send(&app, Method::DELETE, "/api/graph/g", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn copy_uses_the_new_name() {
        let (app, client) = app_with(RecordingClient::new(), Role::ReadWrite, test_config());
        let cookie = login(&app).await;

        let response = send(
            &app,
            Method::POST,
            "/api/graph/movies?newName=movies_copy",
            Some(&cookie),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            client.calls(),
            vec![Call::Copy {
                source: "movies".to_string(),
                destination: "movies_copy".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn memory_reports_for_the_named_graph() {
        let (app, client) = app_with(RecordingClient::new(), Role::ReadOnly, test_config());
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/movies/memory", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            client.calls(),
            vec![Call::MemoryUsage {
                graph: "movies".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn rename_reports_success_as_message_one() {
        let (app, client) = app_with(
            RecordingClient::new().with_graphs(&["movies"]),
            Role::Admin,
            test_config(),
        );
        let cookie = login(&app).await;

        let response = send(
            &app,
            Method::PATCH,
            "/api/graph/movies?newName=films",
            Some(&cookie),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "message": 1 }));
        assert_eq!(
            client.calls(),
            vec![Call::Rename {
                graph: "movies".to_string(),
                new_name: "films".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn rename_onto_an_existing_graph_is_refused() {
        let (app, _) = app_with(
            RecordingClient::new().with_graphs(&["movies", "films"]),
            Role::ReadWrite,
            test_config(),
        );
        let cookie = login(&app).await;

        let response = send(
            &app,
            Method::PATCH,
            "/api/graph/movies?newName=films",
            Some(&cookie),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "films already exists" })
        );
    }

    #[tokio::test]
    async fn rename_without_new_name_is_a_bad_request() {
        let (app, client) = app_with(RecordingClient::new(), Role::Admin, test_config());
        let cookie = login(&app).await;

        let response = send(&app, Method::PATCH, "/api/graph/movies", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Missing parameter 'newName'" })
        );
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn read_only_users_cannot_rename() {
        let (app, client) = app_with(RecordingClient::new(), Role::ReadOnly, test_config());
        let cookie = login(&app).await;

        let response = send(
            &app,
            Method::PATCH,
            "/api/graph/movies?newName=films",
            Some(&cookie),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn explain_returns_the_plan_lines() {
        let (app, client) = app_with(
            RecordingClient::new().with_plan("MATCH (n) RETURN n", &["Results", "    All Node Scan | (n)"]),
            Role::ReadOnly,
            test_config(),
        );
        let cookie = login(&app).await;

        let response = get(
            &app,
            "/api/graph/movies/explain?query=MATCH%20(n)%20RETURN%20n",
            Some(&cookie),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "result": ["Results", "    All Node Scan | (n)"] })
        );
        assert_eq!(
            client.calls(),
            vec![Call::Explain {
                graph: "movies".to_string(),
                query: "MATCH (n) RETURN n".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn profile_uses_the_profile_command() {
        let (app, client) = app_with(
            RecordingClient::new().with_plan("RETURN 1", &["Results | Records produced: 1"]),
            Role::Admin,
            test_config(),
        );
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g/profile?query=RETURN%201", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "result": ["Results | Records produced: 1"] })
        );
        assert!(matches!(client.calls().as_slice(), [Call::Profile { .. }]));
    }

    #[tokio::test]
    async fn explain_without_query_is_a_bad_request() {
        let (app, client) = app_with(RecordingClient::new(), Role::Admin, test_config());
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g/explain", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Missing parameter query" })
        );
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn rejected_plan_is_a_bad_request() {
        let (app, _) = app_with(RecordingClient::new(), Role::Admin, test_config());
        let cookie = login(&app).await;

        let response = get(&app, "/api/graph/g/profile?query=RETRN%201", Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "no canned plan for `RETRN 1`" })
        );
    }
}

//! Node and edge counts streamed as Server-Sent Events.
//!
//! Every response carries exactly one event, `result` or `error`, and then
//! closes. Failures never surface as HTTP errors: the status travels inside the
//! error event's data, 400 for a query the database rejected and 500 for
//! everything else (no session, unreachable database).

use crate::error::{Error as WebError, Result as WebResult};
use crate::extractors::GraphSession;
use crate::params::graph::{timeout_from_ms, TimeoutParams};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use domain::count::{self, schema_graph, CountKind};
use log::*;
use sse::Envelope;
use std::time::Duration;

/// GET node and edge counts of a graph
#[utoipa::path(
    get,
    path = "/api/graph/{graph}/count",
    params(
        ("graph" = String, Path, description = "Graph to count"),
        TimeoutParams
    ),
    responses(
        (status = 200, description = "text/event-stream with one `result` event `{nodes, edges}` or one `error` event `{message, status}`"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn read(
    session: WebResult<GraphSession>,
    Path(graph): Path<String>,
    Query(params): Query<TimeoutParams>,
) -> impl IntoResponse {
    stream_count(session, graph, CountKind::All, timeout_from_ms(params.timeout))
}

/// GET node count of a graph
#[utoipa::path(
    get,
    path = "/api/graph/{graph}/count/nodes",
    params(
        ("graph" = String, Path, description = "Graph to count"),
        TimeoutParams
    ),
    responses(
        (status = 200, description = "text/event-stream with one `result` event `{nodes}` or one `error` event"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn nodes(
    session: WebResult<GraphSession>,
    Path(graph): Path<String>,
    Query(params): Query<TimeoutParams>,
) -> impl IntoResponse {
    stream_count(session, graph, CountKind::Nodes, timeout_from_ms(params.timeout))
}

/// GET edge count of a graph
#[utoipa::path(
    get,
    path = "/api/graph/{graph}/count/edges",
    params(
        ("graph" = String, Path, description = "Graph to count"),
        TimeoutParams
    ),
    responses(
        (status = 200, description = "text/event-stream with one `result` event `{edges}` or one `error` event"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn edges(
    session: WebResult<GraphSession>,
    Path(graph): Path<String>,
    Query(params): Query<TimeoutParams>,
) -> impl IntoResponse {
    stream_count(session, graph, CountKind::Edges, timeout_from_ms(params.timeout))
}

/// GET node and edge counts of a schema
///
/// Counts the graph `{schema}_schema`. Without a timeout the configured
/// schema count timeout applies.
#[utoipa::path(
    get,
    path = "/api/schema/{schema}/count",
    params(
        ("schema" = String, Path, description = "Schema to count"),
        TimeoutParams
    ),
    responses(
        (status = 200, description = "text/event-stream with one `result` event `{nodes, edges}` or one `error` event"),
    ),
    security(
        ("cookie_auth" = [])
    )
)]
pub async fn schema(
    session: WebResult<GraphSession>,
    State(app_state): State<AppState>,
    Path(schema): Path<String>,
    Query(params): Query<TimeoutParams>,
) -> impl IntoResponse {
    let timeout = timeout_from_ms(params.timeout).or(Some(app_state.config.schema_count_timeout()));
    stream_count(session, schema_graph(&schema), CountKind::All, timeout)
}

fn stream_count(
    session: WebResult<GraphSession>,
    graph: String,
    kind: CountKind,
    timeout: Option<Duration>,
) -> impl IntoResponse {
    sse::stream::respond(async move {
        let session = match session {
            Ok(session) => session,
            Err(err) => {
                debug!("Count of {graph} refused: {err}");
                return Envelope::error(err.message(), 500);
            }
        };

        match count::count(session.client.as_ref(), session.mode(), &graph, kind, timeout).await {
            Ok(payload) => Envelope::result(&payload),
            Err(err) => {
                let err = WebError::from(err);
                let status = match err.status_code() {
                    StatusCode::BAD_REQUEST => 400,
                    _ => 500,
                };
                warn!("Count of {graph} failed with {status}: {err}");
                Envelope::error(err.message(), status)
            }
        }
    })
}

//! Node and edge counts for a graph.

use crate::error::Error;
use crate::graph::{run_query, GraphClient, QueryMode, QueryResult};
use log::*;
use serde::Serialize;
use std::time::Duration;

pub const NODES_QUERY: &str = "MATCH (n) RETURN count(n) as nodes";
pub const EDGES_QUERY: &str = "MATCH ()-[e]->() RETURN count(e) as edges";

/// Suffix of the graph holding a schema's metadata.
pub const SCHEMA_SUFFIX: &str = "_schema";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountKind {
    Nodes,
    Edges,
    /// Nodes and edges together. A failing edge count reads as zero edges.
    All,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edges: Option<u64>,
    /// Combined counts only: sum of the internal execution times of both queries, in ms.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
}

/// Name of the graph storing the schema called `schema`.
pub fn schema_graph(schema: &str) -> String {
    format!("{schema}{SCHEMA_SUFFIX}")
}

pub async fn count(
    client: &dyn GraphClient,
    mode: QueryMode,
    graph: &str,
    kind: CountKind,
    timeout: Option<Duration>,
) -> Result<CountPayload, Error> {
    debug!("Counting {kind:?} in graph {graph} ({mode:?})");

    match kind {
        CountKind::Nodes => {
            let nodes = run_query(client, mode, graph, NODES_QUERY, timeout).await?;
            Ok(CountPayload {
                nodes: Some(nodes.first_u64("nodes").unwrap_or(0)),
                edges: None,
                execution_time: None,
            })
        }
        CountKind::Edges => {
            let edges = run_query(client, mode, graph, EDGES_QUERY, timeout).await?;
            Ok(CountPayload {
                nodes: None,
                edges: Some(edges.first_u64("edges").unwrap_or(0)),
                execution_time: None,
            })
        }
        CountKind::All => {
            let (nodes, edges) = tokio::join!(
                run_query(client, mode, graph, NODES_QUERY, timeout),
                run_query(client, mode, graph, EDGES_QUERY, timeout),
            );
            let nodes = nodes?;
            // The engine can error instead of counting zero on a graph without edges.
            let edges = edges.unwrap_or_else(|err| {
                warn!("Edge count failed for graph {graph}, reporting 0 edges: {err}");
                QueryResult::default()
            });

            Ok(CountPayload {
                nodes: Some(nodes.first_u64("nodes").unwrap_or(0)),
                edges: Some(edges.first_u64("edges").unwrap_or(0)),
                execution_time: sum_times(&[&nodes, &edges]),
            })
        }
    }
}

fn sum_times(results: &[&QueryResult]) -> Option<f64> {
    results
        .iter()
        .filter_map(|result| result.execution_time_ms())
        .reduce(|total, time| total + time)
}

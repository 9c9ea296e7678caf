use serde::Deserialize;
use std::time::Duration;
use utoipa::IntoParams;

/// Query string of a graph query dispatch.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct QueryParams {
    /// Cypher query to run
    pub(crate) query: Option<String>,
    /// Query timeout in milliseconds
    pub(crate) timeout: Option<u64>,
}

/// Query string of a result poll. The id stays a string so a malformed
/// value can be reported instead of rejected by the extractor.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct PollParams {
    /// Request id returned when the query was dispatched
    pub(crate) id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct CopyParams {
    /// Name of the graph to create
    #[serde(rename = "newName")]
    pub(crate) new_name: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct RenameParams {
    /// Name the graph is renamed to
    #[serde(rename = "newName")]
    pub(crate) new_name: Option<String>,
}

/// Query string of an explain or profile request.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct PlanParams {
    /// Cypher query to plan
    pub(crate) query: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct TimeoutParams {
    /// Query timeout in milliseconds
    pub(crate) timeout: Option<u64>,
}

/// Zero means no timeout.
pub(crate) fn timeout_from_ms(timeout: Option<u64>) -> Option<Duration> {
    timeout.filter(|ms| *ms > 0).map(Duration::from_millis)
}

//! The graph database as seen from the API: roles, query results and the
//! client trait every database call goes through.

use crate::error::Error;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const EXECUTION_TIME_PREFIX: &str = "Query internal execution time:";

/// Permission tier of a connected user, as detected at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    #[serde(rename = "Read-Write")]
    ReadWrite,
    #[serde(rename = "Read-Only")]
    ReadOnly,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "Admin"),
            Role::ReadWrite => write!(f, "Read-Write"),
            Role::ReadOnly => write!(f, "Read-Only"),
        }
    }
}

/// Which query command a caller is allowed to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    ReadOnly,
    ReadWrite,
}

impl From<Role> for QueryMode {
    fn from(role: Role) -> Self {
        match role {
            Role::ReadOnly => QueryMode::ReadOnly,
            Role::Admin | Role::ReadWrite => QueryMode::ReadWrite,
        }
    }
}

/// Rows returned by a query plus the statistics lines the database appends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Map<String, Value>>,
    pub metadata: Vec<String>,
}

impl QueryResult {
    /// Internal execution time in milliseconds, when the database reported one.
    pub fn execution_time_ms(&self) -> Option<f64> {
        self.metadata.iter().find_map(|line| {
            line.strip_prefix(EXECUTION_TIME_PREFIX)?
                .trim()
                .trim_end_matches("milliseconds")
                .trim()
                .parse()
                .ok()
        })
    }

    /// Integer value of `column` in the first row.
    pub fn first_u64(&self, column: &str) -> Option<u64> {
        self.data.first()?.get(column)?.as_u64()
    }
}

/// A connected FalkorDB client, scoped to the credentials it logged in with.
///
/// The read-only and read-write query commands are separate operations;
/// callers choose between them through [`QueryMode`] using [`run_query`].
#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Runs `query` with `GRAPH.QUERY` (may write).
    async fn query(
        &self,
        graph: &str,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryResult, Error>;

    /// Runs `query` with `GRAPH.RO_QUERY` (rejected by the database if it writes).
    async fn ro_query(
        &self,
        graph: &str,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryResult, Error>;

    /// Names of all graphs on the server.
    async fn list(&self) -> Result<Vec<String>, Error>;

    /// Loaded modules, one array of alternating keys and values per module.
    async fn module_list(&self) -> Result<Vec<Vec<Value>>, Error>;

    /// Copies `source` into a new graph named `destination`.
    async fn copy(&self, source: &str, destination: &str) -> Result<(), Error>;

    async fn delete(&self, graph: &str) -> Result<(), Error>;

    /// Memory report for `graph` as returned by `GRAPH.MEMORY USAGE`.
    async fn memory_usage(&self, graph: &str) -> Result<Value, Error>;

    /// Execution plan of `query`, one line per operation, without running it.
    async fn explain(&self, graph: &str, query: &str) -> Result<Vec<String>, Error>;

    /// Runs `query` and returns its plan annotated with per-operation records
    /// and timings.
    async fn profile(&self, graph: &str, query: &str) -> Result<Vec<String>, Error>;

    /// Renames `graph` to `new_name` unless a key with that name exists.
    /// Returns whether the rename happened.
    async fn rename(&self, graph: &str, new_name: &str) -> Result<bool, Error>;
}

pub type SharedClient = Arc<dyn GraphClient>;

/// Dispatches to the query command `mode` permits.
pub async fn run_query(
    client: &dyn GraphClient,
    mode: QueryMode,
    graph: &str,
    query: &str,
    timeout: Option<Duration>,
) -> Result<QueryResult, Error> {
    match mode {
        QueryMode::ReadOnly => client.ro_query(graph, query, timeout).await,
        QueryMode::ReadWrite => client.query(graph, query, timeout).await,
    }
}

/// Connection parameters submitted at login.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
}

// Never print the password.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish()
    }
}

/// Opens client connections and detects the role they carry.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<(SharedClient, Role), Error>;
}

#[cfg(any(test, feature = "mock"))]
pub mod mock {
    //! In-memory client that records every call, for tests.

    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Query { graph: String, query: String },
        RoQuery { graph: String, query: String },
        List,
        ModuleList,
        Copy { source: String, destination: String },
        Delete { graph: String },
        MemoryUsage { graph: String },
        Explain { graph: String, query: String },
        Profile { graph: String, query: String },
        Rename { graph: String, new_name: String },
    }

    /// Answers queries from a table of canned results keyed by query text.
    /// Unknown queries fail with a query error.
    #[derive(Default)]
    pub struct RecordingClient {
        results: HashMap<String, Result<QueryResult, String>>,
        graphs: Vec<String>,
        modules: Option<Result<Vec<Vec<Value>>, String>>,
        plans: HashMap<String, Vec<String>>,
        calls: Mutex<Vec<Call>>,
    }

    impl RecordingClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_result(mut self, query: &str, result: QueryResult) -> Self {
            self.results.insert(query.to_string(), Ok(result));
            self
        }

        pub fn with_failure(mut self, query: &str, message: &str) -> Self {
            self.results
                .insert(query.to_string(), Err(message.to_string()));
            self
        }

        pub fn with_graphs(mut self, graphs: &[&str]) -> Self {
            self.graphs = graphs.iter().map(|g| g.to_string()).collect();
            self
        }

        pub fn with_modules(mut self, modules: Result<Vec<Vec<Value>>, String>) -> Self {
            self.modules = Some(modules);
            self
        }

        /// Plan lines answered by both `explain` and `profile` for `query`.
        pub fn with_plan(mut self, query: &str, lines: &[&str]) -> Self {
            self.plans.insert(
                query.to_string(),
                lines.iter().map(|line| line.to_string()).collect(),
            );
            self
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        fn answer(&self, query: &str) -> Result<QueryResult, Error> {
            match self.results.get(query) {
                Some(Ok(result)) => Ok(result.clone()),
                Some(Err(message)) => Err(Error::query(message.clone())),
                None => Err(Error::query(format!("no canned result for `{query}`"))),
            }
        }

        fn plan(&self, query: &str) -> Result<Vec<String>, Error> {
            self.plans
                .get(query)
                .cloned()
                .ok_or_else(|| Error::query(format!("no canned plan for `{query}`")))
        }
    }

    /// Single-row result with the given integer columns.
    pub fn row(columns: &[(&str, u64)]) -> QueryResult {
        let mut row = Map::new();
        for (name, value) in columns {
            row.insert(name.to_string(), Value::from(*value));
        }
        QueryResult {
            data: vec![row],
            metadata: vec![],
        }
    }

    #[async_trait]
    impl GraphClient for RecordingClient {
        async fn query(
            &self,
            graph: &str,
            query: &str,
            _timeout: Option<Duration>,
        ) -> Result<QueryResult, Error> {
            self.record(Call::Query {
                graph: graph.to_string(),
                query: query.to_string(),
            });
            self.answer(query)
        }

        async fn ro_query(
            &self,
            graph: &str,
            query: &str,
            _timeout: Option<Duration>,
        ) -> Result<QueryResult, Error> {
            self.record(Call::RoQuery {
                graph: graph.to_string(),
                query: query.to_string(),
            });
            self.answer(query)
        }

        async fn list(&self) -> Result<Vec<String>, Error> {
            self.record(Call::List);
            Ok(self.graphs.clone())
        }

        async fn module_list(&self) -> Result<Vec<Vec<Value>>, Error> {
            self.record(Call::ModuleList);
            match &self.modules {
                Some(Ok(modules)) => Ok(modules.clone()),
                Some(Err(message)) if message.starts_with("NOPERM") => Err(Error {
                    source: None,
                    error_kind: crate::error::DomainErrorKind::External(
                        crate::error::ExternalErrorKind::PermissionDenied(message.clone()),
                    ),
                }),
                Some(Err(message)) => Err(Error::query(message.clone())),
                None => Ok(vec![]),
            }
        }

        async fn copy(&self, source: &str, destination: &str) -> Result<(), Error> {
            self.record(Call::Copy {
                source: source.to_string(),
                destination: destination.to_string(),
            });
            Ok(())
        }

        async fn delete(&self, graph: &str) -> Result<(), Error> {
            self.record(Call::Delete {
                graph: graph.to_string(),
            });
            Ok(())
        }

        async fn memory_usage(&self, graph: &str) -> Result<Value, Error> {
            self.record(Call::MemoryUsage {
                graph: graph.to_string(),
            });
            Ok(Value::Array(vec![]))
        }

        async fn explain(&self, graph: &str, query: &str) -> Result<Vec<String>, Error> {
            self.record(Call::Explain {
                graph: graph.to_string(),
                query: query.to_string(),
            });
            self.plan(query)
        }

        async fn profile(&self, graph: &str, query: &str) -> Result<Vec<String>, Error> {
            self.record(Call::Profile {
                graph: graph.to_string(),
                query: query.to_string(),
            });
            self.plan(query)
        }

        // Fails when the new name is one of the configured graphs.
        async fn rename(&self, graph: &str, new_name: &str) -> Result<bool, Error> {
            self.record(Call::Rename {
                graph: graph.to_string(),
                new_name: new_name.to_string(),
            });
            Ok(!self.graphs.iter().any(|name| name == new_name))
        }
    }

    /// Hands out the same client and role on every login.
    pub struct StaticConnector {
        pub client: Arc<RecordingClient>,
        pub role: Role,
    }

    #[async_trait]
    impl Connector for StaticConnector {
        async fn connect(&self, _credentials: &Credentials) -> Result<(SharedClient, Role), Error> {
            let client: SharedClient = self.client.clone();
            Ok((client, self.role))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{row, Call, RecordingClient};
    use super::*;

    #[test]
    fn read_only_role_maps_to_read_only_mode() {
        assert_eq!(QueryMode::from(Role::ReadOnly), QueryMode::ReadOnly);
        assert_eq!(QueryMode::from(Role::ReadWrite), QueryMode::ReadWrite);
        assert_eq!(QueryMode::from(Role::Admin), QueryMode::ReadWrite);
    }

    #[test]
    fn role_serializes_with_display_names() {
        assert_eq!(
            serde_json::to_string(&Role::ReadOnly).unwrap(),
            r#""Read-Only""#
        );
        assert_eq!(
            serde_json::from_str::<Role>(r#""Read-Write""#).unwrap(),
            Role::ReadWrite
        );
    }

    #[test]
    fn execution_time_is_parsed_from_metadata() {
        let result = QueryResult {
            data: vec![],
            metadata: vec![
                "Nodes created: 1".to_string(),
                "Query internal execution time: 0.250000 milliseconds".to_string(),
            ],
        };

        assert_eq!(result.execution_time_ms(), Some(0.25));
    }

    #[test]
    fn execution_time_is_absent_without_metadata() {
        assert_eq!(QueryResult::default().execution_time_ms(), None);
    }

    #[tokio::test]
    async fn run_query_in_read_only_mode_uses_ro_query() {
        let client = RecordingClient::new().with_result("MATCH (n) RETURN n", row(&[]));

        run_query(&client, QueryMode::ReadOnly, "g", "MATCH (n) RETURN n", None)
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![Call::RoQuery {
                graph: "g".to_string(),
                query: "MATCH (n) RETURN n".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn run_query_in_read_write_mode_uses_query() {
        let client = RecordingClient::new().with_result("CREATE (n)", row(&[]));

        run_query(&client, QueryMode::ReadWrite, "g", "CREATE (n)", None)
            .await
            .unwrap();

        assert!(matches!(client.calls().as_slice(), [Call::Query { .. }]));
    }
}

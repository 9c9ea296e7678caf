//! FalkorDB client speaking the `GRAPH.*` command family over a multiplexed
//! Redis protocol connection.

use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use crate::graph::{Connector, Credentials, GraphClient, QueryResult, Role, SharedClient};
use async_trait::async_trait;
use log::*;
use redis::aio::MultiplexedConnection;
use redis::Value as RedisValue;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use std::time::Duration;

pub struct FalkorClient {
    connection: MultiplexedConnection,
}

impl FalkorClient {
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(|err| Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        })?;
        let connection = client.get_multiplexed_async_connection().await?;

        Ok(Self { connection })
    }

    /// Works out which role the authenticated user has, the same way the
    /// browser always has: only admins may read ACL entries, and only
    /// read-only users are refused `GRAPH.QUERY` on permission grounds.
    pub async fn detect_role(&self, username: &str) -> Result<Role, Error> {
        let mut connection = self.connection.clone();

        let acl: redis::RedisResult<RedisValue> = redis::cmd("ACL")
            .arg("GETUSER")
            .arg(username)
            .query_async(&mut connection)
            .await;
        match acl {
            Ok(_) => return Ok(Role::Admin),
            Err(err) if is_permission_error(&err) => {
                debug!("User {username} is not an admin: {err}");
            }
            Err(err) => return Err(err.into()),
        }

        // Deliberately malformed: only the kind of error matters.
        let bare_query: redis::RedisResult<RedisValue> =
            redis::cmd("GRAPH.QUERY").query_async(&mut connection).await;
        match bare_query {
            Err(err) if err.to_string().contains("permissions") => {
                debug!("User {username} is read-only: {err}");
                Ok(Role::ReadOnly)
            }
            Err(err) => {
                debug!("User {username} is read-write: {err}");
                Ok(Role::ReadWrite)
            }
            Ok(_) => Ok(Role::Admin),
        }
    }

    async fn graph_query(
        &self,
        command: &str,
        graph: &str,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryResult, Error> {
        let mut cmd = redis::cmd(command);
        cmd.arg(graph).arg(query);
        if let Some(timeout) = timeout {
            cmd.arg("TIMEOUT").arg(timeout.as_millis() as u64);
        }

        trace!("{command} on {graph}: {query}");
        let reply: RedisValue = cmd.query_async(&mut self.connection.clone()).await?;

        parse_query_reply(reply)
    }

    async fn plan(&self, command: &str, graph: &str, query: &str) -> Result<Vec<String>, Error> {
        trace!("{command} on {graph}: {query}");
        let reply: RedisValue = redis::cmd(command)
            .arg(graph)
            .arg(query)
            .query_async(&mut self.connection.clone())
            .await?;

        Ok(plan_lines(reply))
    }
}

#[async_trait]
impl GraphClient for FalkorClient {
    async fn query(
        &self,
        graph: &str,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryResult, Error> {
        self.graph_query("GRAPH.QUERY", graph, query, timeout).await
    }

    async fn ro_query(
        &self,
        graph: &str,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryResult, Error> {
        self.graph_query("GRAPH.RO_QUERY", graph, query, timeout).await
    }

    async fn list(&self) -> Result<Vec<String>, Error> {
        let reply: RedisValue = redis::cmd("GRAPH.LIST")
            .query_async(&mut self.connection.clone())
            .await?;

        match to_json(reply) {
            Value::Array(names) => Ok(names
                .into_iter()
                .filter_map(|name| name.as_str().map(str::to_string))
                .collect()),
            other => Err(Error::internal(format!(
                "Unexpected GRAPH.LIST reply: {other}"
            ))),
        }
    }

    async fn module_list(&self) -> Result<Vec<Vec<Value>>, Error> {
        let reply: RedisValue = redis::cmd("MODULE")
            .arg("LIST")
            .query_async(&mut self.connection.clone())
            .await?;

        match to_json(reply) {
            Value::Array(modules) => Ok(modules
                .into_iter()
                .map(|module| match module {
                    Value::Array(fields) => fields,
                    other => vec![other],
                })
                .collect()),
            other => Err(Error::internal(format!(
                "Unexpected MODULE LIST reply: {other}"
            ))),
        }
    }

    async fn copy(&self, source: &str, destination: &str) -> Result<(), Error> {
        let _: RedisValue = redis::cmd("GRAPH.COPY")
            .arg(source)
            .arg(destination)
            .query_async(&mut self.connection.clone())
            .await?;
        Ok(())
    }

    async fn delete(&self, graph: &str) -> Result<(), Error> {
        let _: RedisValue = redis::cmd("GRAPH.DELETE")
            .arg(graph)
            .query_async(&mut self.connection.clone())
            .await?;
        Ok(())
    }

    async fn memory_usage(&self, graph: &str) -> Result<Value, Error> {
        let reply: RedisValue = redis::cmd("GRAPH.MEMORY")
            .arg("USAGE")
            .arg(graph)
            .query_async(&mut self.connection.clone())
            .await?;
        Ok(to_json(reply))
    }

    async fn explain(&self, graph: &str, query: &str) -> Result<Vec<String>, Error> {
        self.plan("GRAPH.EXPLAIN", graph, query).await
    }

    async fn profile(&self, graph: &str, query: &str) -> Result<Vec<String>, Error> {
        self.plan("GRAPH.PROFILE", graph, query).await
    }

    async fn rename(&self, graph: &str, new_name: &str) -> Result<bool, Error> {
        let renamed: i64 = redis::cmd("RENAMENX")
            .arg(graph)
            .arg(new_name)
            .query_async(&mut self.connection.clone())
            .await?;
        Ok(renamed == 1)
    }
}

/// Opens a [`FalkorClient`] per login, filling in the configured default
/// host and port when the login form leaves them out.
pub struct FalkorConnector {
    default_host: String,
    default_port: u16,
}

impl FalkorConnector {
    pub fn new(default_host: impl Into<String>, default_port: u16) -> Self {
        Self {
            default_host: default_host.into(),
            default_port,
        }
    }

    pub fn connection_url(&self, credentials: &Credentials) -> String {
        let host = credentials
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
            .unwrap_or(self.default_host.as_str());
        let port = credentials.port.unwrap_or(self.default_port);

        let username = credentials.username.as_deref().unwrap_or_default();
        let password = credentials.password.as_deref().unwrap_or_default();
        if username.is_empty() && password.is_empty() {
            return format!("redis://{host}:{port}");
        }

        format!(
            "redis://{}:{}@{host}:{port}",
            urlencoding::encode(username),
            urlencoding::encode(password)
        )
    }
}

#[async_trait]
impl Connector for FalkorConnector {
    async fn connect(&self, credentials: &Credentials) -> Result<(SharedClient, Role), Error> {
        let client = FalkorClient::connect(&self.connection_url(credentials)).await?;
        let username = credentials
            .username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("default");
        let role = client.detect_role(username).await?;

        info!("Connected to FalkorDB as {username} with role {role}");
        let client: SharedClient = Arc::new(client);
        Ok((client, role))
    }
}

fn is_permission_error(err: &redis::RedisError) -> bool {
    err.code() == Some("NOPERM") || err.to_string().contains("NOPERM")
}

/// `GRAPH.QUERY` replies with `[header, rows, statistics]` when the query
/// returns something and with `[statistics]` otherwise.
fn parse_query_reply(reply: RedisValue) -> Result<QueryResult, Error> {
    let mut sections = match reply {
        RedisValue::Array(sections) => sections,
        other => {
            return Err(Error::internal(format!(
                "Unexpected query reply: {other:?}"
            )))
        }
    };

    let metadata = match sections.pop().map(to_json) {
        Some(Value::Array(lines)) => lines
            .into_iter()
            .filter_map(|line| line.as_str().map(str::to_string))
            .collect(),
        _ => vec![],
    };

    if sections.len() < 2 {
        return Ok(QueryResult {
            data: vec![],
            metadata,
        });
    }

    let rows = sections.pop().map(to_json);
    let header = sections.pop().map(to_json);

    let columns: Vec<String> = match header {
        Some(Value::Array(columns)) => columns.into_iter().map(column_name).collect(),
        _ => vec![],
    };

    let data = match rows {
        Some(Value::Array(rows)) => rows
            .into_iter()
            .map(|row| {
                let values = match row {
                    Value::Array(values) => values,
                    other => vec![other],
                };
                columns
                    .iter()
                    .cloned()
                    .zip(values)
                    .collect::<Map<String, Value>>()
            })
            .collect(),
        _ => vec![],
    };

    Ok(QueryResult { data, metadata })
}

fn plan_lines(reply: RedisValue) -> Vec<String> {
    match to_json(reply) {
        Value::Array(lines) => lines
            .into_iter()
            .map(|line| match line {
                Value::String(line) => line,
                other => other.to_string(),
            })
            .collect(),
        Value::String(line) => vec![line],
        _ => vec![],
    }
}

fn column_name(cell: Value) -> String {
    match cell {
        Value::String(name) => name,
        other => other.to_string(),
    }
}

fn to_json(value: RedisValue) -> Value {
    match value {
        RedisValue::Nil => Value::Null,
        RedisValue::Int(n) => Value::from(n),
        RedisValue::Double(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
        RedisValue::Boolean(b) => Value::Bool(b),
        // Doubles arrive as bulk strings too and are passed through as text.
        RedisValue::BulkString(bytes) => {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        }
        RedisValue::SimpleString(text) => Value::String(text),
        RedisValue::Okay => Value::String("OK".to_string()),
        RedisValue::Array(items) | RedisValue::Set(items) => {
            Value::Array(items.into_iter().map(to_json).collect())
        }
        RedisValue::Map(pairs) => Value::Array(
            pairs
                .into_iter()
                .map(|(key, value)| Value::Array(vec![to_json(key), to_json(value)]))
                .collect(),
        ),
        other => Value::String(format!("{other:?}")),
    }
}

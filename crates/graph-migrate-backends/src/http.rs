//! Neo4j backend over the transactional HTTP API, using `reqwest`.
//!
//! Endpoints used, relative to `{url}/db/{database}`:
//!
//! | Operation | Request |
//! |---|---|
//! | auto-commit statement | `POST /tx/commit` |
//! | begin transaction | `POST /tx` (the response names the transaction URL) |
//! | statement in transaction | `POST /tx/{id}` |
//! | commit | `POST /tx/{id}/commit` |
//! | rollback | `DELETE /tx/{id}` |
//!
//! The server answers `200`/`201` even when a statement fails; failures are
//! reported in the body's `errors` array and mapped onto [`MigrateError`].

use std::collections::BTreeMap;

use graph_migrate_core::{DatabaseSettings, MigrateError};
use serde::Deserialize;

use crate::base::{GraphBackend, GraphTransaction, Params};
use crate::value::{Row, Value};

const CONSTRAINT_VIOLATION: &str = "Neo.ClientError.Schema.ConstraintValidationFailed";

/// A graph backend speaking Neo4j's transactional HTTP API.
pub struct HttpBackend {
    client: reqwest::Client,
    tx_endpoint: String,
    user: String,
    password: String,
}

impl HttpBackend {
    /// Creates a backend for `database` at `url` (e.g. `http://localhost:7474`).
    ///
    /// No network traffic happens until the first statement runs.
    pub fn new(
        url: &str,
        database: &str,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, MigrateError> {
        let url = url.trim_end_matches('/');
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(MigrateError::Configuration(format!(
                "Database URL must start with http:// or https://, got '{url}'"
            )));
        }
        if database.is_empty() {
            return Err(MigrateError::Configuration("Database name is empty".into()));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| MigrateError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            tx_endpoint: format!("{url}/db/{database}/tx"),
            user: user.into(),
            password: password.into(),
        })
    }

    /// Creates a backend from [`DatabaseSettings`].
    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self, MigrateError> {
        Self::new(
            &settings.url,
            &settings.name,
            settings.user.clone(),
            settings.password.clone(),
        )
    }

    /// Returns the transaction endpoint this backend posts to.
    pub fn tx_endpoint(&self) -> &str {
        &self.tx_endpoint
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<TxResponse, MigrateError> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.user, Some(&self.password))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let text = response.text().await.map_err(transport_error)?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(MigrateError::Connection(format!(
                "Authentication rejected by {url} (HTTP {status})"
            )));
        }

        let mut parsed: TxResponse = serde_json::from_str(&text).map_err(|e| {
            MigrateError::Database(format!("Unexpected response from {url} (HTTP {status}): {e}"))
        })?;
        if parsed.commit.is_none() {
            parsed.commit = location.map(|l| format!("{l}/commit"));
        }
        Ok(parsed)
    }

    async fn run_auto_commit(
        &self,
        statement: &str,
        params: Params<'_>,
    ) -> Result<Vec<Row>, MigrateError> {
        let url = format!("{}/commit", self.tx_endpoint);
        let response = self.post(&url, &request_body(statement, params)).await?;
        decode_response(response)
    }
}

#[async_trait::async_trait]
impl GraphBackend for HttpBackend {
    fn vendor(&self) -> &str {
        "neo4j-http"
    }

    async fn execute(&self, statement: &str, params: Params<'_>) -> Result<(), MigrateError> {
        self.run_auto_commit(statement, params).await.map(|_| ())
    }

    async fn query(&self, statement: &str, params: Params<'_>) -> Result<Vec<Row>, MigrateError> {
        self.run_auto_commit(statement, params).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn GraphTransaction>, MigrateError> {
        let response = self
            .post(&self.tx_endpoint, &serde_json::json!({ "statements": [] }))
            .await?;
        let commit_url = response.commit.clone().ok_or_else(|| {
            MigrateError::Database("Server did not return a transaction URL".into())
        })?;
        decode_response(response)?;

        let tx_url = commit_url.trim_end_matches("/commit").to_string();
        tracing::debug!(tx = %tx_url, "Opened transaction");
        Ok(Box::new(HttpTransaction {
            backend: HttpHandle {
                client: self.client.clone(),
                user: self.user.clone(),
                password: self.password.clone(),
            },
            tx_url,
            commit_url,
        }))
    }
}

/// The pieces of [`HttpBackend`] a transaction needs to outlive the borrow.
struct HttpHandle {
    client: reqwest::Client,
    user: String,
    password: String,
}

struct HttpTransaction {
    backend: HttpHandle,
    tx_url: String,
    commit_url: String,
}

impl HttpTransaction {
    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<TxResponse, MigrateError> {
        let response = self
            .backend
            .client
            .post(url)
            .basic_auth(&self.backend.user, Some(&self.backend.password))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MigrateError::Database(format!(
                "Transaction {} no longer exists (expired or rolled back)",
                self.tx_url
            )));
        }
        response.json::<TxResponse>().await.map_err(|e| {
            MigrateError::Database(format!("Unexpected response from {url} (HTTP {status}): {e}"))
        })
    }
}

#[async_trait::async_trait]
impl GraphTransaction for HttpTransaction {
    async fn execute(&mut self, statement: &str, params: Params<'_>) -> Result<(), MigrateError> {
        let response = self.post(&self.tx_url, &request_body(statement, params)).await?;
        decode_response(response).map(|_| ())
    }

    async fn commit(self: Box<Self>) -> Result<(), MigrateError> {
        let response = self
            .post(&self.commit_url, &serde_json::json!({ "statements": [] }))
            .await?;
        decode_response(response).map(|_| ())
    }

    async fn rollback(self: Box<Self>) -> Result<(), MigrateError> {
        let response = self
            .backend
            .client
            .delete(&self.tx_url)
            .basic_auth(&self.backend.user, Some(&self.backend.password))
            .send()
            .await
            .map_err(transport_error)?;
        // The server already discards a transaction whose statement failed.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let parsed = response.json::<TxResponse>().await.map_err(|e| {
            MigrateError::Database(format!("Unexpected rollback response: {e}"))
        })?;
        decode_response(parsed).map(|_| ())
    }
}

// ── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
    #[serde(default)]
    commit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<DataRow>,
}

#[derive(Debug, Deserialize)]
struct DataRow {
    row: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

fn request_body(statement: &str, params: Params<'_>) -> serde_json::Value {
    let parameters: BTreeMap<&str, serde_json::Value> =
        params.iter().map(|(k, v)| (*k, v.to_json())).collect();
    serde_json::json!({
        "statements": [{ "statement": statement, "parameters": parameters }]
    })
}

/// Turns a server response into rows of the last statement, or the first
/// reported error.
fn decode_response(response: TxResponse) -> Result<Vec<Row>, MigrateError> {
    if let Some(error) = response.errors.into_iter().next() {
        return Err(server_error(&error.code, &error.message));
    }
    let Some(result) = response.results.into_iter().last() else {
        return Ok(Vec::new());
    };
    result
        .data
        .into_iter()
        .map(|data| {
            let values = data.row.into_iter().map(Value::from_json).collect();
            Row::new(result.columns.clone(), values)
        })
        .collect()
}

fn server_error(code: &str, message: &str) -> MigrateError {
    if code == CONSTRAINT_VIOLATION {
        MigrateError::ConstraintViolation(message.to_string())
    } else {
        MigrateError::Database(format!("{code}: {message}"))
    }
}

#[allow(clippy::needless_pass_by_value)]
fn transport_error(e: reqwest::Error) -> MigrateError {
    if e.is_connect() || e.is_timeout() {
        MigrateError::Connection(e.to_string())
    } else {
        MigrateError::Database(format!("HTTP request failed: {e}"))
    }
}

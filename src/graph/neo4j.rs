//! Neo4j backend over the HTTP transactional endpoint

use super::cypher::{self, Statement};
use super::traits::{GraphCommand, GraphStore, Properties, StoreError, StoreResult};
use crate::config::GraphConfig;
use crate::ConfigError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Prefix of Neo4j error codes worth retrying
const TRANSIENT_CODE_PREFIX: &str = "Neo.TransientError";

pub struct Neo4jStore {
    client: Client,
    endpoint: String,
    username: String,
    password: String,
}

impl Neo4jStore {
    pub fn new(
        url: &str,
        database: &str,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/db/{}/tx/commit", url.trim_end_matches('/'), database),
            username: username.into(),
            password: password.into(),
        })
    }

    /// Builds a store from config, reading the password from the configured
    /// environment variable
    pub fn from_config(config: &GraphConfig) -> crate::Result<Self> {
        let password = std::env::var(&config.password_env)
            .map_err(|_| ConfigError::MissingEnv(config.password_env.clone()))?;
        Ok(Self::new(
            &config.url,
            &config.database,
            &config.username,
            password,
        )?)
    }

    async fn run(&self, statement: Statement) -> StoreResult<Vec<Properties>> {
        let payload = TxRequest {
            statements: vec![TxStatement {
                statement: &statement.text,
                parameters: &statement.parameters,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(&payload)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(StoreError::Unavailable(format!("HTTP {}", status.as_u16())));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let body: TxResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        if let Some(error) = body.errors.into_iter().next() {
            if error.code.starts_with(TRANSIENT_CODE_PREFIX) {
                return Err(StoreError::Unavailable(error.message));
            }
            return Err(StoreError::Rejected(error.message));
        }

        let rows = body
            .results
            .into_iter()
            .next()
            .map(|result| result.data)
            .unwrap_or_default();

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.row.into_iter().next() {
                Some(Value::Object(map)) => Some(map),
                _ => None,
            })
            .collect())
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn initialize(&self) -> StoreResult<()> {
        for statement in cypher::schema_statements() {
            self.run(statement).await?;
        }
        info!("Neo4j full-text index {} ready", cypher::FULLTEXT_INDEX);
        Ok(())
    }

    async fn execute(&self, command: &GraphCommand) -> StoreResult<Vec<Properties>> {
        let statement = cypher::render(command);
        debug!("Cypher {}: {}", command.name(), statement.text);
        self.run(statement).await
    }

    fn backend_name(&self) -> &'static str {
        "neo4j"
    }
}

#[derive(Serialize)]
struct TxRequest<'a> {
    statements: Vec<TxStatement<'a>>,
}

#[derive(Serialize)]
struct TxStatement<'a> {
    statement: &'a str,
    parameters: &'a Properties,
}

#[derive(Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Deserialize)]
struct TxResult {
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Deserialize)]
struct TxRow {
    #[serde(default)]
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct TxError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

//! GraphQL transport to the Pipefy API.
//!
//! Every operation is a single `POST` of `{"query", "variables"}` to one
//! endpoint, authorized with the caller's Pipefy token as a bearer header.
//! There are no retries; a timeout surfaces as [`PipefyError::Request`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::PipefyError;
use crate::queries::Operation;

/// Default Pipefy GraphQL endpoint.
pub const DEFAULT_API_URL: &str = "https://api.pipefy.com/graphql";

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GraphqlError {
    #[serde(default)]
    pub message: String,
}

/// A 2xx GraphQL response. Callers must check [`GraphqlResponse::errors`]
/// themselves, or use [`GraphqlResponse::into_data`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub errors: Vec<GraphqlError>,
}

impl GraphqlResponse {
    pub fn from_data(data: Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Error messages, with a placeholder for entries that carry none.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| {
                if e.message.is_empty() {
                    "Unknown error".to_string()
                } else {
                    e.message.clone()
                }
            })
            .collect()
    }

    /// The `data` object, or an error if the response carries `errors` or
    /// no data at all.
    pub fn into_data(self) -> Result<Value, PipefyError> {
        if !self.errors.is_empty() {
            return Err(PipefyError::Graphql {
                messages: self.error_messages(),
            });
        }
        match self.data {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(PipefyError::UnexpectedResponse(
                "response has no data".into(),
            )),
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<GraphqlError>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<GraphqlError>>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Executes one GraphQL operation on behalf of a caller.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn execute(
        &self,
        operation: &Operation,
        variables: Value,
        token: &str,
    ) -> Result<GraphqlResponse, PipefyError>;
}

/// HTTP client for the Pipefy GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct PipefyClient {
    client: reqwest::Client,
    api_url: String,
}

impl PipefyClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, PipefyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_url))
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- private helpers ----

    /// Returns the response unchanged on a 2xx status, or
    /// [`PipefyError::Api`] with the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, PipefyError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PipefyError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl GraphqlTransport for PipefyClient {
    async fn execute(
        &self,
        operation: &Operation,
        variables: Value,
        token: &str,
    ) -> Result<GraphqlResponse, PipefyError> {
        let body = serde_json::json!({
            "query": operation.document,
            "variables": variables,
        });

        tracing::debug!(operation = operation.name, "Sending Pipefy request");

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;

        tracing::debug!(
            operation = operation.name,
            status = response.status().as_u16(),
            "Pipefy response received"
        );

        let text = Self::ensure_success(response).await?.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| PipefyError::UnexpectedResponse(format!("invalid JSON body: {e}")))
    }
}

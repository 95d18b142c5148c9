//! In-process [`GraphqlTransport`] for tests.
//!
//! Responses come from a closure over `(operation name, variables)`; every
//! call is recorded so tests can assert on what was sent.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{GraphqlError, GraphqlResponse, GraphqlTransport};
use crate::error::PipefyError;
use crate::queries::Operation;

type Handler = dyn Fn(&str, &Value) -> Result<GraphqlResponse, PipefyError> + Send + Sync;

/// One call seen by a [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub variables: Value,
    pub token: String,
}

pub struct ScriptedTransport {
    handler: Box<Handler>,
    calls: Mutex<Vec<RecordedCall>>,
    latencies: Vec<(&'static str, Duration)>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<GraphqlResponse, PipefyError> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
            latencies: Vec::new(),
        }
    }

    /// Delay every call to `operation` by `latency` before answering.
    pub fn with_latency(mut self, operation: &'static str, latency: Duration) -> Self {
        self.latencies.push((operation, latency));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }
}

#[async_trait]
impl GraphqlTransport for ScriptedTransport {
    async fn execute(
        &self,
        operation: &Operation,
        variables: Value,
        token: &str,
    ) -> Result<GraphqlResponse, PipefyError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                operation: operation.name,
                variables: variables.clone(),
                token: token.to_string(),
            });
        }
        let delay = self
            .latencies
            .iter()
            .find(|(name, _)| *name == operation.name)
            .map(|(_, latency)| *latency);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(operation.name, &variables)
    }
}

/// A successful response carrying `value` as `data`.
pub fn data(value: Value) -> Result<GraphqlResponse, PipefyError> {
    Ok(GraphqlResponse::from_data(value))
}

/// A 2xx response whose `errors` array holds `messages`.
pub fn graphql_errors(messages: &[&str]) -> Result<GraphqlResponse, PipefyError> {
    Ok(GraphqlResponse {
        data: None,
        errors: messages
            .iter()
            .map(|m| GraphqlError {
                message: m.to_string(),
            })
            .collect(),
    })
}

/// A non-2xx transport failure.
pub fn http_status(status: u16) -> Result<GraphqlResponse, PipefyError> {
    Err(PipefyError::Api {
        status,
        body: "scripted failure".into(),
    })
}

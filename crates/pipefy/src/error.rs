/// Errors from talking to the Pipefy GraphQL API.
#[derive(Debug, thiserror::Error)]
pub enum PipefyError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request to Pipefy failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Pipefy returned a non-2xx status code.
    #[error("Pipefy API error: {status} - {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response carrying a top-level `errors` array.
    #[error("Pipefy API error: {}", .messages.join("; "))]
    Graphql { messages: Vec<String> },

    /// The body did not have the shape the operation expects.
    #[error("Unexpected response structure from Pipefy API: {0}")]
    UnexpectedResponse(String),

    /// The requested pipe or phase came back as `null`.
    #[error("{0} not found or access denied")]
    NotFound(&'static str),

    /// A user-supplied identifier could not be used.
    #[error("{0}")]
    InvalidInput(String),

    /// A catalog listing failed; names the listing.
    #[error("Error fetching {listing}: {source}")]
    Catalog {
        listing: &'static str,
        source: Box<PipefyError>,
    },
}

impl PipefyError {
    /// Wrap `self` with the name of the catalog listing that failed.
    pub fn fetching(self, listing: &'static str) -> Self {
        PipefyError::Catalog {
            listing,
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping catalog context.
    pub fn root_cause(&self) -> &PipefyError {
        match self {
            PipefyError::Catalog { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the failure happened below GraphQL (network or HTTP status).
    pub fn is_transport(&self) -> bool {
        matches!(
            self.root_cause(),
            PipefyError::Request(_) | PipefyError::Api { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn catalog_context_is_prefixed() {
        let err = PipefyError::Graphql {
            messages: vec!["Permission denied".into(), "Try again".into()],
        }
        .fetching("pipe phases");

        assert_eq!(
            err.to_string(),
            "Error fetching pipe phases: Pipefy API error: Permission denied; Try again"
        );
        assert_matches!(err.root_cause(), PipefyError::Graphql { .. });
        assert!(!err.is_transport());
    }

    #[test]
    fn api_status_is_transport() {
        let err = PipefyError::Api {
            status: 503,
            body: "unavailable".into(),
        }
        .fetching("phase fields");
        assert!(err.is_transport());
        assert_eq!(
            err.to_string(),
            "Error fetching phase fields: Pipefy API error: 503 - unavailable"
        );
    }
}

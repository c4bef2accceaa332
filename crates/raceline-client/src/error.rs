//! Error kinds that cross from the client components into the UI layer.

/// Push-channel failure. Recovered locally by reconnecting.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("channel closed by peer")]
    Closed,
    #[error("frame could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("a connection attempt is already outstanding")]
    AttemptInFlight,
}

/// Failure of a request/response call made by a display surface.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
    #[error("{operation} failed: {source}")]
    Http {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("{operation} could not be encoded: {source}")]
    Encode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{operation} returned an unreadable body: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    pub(crate) fn from_reqwest(operation: &'static str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ClientError::Timeout { operation }
        } else {
            ClientError::Http { operation, source }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// The call went through but the answer was not what was expected.
    pub fn is_undecodable(&self) -> bool {
        matches!(self, ClientError::Decode { .. })
    }

    /// What the operator should check next.
    pub fn remedy(&self) -> &'static str {
        match self {
            ClientError::Timeout { .. } => "check upstream engine connectivity",
            ClientError::Http { .. } => "check that the display server is reachable",
            ClientError::Status { .. } | ClientError::Encode { .. } | ClientError::Decode { .. } => {
                "see the server logs for details"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_remedy_differs_from_generic() {
        let timeout = ClientError::Timeout {
            operation: "start race",
        };
        let status = ClientError::Status {
            operation: "start race",
            status: 500,
            body: String::new(),
        };
        assert!(timeout.is_timeout());
        assert!(!status.is_timeout());
        assert_ne!(timeout.remedy(), status.remedy());
        assert_eq!(timeout.to_string(), "start race timed out");
    }
}

use super::gateway::GatewayError;
use super::template::TemplateError;

/// Longest response excerpt carried inside an error.
const FRAGMENT_LIMIT: usize = 200;

/// Coarse classification of every failure raised by the declaration phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied incomplete or unusable input.
    InputValidation,
    /// The service explicitly refused the credentials.
    Authentication,
    /// Connection failures, timeouts and non-success service statuses.
    Network,
    /// The service answered with something other than the expected shape.
    Protocol,
    /// The declaration could not be transcoded or compressed.
    Encoding,
    /// Definitive negative compliance verdict.
    NonConformity,
    /// Retry budget exhausted without a verdict.
    Timeout,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Network)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InputValidation => "input_validation",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Network => "network",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Encoding => "encoding",
            ErrorKind::NonConformity => "non_conformity",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DpaeError {
    #[error("organization identifier and password are required before authentication")]
    MissingCredentials,
    #[error("no session token: authenticate before sending the declaration")]
    MissingToken,
    #[error("no flow identifier: send the declaration before polling")]
    MissingFlowId,
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("character {character:?} at position {position} cannot be encoded as ISO-8859-1")]
    Unencodable { character: char, position: usize },
    #[error("unable to compress declaration: {0}")]
    Compression(#[source] std::io::Error),
    #[error("authentication rejected by {endpoint}: incorrect credentials")]
    AuthenticationRejected { endpoint: String },
    #[error("service error from {endpoint}: status {status}")]
    Service { endpoint: String, status: u16 },
    #[error("network error on {endpoint}: {source}")]
    Network {
        endpoint: String,
        #[source]
        source: GatewayError,
    },
    #[error("token returned by {endpoint} is too short ({length} characters)")]
    MalformedToken { endpoint: String, length: usize },
    #[error("unexpected response from {endpoint}: {detail} [{fragment}]")]
    MalformedResponse {
        endpoint: String,
        detail: String,
        fragment: String,
    },
    #[error("flow identifier `{flow_id}` should be exactly 23 characters, got {length}")]
    FlowIdLength { flow_id: String, length: usize },
    #[error("declaration {flow_id} rejected: {message}")]
    NonConformity { flow_id: String, message: String },
    #[error("no answer for flow {flow_id} after {attempts} attempts")]
    Timeout { flow_id: String, attempts: u32 },
}

impl DpaeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DpaeError::MissingCredentials
            | DpaeError::MissingToken
            | DpaeError::MissingFlowId
            | DpaeError::Template(_) => ErrorKind::InputValidation,
            DpaeError::Unencodable { .. } | DpaeError::Compression(_) => ErrorKind::Encoding,
            DpaeError::AuthenticationRejected { .. } => ErrorKind::Authentication,
            DpaeError::Service { .. } | DpaeError::Network { .. } => ErrorKind::Network,
            DpaeError::MalformedToken { .. }
            | DpaeError::MalformedResponse { .. }
            | DpaeError::FlowIdLength { .. } => ErrorKind::Protocol,
            DpaeError::NonConformity { .. } => ErrorKind::NonConformity,
            DpaeError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub(crate) fn malformed(endpoint: &str, detail: impl Into<String>, body: &str) -> Self {
        DpaeError::MalformedResponse {
            endpoint: endpoint.to_string(),
            detail: detail.into(),
            fragment: fragment(body),
        }
    }
}

/// First [`FRAGMENT_LIMIT`] characters of a response body, whitespace-collapsed.
pub(crate) fn fragment(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut excerpt: String = collapsed.chars().take(FRAGMENT_LIMIT).collect();
    if collapsed.chars().count() > FRAGMENT_LIMIT {
        excerpt.push('…');
    }
    excerpt
}

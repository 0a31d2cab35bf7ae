use reqwest::StatusCode;

/// Failure taxonomy for the ingestion pipeline. Every external seam
/// (content provider, embedding service, graph store) reports through this
/// type; commands bubble it up via `anyhow`.
#[derive(Debug)]
pub enum PipelineError {
    /// Caller supplied an unusable request, e.g. neither query nor tag.
    InvalidRequest(String),
    /// A required credential env var is unset.
    MissingCredentials(&'static str),
    Http {
        service: &'static str,
        source: reqwest::Error,
    },
    Timeout {
        service: &'static str,
    },
    Api {
        service: &'static str,
        status: StatusCode,
        message: String,
    },
    Decode {
        service: &'static str,
        message: String,
    },
    /// Graph store unreachable or transport-level failure.
    Store(neo4rs::Error),
    /// Store-side constraint or schema violation on upsert.
    WriteRejected(String),
}

/// Coarse tag used by callers that only care which side failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    UpstreamUnavailable,
    WriteRejected,
}

impl PipelineError {
    pub fn http(service: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PipelineError::Timeout { service }
        } else {
            PipelineError::Http {
                service,
                source: err,
            }
        }
    }

    pub fn decode(service: &'static str, message: impl Into<String>) -> Self {
        PipelineError::Decode {
            service,
            message: message.into(),
        }
    }

    /// The bolt driver folds server-side failures into one error type;
    /// schema and constraint codes are only visible in the rendered message.
    pub fn from_store(err: neo4rs::Error) -> Self {
        let text = err.to_string();
        if text.contains("ConstraintValidation") || text.contains("Schema") {
            PipelineError::WriteRejected(text)
        } else {
            PipelineError::Store(err)
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::InvalidRequest(_) | PipelineError::MissingCredentials(_) => {
                ErrorKind::InvalidRequest
            }
            PipelineError::WriteRejected(_) => ErrorKind::WriteRejected,
            PipelineError::Http { .. }
            | PipelineError::Timeout { .. }
            | PipelineError::Api { .. }
            | PipelineError::Decode { .. }
            | PipelineError::Store(_) => ErrorKind::UpstreamUnavailable,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.kind() == ErrorKind::InvalidRequest
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
            PipelineError::MissingCredentials(var) => write!(f, "{var} is not set"),
            PipelineError::Http { service, source } => {
                write!(f, "{service}: http error: {source}")
            }
            PipelineError::Timeout { service } => write!(f, "{service}: request timed out"),
            PipelineError::Api {
                service,
                status,
                message,
            } => write!(f, "{service}: api error {status}: {message}"),
            PipelineError::Decode { service, message } => {
                write!(f, "{service}: decode error: {message}")
            }
            PipelineError::Store(err) => write!(f, "graph store error: {err}"),
            PipelineError::WriteRejected(msg) => write!(f, "write rejected by store: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Http { source, .. } => Some(source),
            PipelineError::Store(err) => Some(err),
            _ => None,
        }
    }
}

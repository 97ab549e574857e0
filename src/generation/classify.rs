//! Classification of client failures into user-facing error categories

use thiserror::Error;

use crate::generation::client::ClientFailure;

/// Marker a browser-style transport error carries when no response was received
const FETCH_FAILURE_MARKER: &str = "Failed to fetch";

/// The operation a failure came from. Only the wording of some messages differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pathway {
    Generation,
    Enhancement,
}

impl Pathway {
    fn network_message(&self) -> &'static str {
        match self {
            Pathway::Generation => {
                "Network error: could not connect to the API. This may be caused by a \
                 connectivity problem, a cross-origin (CORS) policy on the server, or the API \
                 endpoint being offline. Please check your connection and try again."
            }
            Pathway::Enhancement => {
                "Network error: could not connect to the enhancement API. This may be caused \
                 by a connectivity problem, a cross-origin (CORS) policy on the server, or the \
                 endpoint being offline. Please check your connection."
            }
        }
    }

    fn fallback_message(&self) -> &'static str {
        match self {
            Pathway::Generation => "An unknown error occurred.",
            Pathway::Enhancement => "Could not enhance the prompt.",
        }
    }
}

const OVERLOADED_MESSAGE: &str = "The server is overloaded. Please try again in a few minutes.";

/// A failure as presented to the user. Every variant carries its display message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// Rejected before any network call
    #[error("{0}")]
    Invalid(String),

    #[error("{0}")]
    NetworkUnreachable(String),

    #[error("{0}")]
    ServerOverloaded(String),

    /// A credential is missing or was refused
    #[error("{0}")]
    NotConfigured(String),

    #[error("{0}")]
    Unknown(String),
}

/// Category of a [`GenerationError`] without its message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Invalid,
    NetworkUnreachable,
    ServerOverloaded,
    NotConfigured,
    Unknown,
}

impl GenerationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GenerationError::Invalid(_) => ErrorKind::Invalid,
            GenerationError::NetworkUnreachable(_) => ErrorKind::NetworkUnreachable,
            GenerationError::ServerOverloaded(_) => ErrorKind::ServerOverloaded,
            GenerationError::NotConfigured(_) => ErrorKind::NotConfigured,
            GenerationError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// The user-facing message
    pub fn message(&self) -> &str {
        match self {
            GenerationError::Invalid(m)
            | GenerationError::NetworkUnreachable(m)
            | GenerationError::ServerOverloaded(m)
            | GenerationError::NotConfigured(m)
            | GenerationError::Unknown(m) => m,
        }
    }

    /// Whether re-running the same action can succeed without the user changing anything
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            GenerationError::Invalid(_) | GenerationError::NotConfigured(_)
        )
    }
}

/// Map a client failure into exactly one user-facing category
pub fn classify(failure: &ClientFailure, pathway: Pathway) -> GenerationError {
    match failure {
        ClientFailure::Transport { .. } => {
            GenerationError::NetworkUnreachable(pathway.network_message().to_string())
        }
        ClientFailure::Status { status, .. } if (500..600).contains(status) => {
            GenerationError::ServerOverloaded(OVERLOADED_MESSAGE.to_string())
        }
        ClientFailure::NotConfigured(message) => GenerationError::NotConfigured(message.clone()),
        other => {
            let message = other.message();
            if message.contains(FETCH_FAILURE_MARKER) {
                GenerationError::NetworkUnreachable(pathway.network_message().to_string())
            } else if mentions_server_status(message) {
                GenerationError::ServerOverloaded(OVERLOADED_MESSAGE.to_string())
            } else if message.trim().is_empty() {
                GenerationError::Unknown(pathway.fallback_message().to_string())
            } else {
                GenerationError::Unknown(message.to_string())
            }
        }
    }
}

/// True when the text contains `status 5xx`
fn mentions_server_status(message: &str) -> bool {
    message.match_indices("status 5").any(|(index, marker)| {
        let digits = &message.as_bytes()[index + marker.len()..];
        digits.len() >= 2 && digits[0].is_ascii_digit() && digits[1].is_ascii_digit()
    })
}

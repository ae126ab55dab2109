//! Error types exposed by the GitHub GraphQL client.

use thiserror::Error;

/// Errors surfaced while authenticating against or querying the GitHub
/// GraphQL API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GithubError {
    /// The authentication token was missing or blank.
    #[error("personal access token is required")]
    MissingToken,

    /// The GraphQL endpoint URL could not be parsed.
    #[error("GraphQL endpoint URL is invalid: {0}")]
    InvalidEndpoint(String),

    /// Building the underlying HTTP client failed.
    #[error("failed to build HTTP client: {message}")]
    ClientBuild {
        /// Error detail from reqwest.
        message: String,
    },

    /// A connect or read timeout persisted through every retry attempt.
    #[error("network timeout talking to GitHub after {attempts} attempts: {message}")]
    TimeoutRetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Transport-level error detail.
        message: String,
    },

    /// GitHub kept returning a 5xx status through every retry attempt.
    #[error("server error {status} from GitHub: max retries exceeded")]
    ServerRetriesExhausted {
        /// HTTP status code from the final attempt.
        status: u16,
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// A transport-level failure that is neither a timeout nor a 5xx
    /// persisted through every retry attempt.
    #[error("unexpected transport error after {attempts} attempts: {message}")]
    TransportRetriesExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Transport-level error detail.
        message: String,
    },

    /// GitHub returned an `errors` array that is neither a primary nor a
    /// secondary rate-limit signal.
    #[error("GitHub API request failed: {payload}")]
    GraphQl {
        /// The raw `errors` payload, serialised for diagnostics.
        payload: String,
    },

    /// The response parsed but carried neither the expected data envelope
    /// nor an `errors` array.
    #[error("GitHub response is missing the {envelope} envelope")]
    MissingEnvelope {
        /// Dotted path of the missing data envelope.
        envelope: &'static str,
    },

    /// A node in an otherwise well-formed page failed to deserialise.
    #[error("failed to deserialise GitHub response node: {message}")]
    MalformedNode {
        /// Error detail from serde.
        message: String,
    },
}

//! Client error types

use shared::ProtocolError;
use thiserror::Error;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connect failed
    #[error("Connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// Framing or socket error mid-exchange
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Server closed without a response; the request was refused
    #[error("Server closed the connection without issuing a certificate")]
    Rejected,

    /// Building the CSR failed
    #[error("Request generation failed: {0}")]
    Request(#[from] rcgen::Error),

    /// The returned certificates did not check out
    #[error("Certificate error: {0}")]
    Certificate(#[from] pki_cert::CertError),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

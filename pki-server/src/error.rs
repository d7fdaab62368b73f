//! Error taxonomy
//!
//! - [`ConfigError`] and [`StoreError`] stop the server before it listens.
//! - [`ServerError::Bind`] and [`ServerError::Accept`] stop the listener.
//! - [`ConnectionError`] ends one connection and nothing else.

use std::io;
use std::path::PathBuf;

use pki_cert::CertError;
use shared::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} not found")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("no value for '{0}'")]
    Missing(&'static str),

    #[error("invalid value for '{field}': {value:?}")]
    Invalid { field: &'static str, value: String },

    #[error("cannot determine work directory: {0}")]
    WorkDir(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create certificate directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("{0} not found")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("invalid key material in {path}: {source}")]
    Invalid { path: PathBuf, source: CertError },

    #[error("failed to generate root identity: {0}")]
    Generate(CertError),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("failed to accept connection: {0}")]
    Accept(io::Error),
}

/// Why a single connection ended without a certificate
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("request rejected: {0}")]
    Rejected(#[from] CertError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ConnectionError {
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ConnectionError::Protocol(e) if e.is_disconnect())
    }
}

//! Client side of the Crab PKI signing protocol

mod client;
mod error;
mod request;

pub use client::{ClientCredential, SignedResponse, exchange, request_certificate};
pub use error::{ClientError, ClientResult};
pub use request::CertificateRequest;

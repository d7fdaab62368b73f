use thiserror::Error;

#[derive(Error, Debug)]
pub enum CertError {
    #[error("RCGen error: {0}")]
    Rcgen(#[from] rcgen::Error),
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Private key does not match the certificate public key")]
    KeyMismatch,
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    // ── CSR handling ──
    #[error("Malformed certificate signing request: {0}")]
    InvalidCsr(String),
    #[error("CSR self-signature does not verify")]
    CsrSignature,

    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

pub type Result<T> = std::result::Result<T, CertError>;

use crate::error::{CertError, Result};
use rustls::pki_types::{CertificateDer, UnixTime};
use std::sync::Arc;

/// PEM-armour a DER blob with LF line endings.
pub fn der_to_pem(tag: &str, der: &[u8]) -> String {
    let block = pem::Pem::new(tag, der.to_vec());
    pem::encode_config(
        &block,
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}

/// Verify a client certificate (DER) against a single root (DER).
///
/// Runs the same path validation a rustls server would apply to a client
/// presenting this certificate.
pub fn verify_client_cert(cert_der: &[u8], ca_der: &[u8]) -> Result<()> {
    let mut root_store = rustls::RootCertStore::empty();
    root_store
        .add(CertificateDer::from(ca_der.to_vec()))
        .map_err(|e| CertError::VerificationFailed(e.to_string()))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier =
        rustls::server::WebPkiClientVerifier::builder_with_provider(Arc::new(root_store), provider)
            .build()
            .map_err(|e| CertError::VerificationFailed(e.to_string()))?;

    let leaf = CertificateDer::from(cert_der.to_vec());
    verifier
        .verify_client_cert(&leaf, &[], UnixTime::now())
        .map_err(|e| CertError::VerificationFailed(e.to_string()))?;

    Ok(())
}

use crate::error::{CertError, Result};
use sha2::{Digest, Sha256};
use x509_parser::x509::X509Name;

#[derive(Debug, Clone)]
pub struct CertMetadata {
    pub subject: String,
    pub common_name: Option<String>,
    pub issuer_common_name: Option<String>,
    pub serial_number: String,
    pub fingerprint_sha256: String,
    pub is_ca: bool,
    pub not_before: time::OffsetDateTime,
    pub not_after: time::OffsetDateTime,
}

impl CertMetadata {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let fingerprint_sha256 = hex::encode(Sha256::digest(der));

        let (_, x509) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| CertError::InvalidCertificate(format!("X509 parse error: {}", e)))?;

        let validity = x509.validity();

        Ok(Self {
            subject: x509.subject().to_string(),
            common_name: first_common_name(x509.subject()),
            issuer_common_name: first_common_name(x509.issuer()),
            serial_number: x509.tbs_certificate.serial.to_str_radix(16),
            fingerprint_sha256,
            is_ca: x509.is_ca(),
            not_before: validity.not_before.to_datetime(),
            not_after: validity.not_after.to_datetime(),
        })
    }
}

fn first_common_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|cn| cn.to_string())
}

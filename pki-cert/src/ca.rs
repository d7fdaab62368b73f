use crate::csr::{self, IssuedCertificate};
use crate::error::{CertError, Result};
use crate::profile::{self, CaProfile, KeyType, LeafProfile};
use rand::thread_rng;
use rcgen::{CertificateParams, Issuer, KeyPair};
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey;
use rustls_pki_types::CertificateDer;
use x509_parser::pem::parse_x509_pem;

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";

/// A root identity: self-signed CA certificate plus its private key.
///
/// Immutable once constructed. The signing server shares one instance
/// across all connection handlers behind an `Arc`.
pub struct CertificateAuthority {
    issuer: Issuer<'static, KeyPair>,
    cert_der: CertificateDer<'static>,
    cert_pem: String,
    key_type: KeyType,
}

impl CertificateAuthority {
    /// Generate a fresh key pair and a self-signed root certificate.
    pub fn new_root(profile: CaProfile) -> Result<Self> {
        let params = profile::create_ca_params(&profile);
        let key_pair = generate_key_pair(profile.key_type)?;
        let cert = params.self_signed(&key_pair)?;

        tracing::debug!(
            common_name = %profile.common_name,
            key_type = %profile.key_type,
            "Generated self-signed root certificate"
        );

        Self::assemble(cert.der().clone(), key_pair, profile.key_type)
    }

    /// Load a root identity from its PEM certificate and PKCS#8 PEM key.
    ///
    /// The key algorithm is taken from the certificate's public key, and the
    /// key must be the private half of that public key.
    pub fn load(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let (_, pem) = parse_x509_pem(cert_pem.as_bytes())
            .map_err(|e| CertError::InvalidCertificate(format!("PEM parse error: {}", e)))?;
        if pem.label != "CERTIFICATE" {
            return Err(CertError::InvalidCertificate(format!(
                "expected CERTIFICATE block, found '{}'",
                pem.label
            )));
        }

        let (key_type, cert_public_key) = {
            let (_, x509) = x509_parser::parse_x509_certificate(&pem.contents)
                .map_err(|e| CertError::InvalidCertificate(format!("X509 parse error: {}", e)))?;
            if !x509.is_ca() {
                return Err(CertError::InvalidCertificate(
                    "certificate is not a CA".into(),
                ));
            }
            let spki = x509.public_key();
            let key_type = key_type_of(&spki.algorithm.algorithm.to_id_string())?;
            (key_type, spki.subject_public_key.data.to_vec())
        };

        let key_block = ::pem::parse(key_pem)
            .map_err(|e| CertError::InvalidKey(format!("PEM parse error: {}", e)))?;
        if key_block.tag() != "PRIVATE KEY" {
            return Err(CertError::InvalidKey(format!(
                "expected PKCS#8 'PRIVATE KEY' block, found '{}'",
                key_block.tag()
            )));
        }
        let key_pair = KeyPair::from_pem_and_sign_algo(key_pem, key_type.signature_algorithm())
            .map_err(|e| CertError::InvalidKey(format!("{} key: {}", key_type, e)))?;

        if key_pair.public_key_raw() != cert_public_key.as_slice() {
            return Err(CertError::KeyMismatch);
        }

        Self::assemble(CertificateDer::from(pem.contents), key_pair, key_type)
    }

    fn assemble(
        cert_der: CertificateDer<'static>,
        key_pair: KeyPair,
        key_type: KeyType,
    ) -> Result<Self> {
        // Issuer name comes from the DER so every leaf names the root subject
        // byte for byte, generated or loaded.
        let issuer = Issuer::from_ca_cert_der(&cert_der, key_pair)?;
        let cert_pem = crate::adapter::der_to_pem("CERTIFICATE", cert_der.as_ref());

        Ok(Self {
            issuer,
            cert_der,
            cert_pem,
            key_type,
        })
    }

    /// Verify a DER CSR and issue a leaf certificate for it.
    ///
    /// The subject and public key are taken from the request as-is; every
    /// other field comes from `profile`. Extensions the request asks for are
    /// ignored.
    pub fn sign_request(&self, csr_der: &[u8], profile: &LeafProfile) -> Result<IssuedCertificate> {
        let request = csr::parse_request(csr_der)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = request.subject;
        profile::apply_leaf_profile(&mut params, profile);

        let cert = params.signed_by(&request.public_key, &self.issuer)?;

        Ok(IssuedCertificate {
            der: cert.der().to_vec(),
            subject: request.info.subject,
            common_name: request.info.common_name,
        })
    }

    /// Get the CA certificate PEM
    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    /// Get the CA certificate DER, as sent on the wire
    pub fn cert_der(&self) -> &[u8] {
        self.cert_der.as_ref()
    }

    /// Get the CA private key PEM (PKCS#8)
    pub fn key_pem(&self) -> String {
        self.issuer.key().serialize_pem()
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }
}

fn key_type_of(oid: &str) -> Result<KeyType> {
    match oid {
        OID_EC_PUBLIC_KEY => Ok(KeyType::P256),
        OID_RSA_ENCRYPTION => Ok(KeyType::Rsa2048),
        other => Err(CertError::UnsupportedAlgorithm(other.to_string())),
    }
}

pub(crate) fn generate_key_pair(key_type: KeyType) -> Result<KeyPair> {
    match key_type {
        KeyType::P256 => KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)
            .map_err(|e| CertError::KeyGeneration(e.to_string())),
        KeyType::Rsa2048 => {
            let mut rng = thread_rng();
            let private_key = RsaPrivateKey::new(&mut rng, 2048)
                .map_err(|e| CertError::KeyGeneration(format!("RSA gen error: {}", e)))?;
            let pem = private_key
                .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
                .map_err(|e| CertError::KeyGeneration(format!("RSA PEM error: {}", e)))?;
            KeyPair::from_pem_and_sign_algo(&pem, &rcgen::PKCS_RSA_SHA256)
                .map_err(|e| CertError::KeyGeneration(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_rejects_foreign_key() {
        let ca = CertificateAuthority::new_root(CaProfile::default()).unwrap();
        let other = CertificateAuthority::new_root(CaProfile::default()).unwrap();

        let err = CertificateAuthority::load(ca.cert_pem(), &other.key_pem())
            .err()
            .expect("mismatched key must be rejected");
        assert!(matches!(err, CertError::KeyMismatch));
    }

    #[test]
    fn test_load_rejects_legacy_key_block() {
        let ca = CertificateAuthority::new_root(CaProfile::default()).unwrap();
        let sec1 = ::pem::encode(&::pem::Pem::new("EC PRIVATE KEY", vec![1, 2, 3]));

        let err = CertificateAuthority::load(ca.cert_pem(), &sec1)
            .err()
            .expect("non PKCS#8 key must be rejected");
        assert!(matches!(err, CertError::InvalidKey(_)));
    }

    #[test]
    fn test_load_round_trip() {
        let ca = CertificateAuthority::new_root(CaProfile::root("round-trip")).unwrap();
        let loaded = CertificateAuthority::load(ca.cert_pem(), &ca.key_pem()).unwrap();

        assert_eq!(ca.cert_der(), loaded.cert_der());
        assert_eq!(loaded.key_type(), KeyType::P256);
    }
}

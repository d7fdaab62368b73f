use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

use crate::error::ClientResult;

/// A locally generated key pair and the CSR that proves possession of it.
///
/// The private key never leaves this struct except through [`key_pem`].
///
/// [`key_pem`]: CertificateRequest::key_pem
pub struct CertificateRequest {
    key_pair: KeyPair,
    csr_der: Vec<u8>,
    common_name: String,
}

impl CertificateRequest {
    /// Generate a P-256 key pair and a CSR with subject `CN=<common_name>`
    pub fn generate(common_name: &str) -> ClientResult<Self> {
        let key_pair = KeyPair::generate()?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;

        let csr = params.serialize_request(&key_pair)?;

        Ok(Self {
            csr_der: csr.der().to_vec(),
            key_pair,
            common_name: common_name.to_string(),
        })
    }

    pub fn csr_der(&self) -> &[u8] {
        &self.csr_der
    }

    pub fn common_name(&self) -> &str {
        &self.common_name
    }

    pub fn key_pem(&self) -> String {
        self.key_pair.serialize_pem()
    }
}

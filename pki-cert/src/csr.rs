use crate::error::{CertError, Result};
use rcgen::string::{BmpString, Ia5String, PrintableString, TeletexString, UniversalString};
use rcgen::{DistinguishedName, DnType, DnValue, SubjectPublicKeyInfo};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::der_parser::asn1_rs::Tag;
use x509_parser::prelude::FromDer;
use x509_parser::x509::X509Name;

/// What the server learns from a request before signing it.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// RFC 4514 rendering of the requested subject
    pub subject: String,
    pub common_name: Option<String>,
}

/// A signed leaf, ready to go on the wire.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    pub der: Vec<u8>,
    pub subject: String,
    pub common_name: Option<String>,
}

/// A request whose self-signature checked out, reduced to what goes into the leaf.
///
/// Requested extensions are dropped here: the leaf profile decides them.
pub(crate) struct VerifiedRequest {
    pub info: RequestInfo,
    pub subject: DistinguishedName,
    pub public_key: SubjectPublicKeyInfo,
}

/// Parse a DER PKCS#10 request and check its self-signature.
///
/// The signature check is the only gate: the subject is not matched against
/// any policy.
pub fn verify_request(der: &[u8]) -> Result<RequestInfo> {
    parse_request(der).map(|request| request.info)
}

pub(crate) fn parse_request(der: &[u8]) -> Result<VerifiedRequest> {
    let (rem, csr) = X509CertificationRequest::from_der(der)
        .map_err(|e| CertError::InvalidCsr(e.to_string()))?;
    if !rem.is_empty() {
        return Err(CertError::InvalidCsr(format!(
            "{} trailing bytes after request",
            rem.len()
        )));
    }

    csr.verify_signature().map_err(|_| CertError::CsrSignature)?;

    let request_info = &csr.certification_request_info;
    let subject = &request_info.subject;
    let common_name = subject
        .iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .map(|cn| cn.to_string());

    let public_key = SubjectPublicKeyInfo::from_der(request_info.subject_pki.raw)
        .map_err(|e| CertError::UnsupportedAlgorithm(e.to_string()))?;

    Ok(VerifiedRequest {
        info: RequestInfo {
            subject: subject.to_string(),
            common_name,
        },
        subject: distinguished_name(subject)?,
        public_key,
    })
}

/// Copy a parsed subject into rcgen form, keeping each value's string type.
///
/// Multi-valued RDNs are flattened into single attributes.
fn distinguished_name(name: &X509Name<'_>) -> Result<DistinguishedName> {
    let invalid = |what: &str| CertError::InvalidCsr(format!("subject {}", what));

    let mut dn = DistinguishedName::new();
    for attr in name.iter_attributes() {
        let oid: Vec<u64> = attr
            .attr_type()
            .iter()
            .ok_or_else(|| invalid("attribute type is not a valid OID"))?
            .collect();

        let data = attr.attr_value().data;
        let text = || std::str::from_utf8(data).map_err(|_| invalid("value is not UTF-8"));
        let value = match attr.attr_value().header.tag() {
            Tag::Utf8String => DnValue::Utf8String(text()?.to_string()),
            Tag::PrintableString => DnValue::PrintableString(
                PrintableString::try_from(text()?).map_err(|_| invalid("PrintableString"))?,
            ),
            Tag::Ia5String => DnValue::Ia5String(
                Ia5String::try_from(text()?).map_err(|_| invalid("IA5String"))?,
            ),
            Tag::T61String => DnValue::TeletexString(
                TeletexString::try_from(text()?).map_err(|_| invalid("TeletexString"))?,
            ),
            Tag::BmpString => DnValue::BmpString(
                BmpString::from_utf16be(data.to_vec()).map_err(|_| invalid("BMPString"))?,
            ),
            Tag::UniversalString => DnValue::UniversalString(
                UniversalString::from_utf32be(data.to_vec())
                    .map_err(|_| invalid("UniversalString"))?,
            ),
            other => return Err(invalid(&format!("value has unsupported tag {:?}", other))),
        };

        dn.push(DnType::from_oid(&oid), value);
    }
    Ok(dn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    fn request_der(common_name: &str) -> Vec<u8> {
        let key_pair = KeyPair::generate().unwrap();
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;
        params.serialize_request(&key_pair).unwrap().der().to_vec()
    }

    #[test]
    fn test_verify_request_reads_subject() {
        let info = verify_request(&request_der("client1")).unwrap();
        assert_eq!(info.common_name.as_deref(), Some("client1"));
        assert_eq!(info.subject, "CN=client1");
    }

    #[test]
    fn test_verify_request_rejects_flipped_signature() {
        let mut der = request_der("client1");
        let last = der.len() - 1;
        der[last] ^= 0xFF;
        let err = verify_request(&der).unwrap_err();
        assert!(matches!(err, CertError::CsrSignature | CertError::InvalidCsr(_)));
    }

    #[test]
    fn test_verify_request_rejects_garbage() {
        let err = verify_request(b"definitely not DER").unwrap_err();
        assert!(matches!(err, CertError::InvalidCsr(_)));
    }

    #[test]
    fn test_verify_request_rejects_trailing_bytes() {
        let mut der = request_der("client1");
        der.extend_from_slice(&[0, 0]);
        assert!(matches!(
            verify_request(&der).unwrap_err(),
            CertError::InvalidCsr(_)
        ));
    }
}

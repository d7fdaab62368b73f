use pki_cert::{CertMetadata, der_to_pem, verify_client_cert};
use shared::{ProtocolError, read_frame, write_frame};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::error::{ClientError, ClientResult};
use crate::request::CertificateRequest;

/// The two DER blobs a successful exchange returns
#[derive(Debug, Clone)]
pub struct SignedResponse {
    pub leaf_der: Vec<u8>,
    pub root_der: Vec<u8>,
}

/// Verified client credential, PEM encoded for storage
#[derive(Debug, Clone)]
pub struct ClientCredential {
    pub cert_pem: String,
    pub key_pem: String,
    pub ca_pem: String,
    pub metadata: CertMetadata,
}

/// Send one DER CSR and read back `[leaf][root]`.
///
/// A connection closed before the first frame means the server refused
/// the request.
pub async fn exchange(addr: &str, csr_der: &[u8]) -> ClientResult<SignedResponse> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|source| ClientError::Connect {
            addr: addr.to_string(),
            source,
        })?;
    let (mut reader, writer) = stream.into_split();

    let mut writer = BufWriter::new(writer);
    write_frame(&mut writer, csr_der).await?;
    writer.flush().await.map_err(ProtocolError::Io)?;

    let leaf_der = match read_frame(&mut reader).await {
        Ok(frame) => frame,
        Err(e) if e.is_disconnect() => return Err(ClientError::Rejected),
        Err(e) => return Err(e.into()),
    };
    let root_der = read_frame(&mut reader).await?;

    tracing::debug!(
        leaf_bytes = leaf_der.len(),
        root_bytes = root_der.len(),
        "Received signed certificate"
    );

    Ok(SignedResponse { leaf_der, root_der })
}

/// Generate a key, have `addr` sign it, and check the leaf chains to the
/// root that came back with it.
///
/// The root is trusted on first use: nothing pins it in advance.
pub async fn request_certificate(addr: &str, common_name: &str) -> ClientResult<ClientCredential> {
    let request = CertificateRequest::generate(common_name)?;
    let response = exchange(addr, request.csr_der()).await?;

    verify_client_cert(&response.leaf_der, &response.root_der)?;
    let metadata = CertMetadata::from_der(&response.leaf_der)?;

    tracing::info!(
        subject = %metadata.subject,
        fingerprint = %metadata.fingerprint_sha256,
        "Client certificate issued"
    );

    Ok(ClientCredential {
        cert_pem: der_to_pem("CERTIFICATE", &response.leaf_der),
        key_pem: request.key_pem(),
        ca_pem: der_to_pem("CERTIFICATE", &response.root_der),
        metadata,
    })
}

//! Per-connection issuance protocol
//!
//! 1. read `[u16 LE len][CSR DER]`
//! 2. parse the CSR and verify its self-signature
//! 3. sign a leaf with the root key
//! 4. write `[len][leaf DER][len][root DER]`, flush
//!
//! Any failure drops the socket. Nothing is sent to say why.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pki_cert::{CertificateAuthority, IssuedCertificate, LeafProfile};
use shared::{read_frame_timeout, write_frame};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::error::ConnectionError;

/// Read-only state every handler closes over
pub(crate) struct HandlerContext {
    pub authority: Arc<CertificateAuthority>,
    pub leaf_profile: LeafProfile,
    pub read_timeout: Option<Duration>,
}

pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    ctx: &HandlerContext,
) -> Result<IssuedCertificate, ConnectionError> {
    let (mut reader, writer) = stream.into_split();

    let csr = read_frame_timeout(&mut reader, ctx.read_timeout).await?;
    tracing::debug!(peer = %peer, bytes = csr.len(), "Received certificate request");

    let issued = ctx.authority.sign_request(&csr, &ctx.leaf_profile)?;

    let mut writer = BufWriter::new(writer);
    write_frame(&mut writer, &issued.der).await?;
    write_frame(&mut writer, ctx.authority.cert_der()).await?;
    writer.flush().await?;
    writer.shutdown().await?;

    Ok(issued)
}

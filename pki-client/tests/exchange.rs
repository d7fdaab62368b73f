use pki_cert::{CaProfile, CertificateAuthority, LeafProfile};
use pki_client::{CertificateRequest, ClientError, exchange, request_certificate};
use shared::{read_frame, write_frame};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

/// Accept one connection, read the request, and answer with `respond`
async fn one_shot<F>(respond: F) -> String
where
    F: FnOnce(Vec<u8>) -> Option<(Vec<u8>, Vec<u8>)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let csr = read_frame(&mut stream).await.unwrap();
        if let Some((leaf, root)) = respond(csr) {
            write_frame(&mut stream, &leaf).await.unwrap();
            write_frame(&mut stream, &root).await.unwrap();
            stream.flush().await.unwrap();
        }
    });

    addr
}

#[tokio::test]
async fn test_closed_connection_means_rejected() {
    let addr = one_shot(|_| None).await;
    let request = CertificateRequest::generate("refused").unwrap();

    let err = exchange(&addr, request.csr_der()).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected));
}

#[tokio::test]
async fn test_unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    drop(listener);

    let err = request_certificate(&addr, "nobody").await.unwrap_err();
    assert!(matches!(err, ClientError::Connect { .. }));
}

#[tokio::test]
async fn test_exchange_returns_both_frames() {
    let addr = one_shot(|csr| Some((csr, b"root".to_vec()))).await;
    let request = CertificateRequest::generate("echo").unwrap();

    let response = exchange(&addr, request.csr_der()).await.unwrap();
    assert_eq!(response.leaf_der, request.csr_der());
    assert_eq!(response.root_der, b"root");
}

#[tokio::test]
async fn test_leaf_from_another_root_is_refused() {
    let addr = one_shot(|csr| {
        let signer = CertificateAuthority::new_root(CaProfile::root("signer")).unwrap();
        let impostor = CertificateAuthority::new_root(CaProfile::root("impostor")).unwrap();
        let issued = signer.sign_request(&csr, &LeafProfile::default()).unwrap();
        Some((issued.der, impostor.cert_der().to_vec()))
    })
    .await;

    let err = request_certificate(&addr, "client1").await.unwrap_err();
    assert!(matches!(err, ClientError::Certificate(_)));
}

#[test]
fn test_request_carries_common_name() {
    let request = CertificateRequest::generate("client1").unwrap();
    assert_eq!(request.common_name(), "client1");

    let info = pki_cert::verify_request(request.csr_der()).unwrap();
    assert_eq!(info.common_name.as_deref(), Some("client1"));
    assert!(request.key_pem().contains("PRIVATE KEY"));
}

//! Signing server
//!
//! One accept loop, one spawned task per connection. Handlers share the
//! root identity through an `Arc` and never mutate it, so no lock exists.

mod handler;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use pki_cert::{CertificateAuthority, LeafProfile};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ServerError;
use handler::{HandlerContext, handle_connection};

#[derive(Debug, Clone, Default)]
pub struct ServerOptions {
    /// Deadline for reading the request frame. `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub leaf_profile: LeafProfile,
}

impl ServerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            leaf_profile: LeafProfile::default(),
        }
    }
}

pub struct SigningServer {
    listener: TcpListener,
    ctx: Arc<HandlerContext>,
}

impl SigningServer {
    pub async fn bind(
        addr: &str,
        authority: Arc<CertificateAuthority>,
        options: ServerOptions,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        let bound = listener.local_addr().map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        tracing::info!("Signing server listening on {}", bound);

        Ok(Self {
            listener,
            ctx: Arc::new(HandlerContext {
                authority,
                leaf_profile: options.leaf_profile,
                read_timeout: options.read_timeout,
            }),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept until `shutdown` fires or `accept` fails.
    ///
    /// Accept errors are not retried: the loop ends and the error is returned.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Signing server shutting down");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!("Client connected: {}", addr);
                            self.spawn_handler(stream, addr);
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                            return Err(ServerError::Accept(e));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn spawn_handler(&self, stream: TcpStream, addr: SocketAddr) {
        let ctx = self.ctx.clone();

        tokio::spawn(async move {
            match handle_connection(stream, addr, &ctx).await {
                Ok(issued) => {
                    tracing::info!(
                        peer = %addr,
                        subject = %issued.subject,
                        "Transmitted client certificate"
                    );
                }
                Err(e) if e.is_disconnect() => {
                    tracing::debug!(peer = %addr, "Client closed without a request");
                }
                Err(e) => {
                    tracing::warn!(peer = %addr, "Certificate request failed: {}", e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pki_cert::CaProfile;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_bind_logs_assigned_port() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let authority = Arc::new(CertificateAuthority::new_root(CaProfile::default()).unwrap());
        let server = SigningServer::bind("127.0.0.1:0", authority, ServerOptions::default())
            .await
            .unwrap();
        let port = server.local_addr().unwrap().port();
        assert_ne!(port, 0);

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(
            output.contains(&format!("listening on 127.0.0.1:{}", port)),
            "log was: {output}"
        );
    }
}

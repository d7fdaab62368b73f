//! On-disk root identity
//!
//! Layout inside the certificate directory:
//!
//! ```text
//! <name>-ca.crt   PEM certificate, 0600
//! <name>-ca.key   PEM PKCS#8 private key, 0600
//! ```
//!
//! The single-tenant variant drops the prefix (`ca.crt` / `ca.key`).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use pki_cert::{CaProfile, CertError, CertificateAuthority, KeyType};
use tracing::info;

use crate::error::StoreError;
use crate::files;

/// What [`CaStore::ensure_bootstrap`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone)]
pub struct CaStore {
    cert_dir: PathBuf,
    identity: Option<String>,
}

impl CaStore {
    /// Files named after the service identity
    pub fn for_service(cert_dir: impl Into<PathBuf>, service_name: &str) -> Self {
        Self {
            cert_dir: cert_dir.into(),
            identity: Some(service_name.to_string()),
        }
    }

    /// Fixed `ca.key` / `ca.crt`
    pub fn single_tenant(cert_dir: impl Into<PathBuf>) -> Self {
        Self {
            cert_dir: cert_dir.into(),
            identity: None,
        }
    }

    pub fn cert_dir(&self) -> &Path {
        &self.cert_dir
    }

    pub fn key_path(&self) -> PathBuf {
        self.cert_dir.join(self.file_name("key"))
    }

    pub fn cert_path(&self) -> PathBuf {
        self.cert_dir.join(self.file_name("crt"))
    }

    fn file_name(&self, ext: &str) -> String {
        match &self.identity {
            Some(name) => format!("{}-ca.{}", name, ext),
            None => format!("ca.{}", ext),
        }
    }

    /// Make sure a root identity exists, generating one on first call.
    ///
    /// The key file's presence is the marker: if it exists nothing is
    /// touched, even if the certificate is missing. Never regenerates.
    pub fn ensure_bootstrap(&self, key_type: KeyType) -> Result<BootstrapOutcome, StoreError> {
        if !self.cert_dir.exists() {
            files::create_private_dir(&self.cert_dir).map_err(|source| StoreError::CreateDir {
                path: self.cert_dir.clone(),
                source,
            })?;
            info!("Created certificate directory {}", self.cert_dir.display());
        }

        let key_path = self.key_path();
        if key_path.exists() {
            return Ok(BootstrapOutcome::AlreadyPresent);
        }

        let common_name = self.identity.as_deref().unwrap_or_default();
        let profile = CaProfile::root(common_name).with_key_type(key_type);
        let ca = CertificateAuthority::new_root(profile).map_err(StoreError::Generate)?;

        // Key last: its presence marks a complete bootstrap.
        let cert_path = self.cert_path();
        write_file(&cert_path, ca.cert_pem().as_bytes())?;
        info!("Root certificate saved at {}", cert_path.display());

        write_file(&key_path, ca.key_pem().as_bytes())?;
        info!(key_type = %key_type, "Private key saved at {}", key_path.display());

        Ok(BootstrapOutcome::Created)
    }

    /// Read and decode both files. Any failure is fatal to startup.
    pub fn load(&self) -> Result<CertificateAuthority, StoreError> {
        let cert_path = self.cert_path();
        let key_path = self.key_path();

        let cert_pem = read_file(&cert_path)?;
        let key_pem = read_file(&key_path)?;

        CertificateAuthority::load(&cert_pem, &key_pem).map_err(|source| {
            let path = match source {
                CertError::InvalidKey(_) | CertError::KeyMismatch => key_path,
                _ => cert_path,
            };
            StoreError::Invalid { path, source }
        })
    }
}

fn read_file(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => StoreError::Missing(path.to_path_buf()),
        _ => StoreError::Read {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    files::write_private(path, contents).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

//! Crab PKI signing service
//!
//! `bootstrap` prepares a work directory once: it settles `config.json`
//! and makes sure the root identity exists. `serve` loads that identity
//! and answers certificate requests until cancelled.

pub mod config;
pub mod error;
mod files;
pub mod logger;
pub mod server;
pub mod store;

use std::sync::Arc;

use pki_cert::KeyType;
use tokio_util::sync::CancellationToken;

pub use config::{Config, WorkDir};
pub use error::{ConfigError, ConnectionError, ServerError, StoreError};
pub use server::{ServerOptions, SigningServer};
pub use store::{BootstrapOutcome, CaStore};

/// Values given on the command line. Empty strings keep what is stored.
#[derive(Debug, Clone, Default)]
pub struct BootstrapArgs {
    pub listen: String,
    pub service_name: String,
    pub service_full_name: String,
    pub key_type: KeyType,
}

/// Merge `args` into `config.json`, persist it if anything changed, then
/// create the root identity unless the key file already exists.
pub fn bootstrap(work_dir: &WorkDir, args: &BootstrapArgs) -> Result<Config, ServerError> {
    let stored = match work_dir.load_config() {
        Ok(config) => Some(config),
        Err(ConfigError::NotFound(_)) => None,
        Err(e @ ConfigError::Parse { .. }) => {
            tracing::warn!("Ignoring unreadable config: {}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    let (config, changed) = Config::merge(
        stored.as_ref(),
        &args.listen,
        &args.service_name,
        &args.service_full_name,
    )?;

    if changed {
        let path = work_dir.config_path();
        config.save(&path)?;
        tracing::info!("Configuration saved at {}", path.display());
    }

    let store = CaStore::for_service(work_dir.cert_dir(), &config.service_name);
    match store.ensure_bootstrap(args.key_type)? {
        BootstrapOutcome::Created => {
            tracing::info!(service = %config.service_name, "Root identity created")
        }
        BootstrapOutcome::AlreadyPresent => {
            tracing::info!(service = %config.service_name, "Root identity already present")
        }
    }

    Ok(config)
}

/// Load the stored root identity and bind the signing server.
///
/// Every failure here happens before any connection is accepted.
pub async fn prepare_server(work_dir: &WorkDir, config: &Config) -> Result<SigningServer, ServerError> {
    config.validate()?;

    let store = CaStore::for_service(work_dir.cert_dir(), &config.service_name);
    let authority = store.load()?;
    tracing::info!(
        service = %config.service_full_name,
        key_type = %authority.key_type(),
        "Root identity loaded from {}",
        store.cert_path().display()
    );

    SigningServer::bind(
        &config.bind_address(),
        Arc::new(authority),
        ServerOptions::from_config(config),
    )
    .await
}

/// Serve until `shutdown` fires or the listener fails.
pub async fn serve(
    work_dir: &WorkDir,
    config: &Config,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    prepare_server(work_dir, config).await?.run(shutdown).await
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use pki_cert::KeyType;
use pki_server::{BootstrapArgs, WorkDir, bootstrap, logger, serve};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "pki-server", version, about = "Crab PKI signing service")]
struct Cli {
    /// Directory holding config.json and cert/ (defaults to the executable's directory)
    #[arg(long, env = "PKI_WORK_DIR", global = true)]
    work_dir: Option<String>,

    #[arg(long, env = "PKI_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Write daily rolling log files here instead of stdout
    #[arg(long, env = "PKI_LOG_DIR", global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save the configuration and create the root identity if it is missing
    Init {
        /// Listen address, e.g. localhost:5010 or :5010
        #[arg(long, default_value = "")]
        listen: String,
        /// Service name, also the key and certificate file prefix
        #[arg(long, default_value = "")]
        name: String,
        /// Human readable service name
        #[arg(long, default_value = "")]
        full_name: String,
        /// Root key algorithm: ecdsa-p256 or rsa-2048
        #[arg(long, default_value = "ecdsa-p256")]
        key_type: KeyType,
    },
    /// Load the root identity and answer certificate requests
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    logger::init_logger(Some(&cli.log_level), cli.log_dir.as_deref());

    let work_dir = match cli.work_dir {
        Some(dir) => WorkDir::new(dir),
        None => WorkDir::from_env().context("Failed to locate work directory")?,
    };
    tracing::debug!("Work directory: {}", work_dir.root().display());

    match cli.command {
        Command::Init {
            listen,
            name,
            full_name,
            key_type,
        } => {
            let args = BootstrapArgs {
                listen,
                service_name: name,
                service_full_name: full_name,
                key_type,
            };
            let config = bootstrap(&work_dir, &args).context("Bootstrap failed")?;
            tracing::info!(
                listen = %config.listen,
                service = %config.service_name,
                "Bootstrap complete"
            );
        }
        Command::Serve => {
            let config = work_dir
                .load_config()
                .context("Run 'pki-server init' first")?;

            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl+C, shutting down...");
                }
                signal.cancel();
            });

            serve(&work_dir, &config, shutdown)
                .await
                .context("Signing server stopped")?;
        }
    }

    Ok(())
}

//! Attestation service binary.
//!
//! Loads the TOML configuration, builds one verifier, and serves the HTTP
//! API until interrupted.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use agent_attestation::{AttestationConfig, AttestationVerifier};
use agent_attestation_server::{
    api::{ApiState, create_router},
    observability::{LogFormat, init_observability},
};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "agent-attestation-server")]
#[command(about = "Verifies RFC 9421 agent request signatures", long_about = None)]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "ATTESTATION_CONFIG", default_value = "attestation.toml")]
    config: PathBuf,

    /// Address to listen on.
    #[arg(long, env = "ATTESTATION_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_observability(LogFormat::from_env());

    let config = AttestationConfig::from_file(&args.config)?;
    let verifier = AttestationVerifier::from_config(&config)?;
    info!(
        config = %args.config.display(),
        keys = config.keys.len(),
        replay_enabled = verifier.replay_enabled(),
        "Attestation verifier initialized"
    );

    let app = create_router(ApiState::new(Arc::new(verifier)));
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

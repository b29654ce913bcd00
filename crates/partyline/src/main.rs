//! Partyline server binary.
//!
//! Configuration comes from the environment: `PORT`, `PARTYLINE_HOST`,
//! `PARTYLINE_GRACE_SECS`, `PARTYLINE_IDLE_SECS`, and `RUST_LOG`.

use partyline::{PartylineServer, ServerConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let config = ServerConfig::from_env()?;
    let server = PartylineServer::builder().config(config).build().await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server.run().await?;
    Ok(())
}

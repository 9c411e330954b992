use synchro::prelude::*;
use tracing_subscriber::EnvFilter;

/// Path to an optional JSON configuration file.
const CONFIG_ENV: &str = "SYNCHRO_CONFIG";

#[tokio::main]
async fn main() -> Result<(), SynchroError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::var_os(CONFIG_ENV) {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    let server = SynchroServer::builder().config(config).build().await?;
    server.run().await?;

    tracing::info!("bye");
    Ok(())
}

use anyhow::Result;
use newsbot_core::config::{AppConfig, LoadOptions};
use newsbot_server::{bootstrap_with_config, init_logging, serve};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging first: bootstrap emits connection and migration events.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap_with_config(config).await?;
    serve(app).await
}

//! Focuswall Binary Entry Point

use clap::Parser;
use focus_agent::{run, Args};
use focus_core::init_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.to_config();

    // Keep the guard alive or buffered file output is dropped
    let _guard = init_logging(&config.logging)?;

    if let Err(e) = run(config).await {
        tracing::error!("Focuswall failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}

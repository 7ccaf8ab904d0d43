mod cli;

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use cli::config::{CliArgs, ClientConfig};
use cli::telemetry::init_telemetry;
use docustream_client::DocuClient;
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    init_telemetry()?;

    let client = DocuClient::connect(&config.connect)
        .await
        .with_context(|| format!("failed to connect to {}", config.connect.uri()))?;

    let document = tokio::fs::read(&config.input)
        .await
        .with_context(|| format!("failed to read {}", config.input.display()))?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Converting {} ({} bytes) via {}",
        config.input.display(),
        document.len(),
        config.connect.uri()
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            #[cfg(feature = "tracing")]
            tracing::warn!("Received Ctrl+C, cancelling transfer");
            on_ctrl_c.cancel();
        }
    });

    let pdf = client
        .word_to_pdf_with_cancel(Bytes::from(document), &cancel)
        .await
        .context("conversion failed")?;

    tokio::fs::write(&config.output, &pdf)
        .await
        .with_context(|| format!("failed to write {}", config.output.display()))?;

    #[cfg(feature = "tracing")]
    tracing::info!("Wrote {} bytes to {}", pdf.len(), config.output.display());

    Ok(())
}

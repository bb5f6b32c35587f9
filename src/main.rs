//! WhatsApp Webhook Receiver
//!
//! Verifies the webhook subscription and acknowledges event notifications.

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use whatsapp_webhook::{serve, WebhookConfig, WhatsAppLoggingHandler};

/// WhatsApp Webhook Receiver
#[derive(Parser, Debug)]
#[command(name = "wa-webhook")]
#[command(author = "ReasonKit Team <team@reasonkit.sh>")]
#[command(version)]
#[command(about = "Ack-first receiver for WhatsApp Cloud API webhooks")]
struct Args {
    /// Port to listen on (overrides WEBHOOK_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides WEBHOOK_BIND_ALL)
    #[arg(short = 'H', long)]
    host: Option<IpAddr>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = if args.verbose { "debug" } else { "info" };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = WebhookConfig::from_env().context("failed to load webhook configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.bind_addr = host;
    }

    tracing::info!(
        "WhatsApp webhook receiver starting on {}",
        config.socket_addr()
    );

    serve(config, Arc::new(WhatsAppLoggingHandler))
        .await
        .context("webhook server failed")?;

    Ok(())
}

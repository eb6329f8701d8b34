//! HAProxy admin service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶  http (request id, trace, timeout, limits)
//!                        │
//!                        ▼
//!                      admin (bearer auth → handlers)
//!                        │
//!            ┌───────────┼──────────────────┐
//!            ▼           ▼                  ▼
//!        haproxy     haproxy::pipeline    hosting
//!     parse/graph   backup → write →     account fan-out
//!                   validate → restart
//!                        │                  │
//!                        ▼                  ▼
//!                      exec (haproxy -c, panel commands)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use haproxy_admin::config::loader::load_or_default;
use haproxy_admin::config::schema::PLACEHOLDER_API_KEY;
use haproxy_admin::observability::{logging, metrics};
use haproxy_admin::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "haproxy-admin")]
#[command(about = "HAProxy configuration admin API", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_or_default(cli.config.as_deref())?;

    logging::init(&config.observability.log_level);
    tracing::info!("haproxy-admin v{} starting", env!("CARGO_PKG_VERSION"));

    if config.admin.api_key == PLACEHOLDER_API_KEY {
        tracing::warn!("admin.api_key is still the placeholder value; set a real key");
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        config_path = %config.haproxy.config_path.display(),
        panel_root = %config.panel.root.display(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(&config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

use std::path::PathBuf;

use chat_relay::gateway::telemetry;
use chat_relay::{FireworksPath, RelayConfig, RelayHttpState};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "chat-relay", about = "Relay for OpenAI/Fireworks chat completions")]
struct Cli {
    /// TOML config file; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, alias = "addr")]
    listen: Option<String>,
    /// Base URL override, `openai=URL` or `fireworks=URL`. Repeatable.
    #[arg(long = "upstream", value_name = "NAME=URL")]
    upstreams: Vec<String>,
    /// `inference` inserts `/inference` before Fireworks paths, `direct` does not.
    #[arg(long)]
    fireworks_path: Option<FireworksPath>,
    #[arg(long)]
    max_body_bytes: Option<usize>,
    #[arg(long)]
    request_timeout_secs: Option<u64>,
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> chat_relay::Result<RelayConfig> {
        let mut config = match self.config.as_deref() {
            Some(path) => RelayConfig::load(path)?,
            None => RelayConfig::default(),
        };
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        for spec in &self.upstreams {
            config.push_upstream_spec(spec)?;
        }
        if let Some(policy) = self.fireworks_path {
            config.fireworks_path = policy;
        }
        if let Some(max_body_bytes) = self.max_body_bytes {
            config.max_body_bytes = max_body_bytes;
        }
        if let Some(timeout) = self.request_timeout_secs {
            config.request_timeout_secs = timeout;
        }
        config.json_logs |= self.json_logs;
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;
    telemetry::init_tracing(config.json_logs)?;

    let state = RelayHttpState::from_config(&config)?;
    let app = chat_relay::router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    tracing::info!(
        listen = %listener.local_addr()?,
        fireworks_path = ?config.fireworks_path,
        "chat-relay listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

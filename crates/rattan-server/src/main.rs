//! Rattan server binary.
//!
//! Loads configuration, applies CLI overrides, and runs the websocket
//! gateway until the process is terminated.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rattan_config::{ConfigManager, PolicyKind};
use rattan_core::{GatewayCore, LogHandler};
use rattan_gateway::{build_policy, GatewayServer};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(name = "rattan-server")]
#[command(about = "Rattan WebSocket Gateway Server")]
#[command(version)]
struct Cli {
    /// Bind address (overrides config)
    #[arg(long, env = "RATTAN_BIND")]
    bind: Option<String>,

    /// Maximum concurrent connections (overrides config)
    #[arg(long, env = "RATTAN_MAX_CONNECTIONS")]
    max_connections: Option<usize>,

    /// Response policy: ack_then_close or echo (overrides config)
    #[arg(long, env = "RATTAN_POLICY")]
    policy: Option<String>,

    /// Acknowledgment payload for the ack_then_close policy
    #[arg(long, env = "RATTAN_ACK_PAYLOAD")]
    ack_payload: Option<String>,

    /// Config file path
    #[arg(long, env = "RATTAN_CONFIG", default_value = "~/.rattan/config.json")]
    config: String,

    /// Log level (overrides config)
    #[arg(long, env = "RUST_LOG")]
    log_level: Option<String>,
}

fn parse_policy(name: &str) -> Option<PolicyKind> {
    match name {
        "ack_then_close" => Some(PolicyKind::AckThenClose),
        "echo" => Some(PolicyKind::Echo),
        _ => None,
    }
}

/// Apply CLI flags on top of the loaded config. Flags beat file values.
fn apply_overrides(config: &mut rattan_config::Config, cli: &Cli) -> Result<(), String> {
    if let Some(ref bind) = cli.bind {
        config.gateway.bind = bind.clone();
    }
    if let Some(max) = cli.max_connections {
        config.gateway.max_connections = max;
    }
    if let Some(ref name) = cli.policy {
        match parse_policy(name) {
            Some(kind) => config.gateway.policy = kind,
            None => {
                return Err(format!(
                    "Unknown policy '{}', expected ack_then_close or echo",
                    name
                ));
            }
        }
    }
    if let Some(ref ack) = cli.ack_payload {
        config.gateway.ack_payload = ack.clone();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config_path = rattan_config::expand_tilde(&cli.config)
        .unwrap_or_else(|| PathBuf::from(&cli.config));

    let config_manager = match ConfigManager::load(&config_path).await {
        Ok(cm) => cm,
        Err(e) => {
            eprintln!("Failed to load config from {:?}: {}", config_path, e);
            std::process::exit(1);
        }
    };
    let mut config = config_manager.get().read().await.clone();

    if let Err(e) = apply_overrides(&mut config, &cli) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let log_level = cli
        .log_level
        .unwrap_or_else(|| config.logging.level.as_str().to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&log_level))
        .init();

    info!("starting rattan-server");
    info!("  bind: {}", config.gateway.bind);
    info!("  max connections: {}", config.gateway.max_connections);
    info!("  policy: {:?}", config.gateway.policy);

    let policy = build_policy(&config.gateway);
    let mut core = GatewayCore::new(policy);
    core.register_handler(Arc::new(LogHandler));

    let server = GatewayServer::new(config.gateway.clone(), Arc::new(core));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("gateway error: {}", e);
                return Err(std::io::Error::other(e.to_string()));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping gateway");
        }
    }

    Ok(())
}

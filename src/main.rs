mod commands;
mod console;
mod directory;
mod private_chat;
mod profiles;
mod registration;
mod render;
mod session;

use alloy::signers::local::PrivateKeySigner;
use pulse_core::ChatConfig;
use pulse_gateway::{ChainGateway, GatewayConfig, RpcTransport};
use pulse_store::{ChatStore, FileBackend};
use pulse_sync::MessageSynchronizer;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::console::Console;
use crate::session::Session;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the chat
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("pulse_sync=info".parse()?)
                .add_directive("pulse_gateway=info".parse()?),
        )
        .init();

    let config = match ChatConfig::load() {
        Ok(config) => {
            info!(
                chain_id = config.chain_id,
                network = %config.network_name,
                contract = ?config.contract,
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    // Wallet gate: every write needs a signing account
    let signer = match std::env::var("PRIVATE_KEY") {
        Ok(key) => match key.trim().parse::<PrivateKeySigner>() {
            Ok(signer) => signer,
            Err(e) => {
                error!(error = %e, "PRIVATE_KEY is not a valid private key");
                std::process::exit(1);
            }
        },
        Err(_) => {
            error!("Wallet not connected: set PRIVATE_KEY to join the chat");
            std::process::exit(1);
        }
    };
    let me = signer.address();

    let transport = match RpcTransport::connect(&config.rpc_url, Some(signer)) {
        Ok(transport) => transport.with_log_poll_interval(config.sync.event_poll_interval),
        Err(e) => {
            error!(error = %e, rpc_url = %config.rpc_url, "Failed to create RPC transport");
            std::process::exit(1);
        }
    };
    let gateway = ChainGateway::new(Arc::new(transport), GatewayConfig::from(&config));

    let mut console = Console::new();

    if gateway.contract().is_none() {
        warn!(
            deployment_file = %config.deployment_path.display(),
            "Contract not deployed, run pulse-deploy first; chat is read-only"
        );
    } else if !gateway.check_user_registered(me).await {
        info!(account = ?me, "Account not registered");
        if !registration::run_gate(&gateway, &mut console, me).await? {
            info!("Input closed before registration finished");
            return Ok(());
        }
    }

    let backend = match FileBackend::new(&config.store.private_dir) {
        Ok(backend) => backend,
        Err(e) => {
            error!(error = %e, "Failed to open private message store");
            std::process::exit(1);
        }
    };
    let store = ChatStore::new(config.sync.message_window as usize, Arc::new(backend));

    let synchronizer = MessageSynchronizer::new(gateway.clone(), store.feed.clone(), config.sync.clone());
    let events = synchronizer.subscribe();
    let sync = synchronizer.start();

    info!(account = ?me, "Pulse Chat ready");
    Session::new(gateway, store, sync, me)
        .run(&mut console, events)
        .await?;

    info!("Goodbye");
    Ok(())
}

//! Deploy the `PulseChat` contract and record where it landed.
//!
//! Reads `PRIVATE_KEY`, the compiled artifact at
//! `$ARTIFACTS_DIR/$CONTRACT_NAME.polkavm`, and writes the deployment record
//! to `$DEPLOYMENT_FILE`. Any failure exits with status 1.

use alloy::primitives::Bytes;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{anyhow, bail, Context};
use chrono::Utc;
use pulse_core::{ChatConfig, ChatError, DeploymentRecord};
use pulse_gateway::RpcTransport;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONTRACT_NAME: &str = "PulseChat";
const DEFAULT_ARTIFACTS_DIR: &str = "contracts";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    if let Err(e) = run().await {
        error!(error = %format!("{:#}", e), "Deployment failed");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    let private_key =
        env::var("PRIVATE_KEY").map_err(|_| ChatError::MissingEnvVar("PRIVATE_KEY".to_string()))?;
    let signer: PrivateKeySigner = private_key
        .trim()
        .parse()
        .context("PRIVATE_KEY is not a valid private key")?;
    let deployer = signer.address();

    let config = ChatConfig::load()?;
    let contract_name =
        env::var("CONTRACT_NAME").unwrap_or_else(|_| DEFAULT_CONTRACT_NAME.to_string());
    let artifacts_dir = env::var("ARTIFACTS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_ARTIFACTS_DIR));

    let bytecode = read_bytecode(&artifacts_dir, &contract_name)?;

    info!(
        contract = %contract_name,
        network = %config.network_name,
        deployer = ?deployer,
        bytecode_len = bytecode.len(),
        "Deploying contract"
    );

    let transport = RpcTransport::connect(&config.rpc_url, Some(signer))?;
    let outcome = transport.deploy(bytecode).await?;
    if !outcome.success {
        bail!("deployment transaction {} reverted", outcome.tx_hash);
    }
    let address = outcome
        .contract_address
        .ok_or_else(|| anyhow!("receipt for {} has no contract address", outcome.tx_hash))?;

    let record = DeploymentRecord {
        contract_name: contract_name.clone(),
        address: Some(address),
        network: config.network_name.clone(),
        chain_id: config.chain_id,
        deployed_at: Utc::now(),
        transaction_hash: outcome.tx_hash,
        block_number: outcome.block_number.unwrap_or_default().to_string(),
    };
    record
        .write(&config.deployment_path)
        .with_context(|| format!("writing {}", config.deployment_path.display()))?;

    info!(
        contract = %contract_name,
        address = ?address,
        tx_hash = ?outcome.tx_hash,
        block = %record.block_number,
        path = %config.deployment_path.display(),
        "Contract deployed"
    );
    Ok(())
}

/// Raw artifact bytes; the file holds the binary blob, not hex
fn read_bytecode(dir: &Path, contract_name: &str) -> anyhow::Result<Bytes> {
    let path = dir.join(format!("{}.polkavm", contract_name));
    let raw = std::fs::read(&path).with_context(|| format!("reading bytecode {}", path.display()))?;
    if raw.is_empty() {
        bail!("bytecode {} is empty", path.display());
    }
    Ok(Bytes::from(raw))
}

use crate::error::{ChatError, Result};
use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_RPC_URL: &str = "https://testnet-passet-hub-eth-rpc.polkadot.io";
pub const DEFAULT_CHAIN_ID: u64 = 420420422;
pub const DEFAULT_NETWORK_NAME: &str = "Polkadot Hub TestNet";
pub const DEFAULT_DEPLOYMENT_FILE: &str = "contracts/deployment.json";

/// Deployment record written by the deploy CLI. The client reads it through
/// [`ContractLocation`], which only needs the address
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    /// `None` when the record carries no usable address
    #[serde(default, deserialize_with = "lenient_address")]
    pub address: Option<Address>,
    pub network: String,
    pub chain_id: u64,
    pub deployed_at: DateTime<Utc>,
    pub transaction_hash: B256,
    /// Decimal string, as written by the deploy CLI
    pub block_number: String,
}

fn lenient_address<'de, D>(deserializer: D) -> std::result::Result<Option<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.trim().parse::<Address>().ok()))
}

impl DeploymentRecord {
    /// Load a deployment record from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|_| ChatError::DeploymentFileNotFound(path.display().to_string()))?;

        serde_json::from_str(&content).map_err(|e| ChatError::DeploymentParseError(e.to_string()))
    }

    /// Write the record as pretty JSON, creating parent directories as needed
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// The parts of a deployment record the client needs to find the contract.
///
/// Read leniently: only `address` matters, and the other fields are taken
/// when present with the expected type and ignored otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractLocation {
    pub address: Option<Address>,
    pub network: Option<String>,
    pub chain_id: Option<u64>,
}

impl ContractLocation {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|_| ChatError::DeploymentFileNotFound(path.display().to_string()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ChatError::DeploymentParseError(e.to_string()))?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        let chain_id = match value.get("chainId") {
            Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
            Some(v) => v.as_u64(),
            None => None,
        };

        Self {
            address: value
                .get("address")
                .and_then(|v| v.as_str())
                .and_then(|s| s.trim().parse::<Address>().ok()),
            network: value.get("network").and_then(|v| v.as_str()).map(str::to_string),
            chain_id,
        }
    }
}

/// Message synchronizer timing
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Interval between full snapshot polls
    pub poll_interval: Duration,
    /// Number of most recent messages fetched per poll
    pub message_window: u64,
    /// Interval for the event filter poller
    pub event_poll_interval: Duration,
    /// Delay before the extra poll scheduled after a send
    pub refresh_after_send: Duration,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        let poll_interval_secs = env::var("POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10u64);

        let message_window = env::var("MESSAGE_WINDOW")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(100u64);

        let event_poll_interval_ms = env::var("EVENT_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000u64);

        let refresh_after_send_ms = env::var("REFRESH_AFTER_SEND_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2000u64);

        Self {
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            message_window: message_window.max(1),
            event_poll_interval: Duration::from_millis(event_poll_interval_ms),
            refresh_after_send: Duration::from_millis(refresh_after_send_ms),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            message_window: 100,
            event_poll_interval: Duration::from_millis(2000),
            refresh_after_send: Duration::from_millis(2000),
        }
    }
}

/// Private message store location
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub private_dir: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let private_dir = env::var("PRIVATE_STORE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("pulse-chat")
                    .join("private")
            });

        Self { private_dir }
    }
}

/// Complete client configuration, built once at startup and passed down
/// explicitly
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub chain_id: u64,
    pub network_name: String,
    pub rpc_url: String,
    pub deployment_path: PathBuf,
    /// Contract address; `None` degrades every gateway call to its safe default
    pub contract: Option<Address>,
    pub confirmations: u64,
    pub sync: SyncConfig,
    pub store: StoreConfig,
}

impl ChatConfig {
    /// Load configuration from environment variables and the deployment record.
    ///
    /// A missing or unusable deployment record is not an error here: the
    /// contract address is left unset and a warning is logged.
    pub fn load() -> Result<Self> {
        let chain_id = match env::var("CHAIN_ID") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ChatError::MissingEnvVar("CHAIN_ID (invalid format)".to_string()))?,
            Err(_) => DEFAULT_CHAIN_ID,
        };

        let rpc_url = sanitize_url(
            &env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
        );

        let network_name =
            env::var("NETWORK_NAME").unwrap_or_else(|_| DEFAULT_NETWORK_NAME.to_string());

        let deployment_path = env::var("DEPLOYMENT_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DEPLOYMENT_FILE));

        let confirmations = env::var("CONFIRMATIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1u64);

        info!(rpc_url = %rpc_url, chain_id = chain_id, "RPC endpoint configured");

        let contract = Self::resolve_contract(&deployment_path, chain_id);

        Ok(Self {
            chain_id,
            network_name,
            rpc_url,
            deployment_path,
            contract,
            confirmations,
            sync: SyncConfig::from_env(),
            store: StoreConfig::from_env(),
        })
    }

    fn resolve_contract(path: &Path, chain_id: u64) -> Option<Address> {
        match ContractLocation::load(path) {
            Ok(record) => {
                if let Some(record_chain_id) = record.chain_id.filter(|id| *id != chain_id) {
                    warn!(
                        record_chain_id = record_chain_id,
                        chain_id = chain_id,
                        "Deployment record targets a different chain"
                    );
                }
                match record.address {
                    Some(address) => {
                        info!(
                            contract = ?address,
                            network = ?record.network,
                            "Contract loaded from deployment record"
                        );
                        Some(address)
                    }
                    None => {
                        warn!(path = %path.display(), "Deployment record has no valid address");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Contract not deployed, chain features disabled");
                None
            }
        }
    }
}

/// Sanitize URL by removing surrounding quotes and whitespace
pub fn sanitize_url(url: &str) -> String {
    let trimmed = url.trim();
    let without_quotes = if trimmed.len() >= 2
        && ((trimmed.starts_with('"') && trimmed.ends_with('"'))
            || (trimmed.starts_with('\'') && trimmed.ends_with('\'')))
    {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };
    without_quotes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "contractName": "PulseChat",
        "address": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
        "network": "Polkadot Hub TestNet",
        "chainId": 420420422,
        "deployedAt": "2025-01-15T10:30:00.000Z",
        "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
        "blockNumber": "123456"
    }"#;

    #[test]
    fn test_parse_deployment_record() {
        let record: DeploymentRecord = serde_json::from_str(RECORD).unwrap();
        assert_eq!(record.contract_name, "PulseChat");
        assert_eq!(record.chain_id, 420420422);
        assert_eq!(record.block_number, "123456");
        assert_eq!(
            record.address,
            Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap())
        );
    }

    #[test]
    fn test_invalid_address_is_none() {
        let json = RECORD.replace("0x5FbDB2315678afecb367f032d93F642f64180aa3", "not-an-address");
        let record: DeploymentRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record.address, None);
    }

    #[test]
    fn test_missing_file_resolves_to_no_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        assert!(matches!(
            DeploymentRecord::load(&path),
            Err(ChatError::DeploymentFileNotFound(_))
        ));
        assert_eq!(ChatConfig::resolve_contract(&path, DEFAULT_CHAIN_ID), None);
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contracts").join("deployment.json");
        let record: DeploymentRecord = serde_json::from_str(RECORD).unwrap();

        record.write(&path).unwrap();
        let loaded = DeploymentRecord::load(&path).unwrap();

        assert_eq!(loaded.address, record.address);
        assert_eq!(loaded.deployed_at, record.deployed_at);
        assert_eq!(
            ChatConfig::resolve_contract(&path, DEFAULT_CHAIN_ID),
            record.address
        );
    }

    #[test]
    fn test_address_only_record_locates_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.json");
        fs::write(&path, r#"{"address":"0x5FbDB2315678afecb367f032d93F642f64180aa3"}"#).unwrap();

        assert_eq!(
            ChatConfig::resolve_contract(&path, DEFAULT_CHAIN_ID),
            Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap())
        );
    }

    #[test]
    fn test_numeric_block_number_still_locates_contract() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deployment.json");
        fs::write(&path, RECORD.replace(r#""123456""#, "123456")).unwrap();

        // the full record no longer parses, but the address is still usable
        assert!(DeploymentRecord::load(&path).is_err());
        assert_eq!(
            ChatConfig::resolve_contract(&path, DEFAULT_CHAIN_ID),
            Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".parse().unwrap())
        );
    }

    #[test]
    fn test_location_tolerates_odd_field_types() {
        let value = serde_json::json!({
            "address": "not-an-address",
            "chainId": "420420422",
            "network": 7,
        });
        let location = ContractLocation::from_value(&value);
        assert_eq!(location.address, None);
        assert_eq!(location.chain_id, Some(420420422));
        assert_eq!(location.network, None);
    }

    #[test]
    fn test_sanitize_url() {
        assert_eq!(sanitize_url("  \"http://localhost:8545\" "), "http://localhost:8545");
        assert_eq!(sanitize_url("'ws://x'"), "ws://x");
        assert_eq!(sanitize_url("\""), "\"");
    }
}

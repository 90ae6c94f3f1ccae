use alloy_primitives::B256;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Deployment file not found: {0}")]
    DeploymentFileNotFound(String),

    #[error("Failed to parse deployment file: {0}")]
    DeploymentParseError(String),

    #[error("Contract not deployed")]
    ContractNotDeployed,

    #[error("Contract not available or wallet not connected")]
    WalletNotConnected,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Username is already taken: {0}")]
    UsernameTaken(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Simulation failed: {0}")]
    Simulation(String),

    #[error("Transaction submission failed: {0}")]
    Submission(String),

    #[error("Transaction confirmation failed: {0}")]
    Confirmation(String),

    #[error("Transaction reverted: {0}")]
    Reverted(B256),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChatError {
    /// Whether the error came from the transaction path (simulation, submission, receipt)
    pub fn is_transaction_failure(&self) -> bool {
        matches!(
            self,
            ChatError::Simulation(_)
                | ChatError::Submission(_)
                | ChatError::Confirmation(_)
                | ChatError::Reverted(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ChatError>;

pub mod config;
pub mod contract;
pub mod error;
pub mod types;
pub mod validation;

pub use config::{ChatConfig, ContractLocation, DeploymentRecord, StoreConfig, SyncConfig};
pub use error::{ChatError, Result};

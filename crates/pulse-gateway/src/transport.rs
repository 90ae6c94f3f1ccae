use alloy::network::{Ethereum, EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use pulse_core::{ChatError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Boxed provider trait for HTTP connections
pub type BoxedProvider = Arc<dyn Provider<Ethereum> + Send + Sync>;

/// Stream of raw contract logs matching a filter
pub type LogStream = BoxStream<'static, Log>;

/// A contract call, used both for read queries and for write simulation and
/// submission
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub input: Bytes,
}

impl CallRequest {
    pub fn new(to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            input: input.into(),
        }
    }

    pub fn sent_by(mut self, account: Address) -> Self {
        self.from = Some(account);
        self
    }

    fn to_transaction(&self) -> TransactionRequest {
        let tx = TransactionRequest::default()
            .with_to(self.to)
            .with_input(self.input.clone());
        match self.from {
            Some(from) => tx.with_from(from),
            None => tx,
        }
    }
}

/// Result of a confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
    pub contract_address: Option<Address>,
}

/// Low-level access to the chain. The gateway encodes and decodes contract
/// calls; implementations only move bytes.
#[async_trait]
pub trait ContractTransport: Send + Sync {
    /// Account used to sign writes, if a wallet is connected
    fn account(&self) -> Option<Address>;

    /// Execute a call against the latest state without submitting it
    async fn call(&self, request: &CallRequest) -> Result<Bytes>;

    /// Sign and broadcast a transaction, returning its hash
    async fn submit(&self, request: &CallRequest) -> Result<B256>;

    /// Wait until the transaction has the requested number of confirmations
    async fn confirm(&self, tx_hash: B256, confirmations: u64) -> Result<TxOutcome>;

    /// Stream logs matching `filter` as they appear
    async fn watch_logs(&self, filter: Filter) -> Result<LogStream>;
}

/// JSON-RPC transport over HTTP, optionally with a local signing wallet
pub struct RpcTransport {
    provider: BoxedProvider,
    account: Option<Address>,
    log_poll_interval: Duration,
}

impl RpcTransport {
    /// Create a transport for `rpc_url`. Without a signer the transport is
    /// read-only and every write fails with `WalletNotConnected` upstream.
    pub fn connect(rpc_url: &str, signer: Option<PrivateKeySigner>) -> Result<Self> {
        let url: reqwest::Url = rpc_url
            .parse()
            .map_err(|e| ChatError::Rpc(format!("Invalid HTTP URL: {}", e)))?;

        let (provider, account): (BoxedProvider, Option<Address>) = match signer {
            Some(signer) => {
                let account = signer.address();
                let provider = ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(url);
                (Arc::new(provider), Some(account))
            }
            None => (Arc::new(ProviderBuilder::new().connect_http(url)), None),
        };

        Ok(Self {
            provider,
            account,
            log_poll_interval: Duration::from_secs(2),
        })
    }

    /// Set how often the event filter is polled
    pub fn with_log_poll_interval(mut self, interval: Duration) -> Self {
        self.log_poll_interval = interval;
        self
    }

    /// Get HTTP provider reference
    pub fn provider(&self) -> &BoxedProvider {
        &self.provider
    }

    /// Deploy contract bytecode and wait for one confirmation
    pub async fn deploy(&self, bytecode: Bytes) -> Result<TxOutcome> {
        if self.account.is_none() {
            return Err(ChatError::WalletNotConnected);
        }
        let tx = TransactionRequest::default().with_deploy_code(bytecode);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChatError::Submission(e.to_string()))?;
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = ?tx_hash, "Deployment submitted");
        self.confirm(tx_hash, 1).await
    }
}

#[async_trait]
impl ContractTransport for RpcTransport {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        self.provider
            .call(request.to_transaction())
            .await
            .map_err(|e| ChatError::Rpc(e.to_string()))
    }

    async fn submit(&self, request: &CallRequest) -> Result<B256> {
        let pending = self
            .provider
            .send_transaction(request.to_transaction())
            .await
            .map_err(|e| ChatError::Submission(e.to_string()))?;
        Ok(*pending.tx_hash())
    }

    async fn confirm(&self, tx_hash: B256, confirmations: u64) -> Result<TxOutcome> {
        let receipt = PendingTransactionBuilder::new(self.provider.root().clone(), tx_hash)
            .with_required_confirmations(confirmations.max(1))
            .get_receipt()
            .await
            .map_err(|e| ChatError::Confirmation(e.to_string()))?;

        Ok(TxOutcome {
            tx_hash,
            block_number: receipt.block_number(),
            success: receipt.status(),
            contract_address: receipt.contract_address(),
        })
    }

    async fn watch_logs(&self, filter: Filter) -> Result<LogStream> {
        let poller = self
            .provider
            .watch_logs(&filter)
            .await
            .map_err(|e| ChatError::Rpc(e.to_string()))?;

        Ok(poller
            .with_poll_interval(self.log_poll_interval)
            .into_stream()
            .flat_map(stream::iter)
            .boxed())
    }
}

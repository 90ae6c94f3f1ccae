use alloy::rpc::types::Filter;
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use pulse_core::contract::PulseChat;
use pulse_core::types::{ChatMessage, UserProfile};
use pulse_core::validation::{validate_message, validate_signature, validate_username};
use pulse_core::{ChatConfig, ChatError, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::subscription::MessageSubscription;
use crate::transport::{CallRequest, ContractTransport};

/// Contract location and write policy, fixed at startup
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub contract: Option<Address>,
    pub confirmations: u64,
}

impl From<&ChatConfig> for GatewayConfig {
    fn from(config: &ChatConfig) -> Self {
        Self {
            contract: config.contract,
            confirmations: config.confirmations,
        }
    }
}

/// Typed access to the `PulseChat` contract.
///
/// Non-critical reads fall back to a safe default on failure; registration,
/// sending and profile lookups surface their errors.
#[derive(Clone)]
pub struct ChainGateway {
    transport: Arc<dyn ContractTransport>,
    config: GatewayConfig,
}

impl ChainGateway {
    pub fn new(transport: Arc<dyn ContractTransport>, config: GatewayConfig) -> Self {
        Self { transport, config }
    }

    /// Deployed contract address, if known
    pub fn contract(&self) -> Option<Address> {
        self.config.contract
    }

    /// Connected wallet account, if any
    pub fn account(&self) -> Option<Address> {
        self.transport.account()
    }

    fn require_contract(&self) -> Result<Address> {
        self.config.contract.ok_or(ChatError::ContractNotDeployed)
    }

    async fn read<C>(&self, contract: Address, call: C) -> Result<C::Return>
    where
        C: SolCall + Send,
    {
        let request = CallRequest::new(contract, call.abi_encode());
        let output = self.transport.call(&request).await?;
        C::abi_decode_returns(&output).map_err(|e| ChatError::Decode(e.to_string()))
    }

    /// Simulate, submit and confirm a state-changing call.
    /// Submission only happens after a successful simulation.
    async fn write<C>(&self, call: C) -> Result<B256>
    where
        C: SolCall + Send,
    {
        let contract = self.require_contract()?;
        let account = self.transport.account().ok_or(ChatError::WalletNotConnected)?;
        let request = CallRequest::new(contract, call.abi_encode()).sent_by(account);

        self.transport
            .call(&request)
            .await
            .map_err(|e| ChatError::Simulation(e.to_string()))?;
        debug!(function = C::SIGNATURE, "Simulation succeeded, submitting");

        let tx_hash = self.transport.submit(&request).await?;
        info!(function = C::SIGNATURE, tx_hash = ?tx_hash, "Transaction submitted");

        let outcome = self
            .transport
            .confirm(tx_hash, self.config.confirmations)
            .await?;
        if !outcome.success {
            return Err(ChatError::Reverted(tx_hash));
        }

        info!(
            function = C::SIGNATURE,
            tx_hash = ?tx_hash,
            block = ?outcome.block_number,
            "Transaction confirmed"
        );
        Ok(tx_hash)
    }

    /// Whether `user` has a registered profile. Any failure reads as `false`.
    pub async fn check_user_registered(&self, user: Address) -> bool {
        let Some(contract) = self.config.contract else {
            error!("Contract not deployed");
            return false;
        };

        match self
            .read(contract, PulseChat::getUserProfileCall { user })
            .await
        {
            Ok(profile) => profile.isRegistered,
            Err(e) => {
                error!(error = %e, user = ?user, "Error checking registration");
                false
            }
        }
    }

    /// Register the connected account
    pub async fn register_user(
        &self,
        username: &str,
        signature: &str,
        avatar_url: &str,
    ) -> Result<B256> {
        validate_username(username)?;
        validate_signature(signature)?;

        self.write(PulseChat::registerUserCall {
            username: username.to_string(),
            signature: signature.to_string(),
            avatarUrl: avatar_url.to_string(),
        })
        .await
        .inspect_err(|e| error!(error = %e, username = username, "Error registering user"))
    }

    pub async fn is_username_available(&self, username: &str) -> Result<bool> {
        let contract = self.require_contract()?;
        self.read(
            contract,
            PulseChat::isUsernameAvailableCall {
                username: username.to_string(),
            },
        )
        .await
        .inspect_err(|e| error!(error = %e, username = username, "Error checking username"))
    }

    /// Append a message to the public log
    pub async fn send_message(&self, content: &str) -> Result<B256> {
        validate_message(content)?;

        self.write(PulseChat::sendMessageCall {
            content: content.to_string(),
        })
        .await
        .inspect_err(|e| error!(error = %e, "Error sending message"))
    }

    /// Most recent `count` messages, oldest first. Transport failures yield an
    /// empty list.
    pub async fn get_latest_messages(&self, count: u64) -> Result<Vec<ChatMessage>> {
        let contract = self.require_contract()?;

        match self
            .read(
                contract,
                PulseChat::getLatestMessagesCall {
                    count: U256::from(count),
                },
            )
            .await
        {
            Ok(messages) => Ok(messages.into_iter().map(ChatMessage::from).collect()),
            Err(e) => {
                error!(error = %e, "Error getting messages");
                Ok(Vec::new())
            }
        }
    }

    /// Total number of messages on-chain, `0` on any failure
    pub async fn get_total_messages(&self) -> u64 {
        let Some(contract) = self.config.contract else {
            return 0;
        };

        match self
            .read(contract, PulseChat::getTotalMessagesCall {})
            .await
        {
            Ok(total) => total.saturating_to(),
            Err(e) => {
                error!(error = %e, "Error getting total messages");
                0
            }
        }
    }

    pub async fn get_user_profile(&self, user: Address) -> Result<UserProfile> {
        let contract = self.require_contract()?;
        let ret = self
            .read(contract, PulseChat::getUserProfileCall { user })
            .await
            .inspect_err(|e| error!(error = %e, user = ?user, "Error getting user profile"))?;
        Ok(UserProfile::from_return(user, ret))
    }

    /// All registered addresses. Transport failures yield an empty list.
    pub async fn get_all_users(&self) -> Result<Vec<Address>> {
        let contract = self.require_contract()?;

        match self.read(contract, PulseChat::getAllUsersCall {}).await {
            Ok(users) => Ok(users),
            Err(e) => {
                error!(error = %e, "Error getting users");
                Ok(Vec::new())
            }
        }
    }

    /// Subscribe to `MessageSent`. `None` when the contract is unknown or the
    /// subscription could not be established.
    pub async fn watch_messages(&self) -> Option<MessageSubscription> {
        let contract = self.config.contract?;
        let filter = Filter::new()
            .address(contract)
            .event_signature(PulseChat::MessageSent::SIGNATURE_HASH);

        match self.transport.watch_logs(filter).await {
            Ok(logs) => {
                debug!(contract = ?contract, "Subscribed to MessageSent");
                Some(MessageSubscription::spawn(logs))
            }
            Err(e) => {
                error!(error = %e, "Error listening to messages");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryChat;
    use std::time::Duration;

    fn alice() -> Address {
        Address::repeat_byte(0xA1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xB0)
    }

    fn gateway_for(chain: &Arc<InMemoryChat>) -> ChainGateway {
        ChainGateway::new(
            chain.clone(),
            GatewayConfig {
                contract: Some(chain.contract()),
                confirmations: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_register_and_read_profile() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        let gateway = gateway_for(&chain);

        assert!(!gateway.check_user_registered(alice()).await);
        assert!(gateway.is_username_available("alice").await.unwrap());

        gateway
            .register_user("alice", "hello there", "")
            .await
            .unwrap();

        assert!(gateway.check_user_registered(alice()).await);
        assert!(!gateway.is_username_available("alice").await.unwrap());

        let profile = gateway.get_user_profile(alice()).await.unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.signature.as_deref(), Some("hello there"));
        assert_eq!(profile.avatar_url, None);
        assert!(profile.is_registered);
        assert_eq!(gateway.get_all_users().await.unwrap(), vec![alice()]);
    }

    #[tokio::test]
    async fn test_failed_simulation_never_submits() {
        let chain = Arc::new(InMemoryChat::new(Some(bob())));
        chain.register(alice(), "alice");
        let gateway = gateway_for(&chain);

        let err = gateway.register_user("alice", "", "").await.unwrap_err();

        assert!(matches!(err, ChatError::Simulation(_)));
        assert!(err.is_transaction_failure());
        assert_eq!(chain.simulations(), 1);
        assert_eq!(chain.submissions(), 0);
    }

    #[tokio::test]
    async fn test_invalid_message_rejected_before_simulation() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        chain.register(alice(), "alice");
        let gateway = gateway_for(&chain);

        let too_long = "x".repeat(1001);
        assert!(matches!(
            gateway.send_message(&too_long).await,
            Err(ChatError::InvalidInput(_))
        ));
        assert!(matches!(
            gateway.send_message("   ").await,
            Err(ChatError::InvalidInput(_))
        ));
        assert_eq!(chain.simulations(), 0);
    }

    #[tokio::test]
    async fn test_send_message_requires_wallet() {
        let chain = Arc::new(InMemoryChat::new(None));
        let gateway = gateway_for(&chain);

        assert!(matches!(
            gateway.send_message("gm").await,
            Err(ChatError::WalletNotConnected)
        ));
        assert_eq!(chain.submissions(), 0);
    }

    #[tokio::test]
    async fn test_send_message_round_trip() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        chain.register(alice(), "alice");
        let gateway = gateway_for(&chain);

        gateway.send_message("gm").await.unwrap();
        gateway.send_message("gm").await.unwrap();

        assert_eq!(gateway.get_total_messages().await, 2);
        let messages = gateway.get_latest_messages(100).await.unwrap();
        assert_eq!(messages.len(), 2);
        // identical content, distinct identity
        assert_ne!(messages[0].message_id, messages[1].message_id);
        assert!(messages.iter().all(|m| m.sender == alice() && m.content == "gm"));
    }

    #[tokio::test]
    async fn test_missing_contract_degrades() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        let gateway = ChainGateway::new(
            chain.clone(),
            GatewayConfig {
                contract: None,
                confirmations: 1,
            },
        );

        assert!(!gateway.check_user_registered(alice()).await);
        assert_eq!(gateway.get_total_messages().await, 0);
        assert!(gateway.watch_messages().await.is_none());
        assert!(matches!(
            gateway.get_latest_messages(100).await,
            Err(ChatError::ContractNotDeployed)
        ));
        assert!(matches!(
            gateway.send_message("gm").await,
            Err(ChatError::ContractNotDeployed)
        ));
        assert!(matches!(
            gateway.is_username_available("alice").await,
            Err(ChatError::ContractNotDeployed)
        ));
    }

    #[tokio::test]
    async fn test_transient_read_failures_use_safe_defaults() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        chain.register(alice(), "alice");
        chain.push_message(alice(), "before outage");
        let gateway = gateway_for(&chain);

        chain.set_fail_reads(true);

        assert_eq!(gateway.get_total_messages().await, 0);
        assert!(gateway.get_latest_messages(100).await.unwrap().is_empty());
        assert!(gateway.get_all_users().await.unwrap().is_empty());
        assert!(!gateway.check_user_registered(alice()).await);
        assert!(gateway.get_user_profile(alice()).await.is_err());
        assert!(gateway.is_username_available("bob").await.is_err());
    }

    #[tokio::test]
    async fn test_subscription_delivers_events() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        chain.register(alice(), "alice");
        let gateway = gateway_for(&chain);

        let mut subscription = gateway.watch_messages().await.unwrap();
        gateway.send_message("hello chain").await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), subscription.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.content, "hello chain");
        assert_eq!(event.sender, alice());
        assert_eq!(event.message_id, U256::from(1));
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        let gateway = gateway_for(&chain);

        let mut subscription = gateway.watch_messages().await.unwrap();
        let other_path = subscription.handle();

        assert!(subscription.unsubscribe());
        assert!(!other_path.release());
        assert!(!subscription.unsubscribe());
        assert!(other_path.is_released());
        assert!(subscription.next().await.is_none());

        // drop runs release again without effect
        drop(subscription);
        assert!(!other_path.release());
    }
}

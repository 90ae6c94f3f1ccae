use alloy::primitives::{Address, B256};
use pulse_core::validation::{validate_signature, validate_username};
use pulse_core::{ChatError, Result};
use pulse_gateway::ChainGateway;
use tracing::info;

use crate::console::Console;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Unknown,
    Available,
    Taken,
}

/// Profile details collected before the first chat session
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub username: String,
    pub signature: String,
    pub avatar_url: String,
    availability: Availability,
}

impl RegistrationForm {
    pub fn new(username: &str, signature: &str, avatar_url: &str) -> Self {
        Self {
            username: username.trim().to_string(),
            signature: signature.trim().to_string(),
            avatar_url: avatar_url.trim().to_string(),
            availability: Availability::Unknown,
        }
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn validate(&self) -> Result<()> {
        validate_username(&self.username)?;
        validate_signature(&self.signature)
    }

    /// Ask the contract whether the username is free
    pub async fn check_availability(&mut self, gateway: &ChainGateway) -> Result<Availability> {
        validate_username(&self.username)?;
        self.availability = if gateway.is_username_available(&self.username).await? {
            Availability::Available
        } else {
            Availability::Taken
        };
        Ok(self.availability)
    }

    /// Register the connected account. A taken username is refused before any
    /// transaction is attempted.
    pub async fn submit(&mut self, gateway: &ChainGateway) -> Result<B256> {
        self.validate()?;
        if self.availability == Availability::Unknown {
            self.check_availability(gateway).await?;
        }
        if self.availability == Availability::Taken {
            return Err(ChatError::UsernameTaken(self.username.clone()));
        }

        let tx_hash = gateway
            .register_user(&self.username, &self.signature, &self.avatar_url)
            .await?;
        info!(username = %self.username, tx_hash = ?tx_hash, "Registered");
        Ok(tx_hash)
    }
}

/// Prompt until `account` is registered. Returns false if input ends first.
///
/// Registration is read again before every attempt, so an account whose
/// startup check failed, or which got registered by an attempt that then
/// reported an error, leaves the gate.
pub async fn run_gate(
    gateway: &ChainGateway,
    console: &mut Console,
    account: Address,
) -> std::io::Result<bool> {
    println!("Welcome to Pulse Chat. Create a profile to join.");

    loop {
        if gateway.check_user_registered(account).await {
            info!(account = ?account, "Account is registered");
            return Ok(true);
        }

        let Some(username) = console.prompt("Username (2-50 characters): ").await? else {
            return Ok(false);
        };
        let mut form = RegistrationForm::new(&username, "", "");
        if let Err(e) = form.validate() {
            println!("{}", describe(&e));
            continue;
        }

        match form.check_availability(gateway).await {
            Ok(Availability::Taken) => {
                println!("Username already taken");
                continue;
            }
            Ok(_) => println!("Username available"),
            Err(e) => {
                println!("Could not check username: {}", describe(&e));
                continue;
            }
        }

        let Some(signature) = console.prompt("Signature (optional, up to 200 characters): ").await? else {
            return Ok(false);
        };
        let Some(avatar_url) = console.prompt("Avatar URL (optional): ").await? else {
            return Ok(false);
        };
        form.signature = signature.trim().to_string();
        form.avatar_url = avatar_url.trim().to_string();

        println!("Registering...");
        match form.submit(gateway).await {
            Ok(_) => {
                println!("Welcome, {}!", form.username);
                return Ok(true);
            }
            Err(e) => println!("Registration failed: {}", describe(&e)),
        }
    }
}

/// User-facing text for a registration error
fn describe(error: &ChatError) -> String {
    match error {
        ChatError::InvalidInput(reason) => reason.clone(),
        ChatError::UsernameTaken(_) => "Username already taken".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_gateway::testing::InMemoryChat;
    use pulse_gateway::GatewayConfig;
    use std::sync::Arc;

    fn alice() -> Address {
        Address::repeat_byte(0xA1)
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
    async fn test_taken_username_blocks_submit() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        chain.register(Address::repeat_byte(0xB0), "bob");
        let gateway = gateway_for(&chain);

        let mut form = RegistrationForm::new("bob", "", "");
        assert_eq!(form.check_availability(&gateway).await.unwrap(), Availability::Taken);

        let err = form.submit(&gateway).await.unwrap_err();
        assert!(matches!(err, ChatError::UsernameTaken(ref name) if name == "bob"));
        assert_eq!(chain.simulations(), 0);
        assert_eq!(chain.submissions(), 0);
    }

    #[tokio::test]
    async fn test_submit_checks_availability_first() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        chain.register(Address::repeat_byte(0xB0), "bob");
        let gateway = gateway_for(&chain);

        let mut form = RegistrationForm::new("bob", "", "");
        assert!(form.submit(&gateway).await.is_err());
        assert_eq!(form.availability(), Availability::Taken);
        assert_eq!(chain.submissions(), 0);
    }

    #[tokio::test]
    async fn test_available_username_registers() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        let gateway = gateway_for(&chain);

        let mut form = RegistrationForm::new(" alice ", "hello world", "");
        form.submit(&gateway).await.unwrap();

        assert!(gateway.check_user_registered(alice()).await);
        let profile = gateway.get_user_profile(alice()).await.unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.signature.as_deref(), Some("hello world"));
    }

    #[tokio::test]
    async fn test_invalid_form_never_reaches_chain() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        let gateway = gateway_for(&chain);

        let mut short = RegistrationForm::new("a", "", "");
        assert!(matches!(short.submit(&gateway).await, Err(ChatError::InvalidInput(_))));

        let mut long_signature = RegistrationForm::new("alice", &"x".repeat(201), "");
        assert!(matches!(long_signature.submit(&gateway).await, Err(ChatError::InvalidInput(_))));

        assert_eq!(chain.simulations(), 0);
        assert_eq!(
            describe(&RegistrationForm::new("", "", "").validate().unwrap_err()),
            "Username is required"
        );
    }

    #[tokio::test]
    async fn test_gate_lets_registered_account_through() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        chain.register(alice(), "alice");
        let gateway = gateway_for(&chain);
        let mut console = Console::from_reader(&b"alice2\n\n\n"[..]);

        assert!(run_gate(&gateway, &mut console, alice()).await.unwrap());
        assert_eq!(chain.simulations(), 0);
        assert_eq!(chain.submissions(), 0);
        assert_eq!(gateway.get_user_profile(alice()).await.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_gate_registers_then_exits() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        let gateway = gateway_for(&chain);
        let mut console = Console::from_reader(&b"a\nalice\nhi\n\n"[..]);

        assert!(run_gate(&gateway, &mut console, alice()).await.unwrap());
        assert!(gateway.check_user_registered(alice()).await);
        assert_eq!(chain.submissions(), 1);
    }

    #[tokio::test]
    async fn test_gate_gives_up_when_input_ends() {
        let chain = Arc::new(InMemoryChat::new(Some(alice())));
        let gateway = gateway_for(&chain);
        let mut console = Console::from_reader(&b"a\n"[..]);

        assert!(!run_gate(&gateway, &mut console, alice()).await.unwrap());
        assert_eq!(chain.simulations(), 0);
    }
}

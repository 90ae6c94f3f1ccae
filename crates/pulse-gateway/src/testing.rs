//! In-memory stand-in for a deployed `PulseChat` contract.
//!
//! Implements [`ContractTransport`] by decoding calldata and answering from
//! local state, so gateway and synchronizer logic can run without a node.
//! Writes revert the way the contract does (taken username, unregistered
//! sender, empty content) and successful `sendMessage` calls emit
//! `MessageSent` logs to every open watcher.

use alloy::rpc::types::{Filter, Log};
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::{SolEvent, SolInterface, SolValue};
use async_trait::async_trait;
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::StreamExt;
use parking_lot::Mutex;
use pulse_core::contract::{Message, PulseChat};
use pulse_core::types::ChatMessage;
use pulse_core::{ChatError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::transport::{CallRequest, ContractTransport, LogStream, TxOutcome};

#[derive(Debug, Clone)]
struct StoredProfile {
    username: String,
    signature: String,
    avatar_url: String,
    registered_at: u64,
}

#[derive(Debug, Default)]
struct ChainState {
    users: Vec<Address>,
    profiles: HashMap<Address, StoredProfile>,
    messages: Vec<Message>,
    receipts: HashMap<B256, TxOutcome>,
    block: u64,
    nonce: u64,
}

impl ChainState {
    fn username_taken(&self, username: &str) -> bool {
        self.profiles.values().any(|p| p.username == username)
    }

    fn next_timestamp(&mut self) -> u64 {
        self.block += 1;
        1_700_000_000 + self.block * 12
    }
}

pub struct InMemoryChat {
    contract: Address,
    account: Option<Address>,
    state: Mutex<ChainState>,
    watchers: Mutex<Vec<UnboundedSender<Log>>>,
    fail_reads: AtomicBool,
    simulations: AtomicUsize,
    submissions: AtomicUsize,
}

impl InMemoryChat {
    /// Fresh contract; `account` is the connected wallet, if any
    pub fn new(account: Option<Address>) -> Self {
        Self {
            contract: Address::repeat_byte(0xC0),
            account,
            state: Mutex::new(ChainState::default()),
            watchers: Mutex::new(Vec::new()),
            fail_reads: AtomicBool::new(false),
            simulations: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Seed a registration directly, bypassing the transaction path
    pub fn register(&self, user: Address, username: &str) {
        let mut state = self.state.lock();
        let registered_at = state.next_timestamp();
        state.users.push(user);
        state.profiles.insert(
            user,
            StoredProfile {
                username: username.to_string(),
                signature: String::new(),
                avatar_url: String::new(),
                registered_at,
            },
        );
    }

    /// Append a message directly and emit its event
    pub fn push_message(&self, sender: Address, content: &str) -> ChatMessage {
        let chat = self.insert_message(sender, content);
        self.emit(&chat);
        chat
    }

    /// Append a message directly without emitting an event, as if the event
    /// had been lost in transit
    pub fn insert_message(&self, sender: Address, content: &str) -> ChatMessage {
        let mut state = self.state.lock();
        ChatMessage::from(Self::append_message(&mut state, sender, content))
    }

    /// Emit a `MessageSent` log without touching state, e.g. to replay a
    /// message that was already delivered
    pub fn emit(&self, message: &ChatMessage) {
        let event = PulseChat::MessageSent {
            sender: message.sender,
            content: message.content.clone(),
            timestamp: U256::from(message.timestamp),
            messageId: message.message_id,
        };
        let log = Log {
            inner: alloy_primitives::Log {
                address: self.contract,
                data: event.encode_log_data(),
            },
            ..Default::default()
        };

        let mut watchers = self.watchers.lock();
        watchers.retain(|w| w.unbounded_send(log.clone()).is_ok());
    }

    /// Make every read call fail, simulating an RPC outage
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of write simulations seen
    pub fn simulations(&self) -> usize {
        self.simulations.load(Ordering::SeqCst)
    }

    /// Number of transactions submitted
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    /// Watchers whose receiving side is still alive
    pub fn open_watchers(&self) -> usize {
        self.watchers.lock().iter().filter(|w| !w.is_closed()).count()
    }

    fn append_message(state: &mut ChainState, sender: Address, content: &str) -> Message {
        let timestamp = state.next_timestamp();
        let message = Message {
            sender,
            content: content.to_string(),
            timestamp: U256::from(timestamp),
            messageId: U256::from(state.messages.len() + 1),
        };
        state.messages.push(message.clone());
        message
    }

    /// Check a write against contract rules without applying it
    fn check_write(state: &ChainState, from: Option<Address>, call: &PulseChat::PulseChatCalls) -> Result<()> {
        let from = from.ok_or_else(|| ChatError::Rpc("execution reverted: no sender".to_string()))?;
        match call {
            PulseChat::PulseChatCalls::registerUser(c) => {
                if state.profiles.contains_key(&from) {
                    return Err(ChatError::Rpc("execution reverted: Already registered".to_string()));
                }
                if c.username.is_empty() || state.username_taken(&c.username) {
                    return Err(ChatError::Rpc("execution reverted: Username taken".to_string()));
                }
                Ok(())
            }
            PulseChat::PulseChatCalls::sendMessage(c) => {
                if !state.profiles.contains_key(&from) {
                    return Err(ChatError::Rpc("execution reverted: Not registered".to_string()));
                }
                if c.content.is_empty() {
                    return Err(ChatError::Rpc("execution reverted: Empty message".to_string()));
                }
                Ok(())
            }
            _ => Err(ChatError::Rpc("execution reverted: not a write".to_string())),
        }
    }

    fn decode(input: &Bytes) -> Result<PulseChat::PulseChatCalls> {
        PulseChat::PulseChatCalls::abi_decode(input).map_err(|e| ChatError::Rpc(e.to_string()))
    }
}

#[async_trait]
impl ContractTransport for InMemoryChat {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        let call = Self::decode(&request.input)?;
        let state = self.state.lock();

        let output = match &call {
            PulseChat::PulseChatCalls::registerUser(_) | PulseChat::PulseChatCalls::sendMessage(_) => {
                self.simulations.fetch_add(1, Ordering::SeqCst);
                Self::check_write(&state, request.from, &call)?;
                Vec::new()
            }
            _ if self.fail_reads.load(Ordering::SeqCst) => {
                return Err(ChatError::Rpc("connection reset by peer".to_string()));
            }
            PulseChat::PulseChatCalls::isUsernameAvailable(c) => {
                (!state.username_taken(&c.username)).abi_encode()
            }
            PulseChat::PulseChatCalls::getLatestMessages(c) => {
                let count: usize = c.count.saturating_to();
                let skip = state.messages.len().saturating_sub(count);
                state.messages[skip..].to_vec().abi_encode()
            }
            PulseChat::PulseChatCalls::getTotalMessages(_) => {
                U256::from(state.messages.len()).abi_encode()
            }
            PulseChat::PulseChatCalls::getUserProfile(c) => match state.profiles.get(&c.user) {
                Some(p) => (
                    p.username.clone(),
                    p.signature.clone(),
                    p.avatar_url.clone(),
                    U256::from(p.registered_at),
                    true,
                )
                    .abi_encode_params(),
                None => (String::new(), String::new(), String::new(), U256::ZERO, false)
                    .abi_encode_params(),
            },
            PulseChat::PulseChatCalls::getAllUsers(_) => state.users.clone().abi_encode(),
        };

        Ok(output.into())
    }

    async fn submit(&self, request: &CallRequest) -> Result<B256> {
        let call = Self::decode(&request.input)?;
        self.submissions.fetch_add(1, Ordering::SeqCst);

        let (tx_hash, emitted) = {
            let mut state = self.state.lock();
            Self::check_write(&state, request.from, &call)
                .map_err(|e| ChatError::Submission(e.to_string()))?;
            let from = request.from.unwrap_or_default();

            let emitted = match call {
                PulseChat::PulseChatCalls::registerUser(c) => {
                    let registered_at = state.next_timestamp();
                    state.users.push(from);
                    state.profiles.insert(
                        from,
                        StoredProfile {
                            username: c.username,
                            signature: c.signature,
                            avatar_url: c.avatarUrl,
                            registered_at,
                        },
                    );
                    None
                }
                PulseChat::PulseChatCalls::sendMessage(c) => {
                    Some(Self::append_message(&mut state, from, &c.content))
                }
                _ => None,
            };

            state.nonce += 1;
            let tx_hash = keccak256(state.nonce.to_be_bytes());
            let outcome = TxOutcome {
                tx_hash,
                block_number: Some(state.block),
                success: true,
                contract_address: None,
            };
            state.receipts.insert(tx_hash, outcome);
            (tx_hash, emitted)
        };

        if let Some(message) = emitted {
            self.emit(&ChatMessage::from(message));
        }
        Ok(tx_hash)
    }

    async fn confirm(&self, tx_hash: B256, _confirmations: u64) -> Result<TxOutcome> {
        self.state
            .lock()
            .receipts
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| ChatError::Confirmation(format!("unknown transaction {}", tx_hash)))
    }

    async fn watch_logs(&self, _filter: Filter) -> Result<LogStream> {
        let (tx, rx) = unbounded();
        self.watchers.lock().push(tx);
        Ok(rx.boxed())
    }
}

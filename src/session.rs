use alloy::primitives::{Address, B256};
use std::future::Future;
use pulse_core::types::{now_secs, ChatMessage, UserProfile};
use pulse_core::validation::validate_message;
use pulse_core::Result;
use pulse_gateway::ChainGateway;
use pulse_store::{ChatStore, FeedView};
use pulse_sync::{SyncEvent, SyncHandle};
use tokio::select;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::commands::{Command, HELP};
use crate::console::Console;
use crate::directory::{load_directory, resolve_peer};
use crate::private_chat::PrivateChat;
use crate::profiles::ProfileCache;
use crate::render::{feed_header, private_line, public_line, sanitize, short_address};

/// Messages shown when the public feed is (re)drawn
const BACKLOG: usize = 20;

enum Mode {
    Public,
    Private(PrivateChat),
}

/// Interactive chat over stdin/stdout
pub struct Session {
    gateway: ChainGateway,
    store: ChatStore,
    profiles: ProfileCache,
    sync: SyncHandle,
    me: Address,
    mode: Mode,
    directory: Vec<UserProfile>,
    sending: bool,
    loaded: bool,
}

impl Session {
    pub fn new(gateway: ChainGateway, store: ChatStore, sync: SyncHandle, me: Address) -> Self {
        Self {
            profiles: ProfileCache::new(gateway.clone()),
            gateway,
            store,
            sync,
            me,
            mode: Mode::Public,
            directory: Vec::new(),
            sending: false,
            loaded: false,
        }
    }

    /// Drive the session until `/quit`, end of input or Ctrl-C. `events`
    /// should be subscribed before the synchronizer starts so the first poll
    /// is not missed.
    pub async fn run(
        self,
        console: &mut Console,
        events: broadcast::Receiver<SyncEvent>,
    ) -> std::io::Result<()> {
        let interrupted = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Interrupted");
        };
        self.run_until(console, events, interrupted).await
    }

    /// Same as [`run`](Self::run) but ends when `shutdown` resolves. The
    /// future is created once and polled across loop iterations.
    pub async fn run_until(
        mut self,
        console: &mut Console,
        mut events: broadcast::Receiver<SyncEvent>,
        shutdown: impl Future<Output = ()>,
    ) -> std::io::Result<()> {
        tokio::pin!(shutdown);
        let (sent_tx, mut sent_rx) = mpsc::channel::<Result<B256>>(1);

        println!("Connected as {}. Type /help for commands.", short_address(self.me));
        println!("Loading messages...");

        loop {
            select! {
                _ = &mut shutdown => break,

                line = console.next_line() => {
                    let Some(line) = line? else { break };
                    if !self.handle_line(&line, &sent_tx).await {
                        break;
                    }
                }

                event = events.recv() => match event {
                    Ok(event) => self.on_sync_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Display fell behind the feed, redrawing");
                        self.render_backlog().await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("Message sync ended");
                        break;
                    }
                },

                Some(result) = sent_rx.recv() => self.on_sent(result),
            }
        }

        self.sync.stop();
        Ok(())
    }

    /// Returns false when the session should end
    async fn handle_line(&mut self, line: &str, sent_tx: &mpsc::Sender<Result<B256>>) -> bool {
        let Some(command) = Command::parse(line) else {
            return true;
        };

        match command {
            Command::Quit => return false,
            Command::Help => println!("{}", HELP),
            Command::Refresh => {
                self.sync.request_refresh();
                println!("Refreshing...");
            }
            Command::Users => self.show_users().await,
            Command::Dm(target) => self.open_private(&target).await,
            Command::Close => self.close_private().await,
            Command::Say(text) => self.say(text, sent_tx),
            Command::Unknown(raw) => {
                println!("Unknown command {}. Type /help for commands.", sanitize(&raw))
            }
        }
        true
    }

    fn say(&mut self, text: String, sent_tx: &mpsc::Sender<Result<B256>>) {
        if let Mode::Private(chat) = &self.mode {
            match chat.send(&text) {
                Ok(message) => println!("{}", private_line(&message, chat.peer_name(), true, now_secs())),
                Err(e) => println!("Not sent: {}", e),
            }
            return;
        }

        if self.sending {
            println!("Still sending the previous message");
            return;
        }
        if let Err(e) = validate_message(&text) {
            println!("Not sent: {}", e);
            return;
        }

        self.sending = true;
        println!("Sending...");
        let gateway = self.gateway.clone();
        let sent_tx = sent_tx.clone();
        tokio::spawn(async move {
            let result = gateway.send_message(&text).await;
            let _ = sent_tx.send(result).await;
        });
    }

    fn on_sent(&mut self, result: Result<B256>) {
        self.sending = false;
        match result {
            Ok(tx_hash) => {
                debug!(tx_hash = ?tx_hash, "Message confirmed");
                println!("Message confirmed");
                self.sync.refresh_after_send();
            }
            Err(e) if e.is_transaction_failure() => println!("Transaction failed: {}", e),
            Err(e) => println!("Failed to send message: {}", e),
        }
    }

    async fn on_sync_event(&mut self, event: SyncEvent) {
        // the first poll (or its failure) draws the whole backlog, which
        // already holds any event that arrived before it
        if !self.loaded {
            if matches!(event, SyncEvent::Appended(_)) {
                return;
            }
            self.loaded = true;
            if matches!(self.mode, Mode::Public) {
                self.render_backlog().await;
            }
            return;
        }
        if !matches!(self.mode, Mode::Public) {
            return;
        }

        match event {
            SyncEvent::Refreshed { appended, .. } => {
                for message in &appended {
                    self.print_public(message).await;
                }
            }
            SyncEvent::Appended(message) => self.print_public(&message).await,
            SyncEvent::PollFailed => {}
        }
    }

    async fn print_public(&self, message: &ChatMessage) {
        let name = self.profiles.display_name(message.sender).await;
        println!("{}", public_line(message, &name, message.is_from(self.me), now_secs()));
    }

    async fn render_backlog(&self) {
        match self.store.feed.view() {
            FeedView::Loading => println!("Loading messages..."),
            FeedView::Empty => println!("No messages yet. Be the first to say hello!"),
            FeedView::Messages(messages) => {
                println!("-- {} --", feed_header(self.store.feed.total_on_chain()));
                let skip = messages.len().saturating_sub(BACKLOG);
                for message in &messages[skip..] {
                    self.print_public(message).await;
                }
            }
        }
    }

    async fn refresh_directory(&mut self) -> Result<()> {
        self.directory = load_directory(&self.gateway, &self.profiles).await?;
        debug!(members = self.directory.len(), cached = self.profiles.len(), "Directory refreshed");
        Ok(())
    }

    async fn show_users(&mut self) {
        if let Err(e) = self.refresh_directory().await {
            println!("Could not load users: {}", e);
            return;
        }

        println!("Members ({})", self.directory.len());
        if self.directory.is_empty() {
            println!("  No users yet");
        }
        for profile in &self.directory {
            let you = if profile.address == self.me { " (you)" } else { "" };
            let signature = profile.signature.as_deref().map(sanitize).unwrap_or_default();
            println!(
                "  [{}] {}{}  {}  {}",
                profile.initial(),
                sanitize(&profile.username),
                you,
                short_address(profile.address),
                signature
            );
        }
    }

    async fn open_private(&mut self, target: &str) {
        let mut peer = resolve_peer(target, &self.directory).or_else(|| self.profiles.find_by_username(target));
        if peer.is_none() && self.refresh_directory().await.is_ok() {
            peer = resolve_peer(target, &self.directory);
        }
        let Some(peer) = peer else {
            println!("No member named {}", sanitize(target));
            return;
        };
        if peer == self.me {
            println!("You cannot open a private chat with yourself");
            return;
        }

        let name = self.profiles.display_name(peer).await;
        let chat = PrivateChat::open(self.store.private.clone(), self.me, peer, name);
        println!(
            "-- Private chat with {} ({}), stored on this device only. /close to leave --",
            sanitize(chat.peer_name()),
            short_address(chat.peer())
        );

        let history = chat.history();
        if history.is_empty() {
            println!("No messages yet. Start the conversation!");
        }
        let now = now_secs();
        for message in &history {
            println!("{}", private_line(message, chat.peer_name(), chat.is_own(message), now));
        }
        self.mode = Mode::Private(chat);
    }

    async fn close_private(&mut self) {
        if let Mode::Private(chat) = std::mem::replace(&mut self.mode, Mode::Public) {
            println!("-- Left private chat with {} --", sanitize(chat.peer_name()));
            self.render_backlog().await;
        } else {
            println!("No private chat is open");
        }
    }
}

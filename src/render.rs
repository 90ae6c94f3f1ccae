//! Plain-text rendering for the terminal client.
//!
//! Message content comes from the chain and is untrusted: control characters
//! are stripped before anything reaches the terminal.

use alloy::primitives::Address;
use chrono::DateTime;
use pulse_core::types::{ChatMessage, PrivateMessage};

/// `0x1234...abcd`
pub fn short_address(address: Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// "just now", "5m ago", "3h ago", or a short date for anything older than a
/// day. Both arguments are Unix seconds.
pub fn relative_time(timestamp: u64, now: u64) -> String {
    let elapsed = now.saturating_sub(timestamp);
    match elapsed {
        0..=59 => "just now".to_string(),
        60..=3_599 => format!("{}m ago", elapsed / 60),
        3_600..=86_399 => format!("{}h ago", elapsed / 3_600),
        _ => DateTime::from_timestamp(timestamp as i64, 0)
            .map(|dt| dt.format("%b %-d").to_string())
            .unwrap_or_else(|| "long ago".to_string()),
    }
}

/// Drop control characters (including escape sequences' ESC byte) and fold
/// line breaks into spaces
pub fn sanitize(content: &str) -> String {
    content
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

pub fn public_line(message: &ChatMessage, sender_name: &str, own: bool, now: u64) -> String {
    format!(
        "[{}] {}{}: {}",
        relative_time(message.timestamp, now),
        sanitize(sender_name),
        if own { " (you)" } else { "" },
        sanitize(&message.content)
    )
}

/// Private messages carry millisecond timestamps
pub fn private_line(message: &PrivateMessage, peer_name: &str, own: bool, now: u64) -> String {
    let sender = if own { "you" } else { peer_name };
    format!(
        "[{}] {}: {}",
        relative_time(message.timestamp / 1_000, now),
        sanitize(sender),
        sanitize(&message.content)
    )
}

/// Header shown above the public feed
pub fn feed_header(total_on_chain: u64) -> String {
    match total_on_chain {
        1 => "1 message on-chain".to_string(),
        n => format!("{} messages on-chain", n),
    }
}

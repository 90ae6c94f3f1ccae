use alloy_primitives::Address;

use crate::contract::PulseChat::getUserProfileReturn;

/// Registered user profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub address: Address,
    pub username: String,
    pub signature: Option<String>,
    pub avatar_url: Option<String>,
    /// Seconds since Unix epoch
    pub registered_at: u64,
    pub is_registered: bool,
}

impl UserProfile {
    /// Build a profile from the named `getUserProfile` return values.
    /// Empty optional strings are normalised to `None`.
    pub fn from_return(address: Address, ret: getUserProfileReturn) -> Self {
        Self {
            address,
            username: ret.username,
            signature: non_empty(ret.signature),
            avatar_url: non_empty(ret.avatarUrl),
            registered_at: ret.registeredAt.saturating_to(),
            is_registered: ret.isRegistered,
        }
    }

    /// First letter of the username, used as an avatar placeholder
    pub fn initial(&self) -> char {
        self.username
            .chars()
            .next()
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('?')
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

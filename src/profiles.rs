use alloy::primitives::Address;
use dashmap::DashMap;
use pulse_core::types::UserProfile;
use pulse_gateway::ChainGateway;
use tracing::debug;

use crate::render::short_address;

/// Registered profiles seen so far, keyed by address.
///
/// Unregistered addresses and failed lookups are not cached, so a later
/// lookup retries.
pub struct ProfileCache {
    gateway: ChainGateway,
    profiles: DashMap<Address, UserProfile>,
}

impl ProfileCache {
    pub fn new(gateway: ChainGateway) -> Self {
        Self {
            gateway,
            profiles: DashMap::new(),
        }
    }

    pub fn get(&self, address: Address) -> Option<UserProfile> {
        self.profiles.get(&address).map(|p| p.clone())
    }

    pub fn insert(&self, profile: UserProfile) {
        if profile.is_registered {
            self.profiles.insert(profile.address, profile);
        }
    }

    /// Cached profile, fetching it on a miss
    pub async fn resolve(&self, address: Address) -> Option<UserProfile> {
        if let Some(profile) = self.get(address) {
            return Some(profile);
        }

        match self.gateway.get_user_profile(address).await {
            Ok(profile) if profile.is_registered => {
                self.insert(profile.clone());
                Some(profile)
            }
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, address = ?address, "Profile lookup failed");
                None
            }
        }
    }

    /// Username if registered, otherwise the short address
    pub async fn display_name(&self, address: Address) -> String {
        self.resolve(address)
            .await
            .map(|p| p.username)
            .unwrap_or_else(|| short_address(address))
    }

    /// Case-insensitive username lookup among cached profiles
    pub fn find_by_username(&self, username: &str) -> Option<Address> {
        let wanted = username.trim().trim_start_matches('@');
        self.profiles
            .iter()
            .find(|entry| entry.username.eq_ignore_ascii_case(wanted))
            .map(|entry| *entry.key())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }
}

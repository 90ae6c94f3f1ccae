use alloy::primitives::Address;
use futures::stream::{self, StreamExt};
use pulse_core::types::UserProfile;
use pulse_core::Result;
use pulse_gateway::ChainGateway;
use tracing::debug;

use crate::profiles::ProfileCache;

/// Concurrent profile lookups while loading the directory
const PROFILE_CONCURRENCY: usize = 8;

/// Every registered user with their profile, ordered by username
pub async fn load_directory(gateway: &ChainGateway, profiles: &ProfileCache) -> Result<Vec<UserProfile>> {
    let users = gateway.get_all_users().await?;

    let mut entries: Vec<UserProfile> = stream::iter(users.iter().copied())
        .map(|address| profiles.resolve(address))
        .buffer_unordered(PROFILE_CONCURRENCY)
        .filter_map(|profile| async move { profile })
        .collect()
        .await;
    entries.sort_by_key(|p| p.username.to_lowercase());

    debug!(users = users.len(), profiles = entries.len(), "User directory loaded");
    Ok(entries)
}

/// Resolve `/dm` input: a full address, or a username from the directory
pub fn resolve_peer(input: &str, directory: &[UserProfile]) -> Option<Address> {
    let input = input.trim();
    if let Ok(address) = input.parse::<Address>() {
        return Some(address);
    }

    let username = input.trim_start_matches('@');
    directory
        .iter()
        .find(|p| p.username.eq_ignore_ascii_case(username))
        .map(|p| p.address)
}

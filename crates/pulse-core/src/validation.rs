//! Client-side input limits, checked before any transaction is attempted.

use crate::error::{ChatError, Result};

pub const MAX_MESSAGE_CHARS: usize = 1000;
pub const MIN_USERNAME_CHARS: usize = 2;
pub const MAX_USERNAME_CHARS: usize = 50;
pub const MAX_SIGNATURE_CHARS: usize = 200;

/// Validate a public message body
pub fn validate_message(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(ChatError::InvalidInput("Message is empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::InvalidInput(format!(
            "Message is too long (max {} characters)",
            MAX_MESSAGE_CHARS
        )));
    }
    Ok(())
}

/// Validate a username before checking availability or registering
pub fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(ChatError::InvalidInput("Username is required".to_string()));
    }
    let len = username.chars().count();
    if len < MIN_USERNAME_CHARS {
        return Err(ChatError::InvalidInput(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_CHARS
        )));
    }
    if len > MAX_USERNAME_CHARS {
        return Err(ChatError::InvalidInput(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_CHARS
        )));
    }
    Ok(())
}

/// Validate the optional profile signature line
pub fn validate_signature(signature: &str) -> Result<()> {
    if signature.chars().count() > MAX_SIGNATURE_CHARS {
        return Err(ChatError::InvalidInput(format!(
            "Signature must be at most {} characters",
            MAX_SIGNATURE_CHARS
        )));
    }
    Ok(())
}

//! Token generation and masking
//!
//! Tokens are lowercase hex strings built from OS randomness. Masking is for
//! diagnostic output only; audit records never carry token text at all.

use rand::rngs::OsRng;
use rand::RngCore;

/// Default generated token length in characters
pub const DEFAULT_TOKEN_LENGTH: usize = 64;

/// Shortest token `generate_token` will produce
pub const MIN_TOKEN_LENGTH: usize = 16;

const MASK: &str = "********";

/// Error type for token generation
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum TokenError {
    /// Requested length is odd or below the minimum
    #[error("Token length must be an even number of at least 16, got {0}")]
    InvalidLength(usize),
}

/// Generate a new random token of `length` hex characters
///
/// # Example
///
/// ```
/// use token_gate::auth::token::generate_token;
///
/// let token = generate_token(64).unwrap();
/// assert_eq!(token.len(), 64);
/// ```
pub fn generate_token(length: usize) -> Result<String, TokenError> {
    if length < MIN_TOKEN_LENGTH || length % 2 != 0 {
        return Err(TokenError::InvalidLength(length));
    }

    let mut bytes = vec![0u8; length / 2];
    OsRng.fill_bytes(&mut bytes);
    Ok(hex::encode(bytes))
}

/// Mask a token for display
///
/// Shows the first and last four characters; tokens of eight characters or
/// fewer are fully masked.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return MASK.to_string();
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, MASK, tail)
}

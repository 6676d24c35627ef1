//! Family invite codes
//!
//! Six symbols drawn from a 32-symbol alphabet that leaves out the visually
//! ambiguous `I`, `O`, `0` and `1`. Codes are compared upper-case, so user
//! input is normalized before lookup.

use crate::error::ModelError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Symbols an invite code may contain
pub const INVITE_CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Number of symbols in an invite code
pub const INVITE_CODE_LEN: usize = 6;

/// A validated, upper-case invite code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InviteCode(String);

impl InviteCode {
    /// Generate a fresh code from the given random source
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..INVITE_CODE_LEN)
            .map(|_| {
                let idx = rng.random_range(0..INVITE_CODE_ALPHABET.len());
                char::from(INVITE_CODE_ALPHABET[idx])
            })
            .collect();
        Self(code)
    }

    /// Generate a fresh code from the thread-local random source
    #[must_use]
    pub fn random() -> Self {
        Self::generate(&mut rand::rng())
    }

    /// Normalize user input the way lookups do: trimmed and upper-cased
    #[inline]
    #[must_use]
    pub fn normalize(input: &str) -> String {
        input.trim().to_uppercase()
    }

    /// Parse user input into a code
    ///
    /// # Errors
    /// - `ModelError::InvalidInviteCode` if the normalized input has the wrong
    ///   length or contains a symbol outside the alphabet
    pub fn parse(input: &str) -> Result<Self, ModelError> {
        let normalized = Self::normalize(input);
        let well_formed = normalized.len() == INVITE_CODE_LEN
            && normalized.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b));
        if well_formed {
            Ok(Self(normalized))
        } else {
            Err(ModelError::InvalidInviteCode { input: normalized })
        }
    }

    /// Borrow the code text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for InviteCode {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for InviteCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

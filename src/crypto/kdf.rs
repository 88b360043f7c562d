//! Master-key derivation.
//!
//! Turns the master password plus the per-installation salt into the 32-byte
//! symmetric key protecting everything else. PBKDF2-HMAC-SHA512 with a fixed
//! iteration count: deterministic and expensive by design, so the same
//! password always re-derives the same key and brute-forcing guesses stays
//! costly.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha512;
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::errors::VaultError;
use crate::crypto::{KEY_LEN, SALT_LEN};

/// PBKDF2 iteration count. Fixed; changing it invalidates every existing vault.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

pub struct KeyDerivation {
    iterations: u32,
}

impl KeyDerivation {
    pub fn new() -> Self {
        Self { iterations: PBKDF2_ITERATIONS }
    }

    /// Reduced-cost instance for tests that exercise the surrounding logic.
    #[cfg(test)]
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Derive the 32-byte master key from a password and a 16-byte salt.
    ///
    /// Total over well-formed inputs; a salt of the wrong length is a caller
    /// bug surfaced as `InvalidInput` rather than a panic.
    pub fn derive(&self, password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, VaultError> {
        if salt.len() != SALT_LEN {
            return Err(VaultError::InvalidInput(format!(
                "salt must be {} bytes, got {}",
                SALT_LEN,
                salt.len()
            )));
        }

        debug!(iterations = self.iterations, "deriving master key");
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        pbkdf2_hmac::<Sha512>(password.as_bytes(), salt, self.iterations, key.as_mut());
        Ok(key)
    }

    /// Generate a fresh 16-byte salt from the OS CSPRNG.
    pub fn generate_salt() -> [u8; SALT_LEN] {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        salt
    }
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self::new()
    }
}

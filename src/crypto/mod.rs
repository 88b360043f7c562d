pub mod cipher;
pub mod kdf;

pub use self::cipher::{AuthenticatedCipher, EncryptedBlob};
pub use self::kdf::KeyDerivation;

/// Symmetric key length used everywhere in the vault (AES-256).
pub const KEY_LEN: usize = 32;

/// Per-installation salt length.
pub const SALT_LEN: usize = 16;

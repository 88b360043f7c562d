use std::fmt;

/// Custom error type for vault operations.
#[derive(Debug)]
pub enum VaultError {
    /// Wrong master password at unlock (or unlock attempts exhausted).
    AuthenticationFailed,
    /// Operation attempted while the vault is locked.
    NotAuthenticated,
    /// Authenticated-decryption failure on a blob. Wrong key and corrupted
    /// storage are indistinguishable by design.
    Integrity,
    /// Mnemonic failed word-list/checksum validation.
    InvalidMnemonic(String),
    /// Account index outside the wallet's account list.
    IndexOutOfRange { index: usize, len: usize },
    /// Wallet/account/transaction id absent.
    NotFound(String),
    /// Filesystem failure.
    StorageIo(String),
    /// Chain collaborator failure. Recoverable: discovery downgrades it to an
    /// "inactive" classification instead of aborting.
    ChainQuery(String),
    /// Caller programming error (malformed salt, empty account list, ...).
    InvalidInput(String),
    /// Serialization/deserialization failure.
    Serialization(String),
    /// Operation cancelled by the caller before completion.
    Cancelled,
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Deliberately uniform: reveals nothing about whether stored data
            // exists or is merely unreadable.
            VaultError::AuthenticationFailed => write!(f, "Authentication failed"),
            VaultError::NotAuthenticated => write!(f, "Vault is locked"),
            VaultError::Integrity => write!(f, "Integrity check failed"),
            VaultError::InvalidMnemonic(msg) => write!(f, "Invalid mnemonic: {}", msg),
            VaultError::IndexOutOfRange { index, len } => {
                write!(f, "Account index {} out of range (wallet has {} accounts)", index, len)
            }
            VaultError::NotFound(msg) => write!(f, "Not found: {}", msg),
            VaultError::StorageIo(msg) => write!(f, "Storage error: {}", msg),
            VaultError::ChainQuery(msg) => write!(f, "Chain query error: {}", msg),
            VaultError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            VaultError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            VaultError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl std::error::Error for VaultError {}

impl VaultError {
    /// Whether the fault may be transient and safely retried or downgraded
    /// (probe errors during discovery fall in this bucket).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VaultError::ChainQuery(_))
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        VaultError::StorageIo(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        VaultError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for VaultError {
    fn from(err: anyhow::Error) -> Self {
        VaultError::ChainQuery(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_failure_is_uniform() {
        // Neither message may hint at what is stored.
        let msg = format!("{}", VaultError::AuthenticationFailed);
        assert_eq!(msg, "Authentication failed");
        let msg = format!("{}", VaultError::Integrity);
        assert_eq!(msg, "Integrity check failed");
    }

    #[test]
    fn test_display_index_out_of_range() {
        let err = VaultError::IndexOutOfRange { index: 7, len: 1 };
        assert_eq!(format!("{}", err), "Account index 7 out of range (wallet has 1 accounts)");
    }

    #[test]
    fn test_recoverability() {
        assert!(VaultError::ChainQuery("rpc timeout".into()).is_recoverable());
        assert!(!VaultError::Integrity.is_recoverable());
        assert!(!VaultError::StorageIo("disk full".into()).is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: VaultError = io.into();
        assert!(matches!(err, VaultError::StorageIo(_)));
    }

    #[test]
    fn test_from_anyhow() {
        let err: VaultError = anyhow::anyhow!("provider down").into();
        match err {
            VaultError::ChainQuery(msg) => assert_eq!(msg, "provider down"),
            _ => panic!("Expected ChainQuery variant"),
        }
    }
}

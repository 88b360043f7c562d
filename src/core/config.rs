use serde::{Deserialize, Serialize};

/// Process-wide vault settings, stored as plaintext `config.json`.
///
/// Loaded once at startup (defaults if the file is absent) and written back
/// immediately on every mutation, never batched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VaultConfig {
    #[serde(default = "VaultConfig::default_network")]
    pub default_network: String,

    #[serde(default = "VaultConfig::default_auto_save")]
    pub auto_save: bool,

    #[serde(default = "VaultConfig::default_encryption_enabled")]
    pub encryption_enabled: bool,
}

impl VaultConfig {
    fn default_network() -> String {
        "eth".to_string()
    }

    fn default_auto_save() -> bool {
        true
    }

    fn default_encryption_enabled() -> bool {
        true
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            default_network: Self::default_network(),
            auto_save: Self::default_auto_save(),
            encryption_enabled: Self::default_encryption_enabled(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.default_network, "eth");
        assert!(config.auto_save);
        assert!(config.encryption_enabled);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: VaultConfig = serde_json::from_str(r#"{"default_network":"sepolia"}"#).unwrap();
        assert_eq!(config.default_network, "sepolia");
        assert!(config.auto_save);
    }
}

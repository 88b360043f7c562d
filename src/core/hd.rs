//! HD account derivation.
//!
//! Derives per-index key material from a mnemonic along the fixed BIP44 path
//! `m/44'/60'/0'/0/{index}`. Pure in (mnemonic, index): the same pair always
//! yields the same material, across calls and process restarts. Rediscovering
//! a wallet from its mnemonic alone depends on this.

use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::signers::{coins_bip39::English, MnemonicBuilder, Signer};
use secrecy::{ExposeSecret, Secret};
use tracing::debug;
use zeroize::Zeroizing;

use crate::core::errors::VaultError;

/// BIP44 path for the given address index.
pub fn derivation_path(index: u32) -> String {
    format!("m/44'/60'/0'/0/{}", index)
}

/// In-memory private key (32 bytes). Zeroized on drop, hidden from Debug.
pub struct PrivateKey(Secret<[u8; 32]>);

impl PrivateKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self(Secret::new(key))
    }

    /// Scoped access to the raw bytes, so callers cannot accidentally hold
    /// on to secret material outside a small closure.
    pub fn with_secret<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8; 32]) -> R,
    {
        f(self.0.expose_secret())
    }

    /// Hex encoding for sealing into an `EncryptedBlob`. The returned buffer
    /// zeroizes itself on drop.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.expose_secret()))
    }
}

/// Key material for one derived account.
pub struct DerivedAccount {
    pub index: u32,
    pub address: String,
    pub public_key: String,
    pub private_key: PrivateKey,
}

pub struct HdDeriver;

impl HdDeriver {
    pub fn new() -> Self {
        Self
    }

    /// Validate a mnemonic without deriving anything: canonical word list,
    /// correct checksum, 12 or 24 words.
    pub fn validate_mnemonic(&self, phrase: &str) -> Result<(), VaultError> {
        let mnemonic = bip39::Mnemonic::parse(phrase)
            .map_err(|e| VaultError::InvalidMnemonic(e.to_string()))?;
        let words = mnemonic.word_count();
        if words != 12 && words != 24 {
            return Err(VaultError::InvalidMnemonic(format!(
                "expected 12 or 24 words, got {}",
                words
            )));
        }
        Ok(())
    }

    /// Derive the account at `index` along `m/44'/60'/0'/0/{index}`.
    pub fn derive(&self, phrase: &str, index: u32) -> Result<DerivedAccount, VaultError> {
        self.validate_mnemonic(phrase)?;

        let path = derivation_path(index);
        debug!(%path, "deriving account");

        let wallet = MnemonicBuilder::<English>::default()
            .phrase(phrase)
            .derivation_path(&path)
            .map_err(|e| VaultError::InvalidMnemonic(e.to_string()))?
            .build()
            .map_err(|e| VaultError::InvalidMnemonic(e.to_string()))?;

        let signer = wallet.signer();
        let private_key: [u8; 32] = signer.to_bytes().into();
        let public_key = hex::encode(signer.verifying_key().to_encoded_point(true).as_bytes());
        let address = format!("{:?}", wallet.address());

        Ok(DerivedAccount {
            index,
            address,
            public_key,
            private_key: PrivateKey::new(private_key),
        })
    }
}

impl Default for HdDeriver {
    fn default() -> Self {
        Self::new()
    }
}

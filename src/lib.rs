//! Encrypted at-rest vault for EVM HD wallets.
//!
//! A master password unlocks a per-directory vault holding sealed wallet
//! records (mnemonics, derived private keys) and a transaction log. On top of
//! the vault sit HD derivation along `m/44'/60'/0'/0/{index}` and an account
//! discovery scan that rebuilds a wallet's used accounts from its mnemonic
//! plus on-chain activity.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hd_vault::{Vault, WalletStore};
//!
//! # fn main() -> Result<(), hd_vault::VaultError> {
//! let vault = Arc::new(Vault::new("/home/me/.hd-vault")?);
//! vault.unlock("master password")?;
//!
//! let store = WalletStore::new(Arc::clone(&vault));
//! for wallet in store.list_wallets()? {
//!     println!("{} ({} accounts)", wallet.name, wallet.accounts.len());
//! }
//! vault.lock();
//! # Ok(())
//! # }
//! ```

pub mod blockchain;
pub mod core;
pub mod crypto;
pub mod storage;

pub use crate::blockchain::ChainClient;
pub use crate::core::config::VaultConfig;
pub use crate::core::discovery::{AccountDiscovery, DiscoveredAccount, DiscoveryPolicy};
pub use crate::core::errors::VaultError;
pub use crate::core::hd::HdDeriver;
pub use crate::core::models::{
    Account, TransactionRecord, TransferKind, TxStatus, UserProfile, Wallet,
};
pub use crate::core::store::{DecryptedWallet, WalletStore};
pub use crate::crypto::EncryptedBlob;
pub use crate::storage::Vault;

//! Wallet data model.
//!
//! Typed records for everything the vault persists. Invariants are enforced
//! at construction (account index matches its derivation path, current
//! account pointer stays valid) rather than re-checked at every call site.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::VaultError;
use crate::core::hd::derivation_path;
use crate::crypto::EncryptedBlob;

/// One derived key pair belonging to a wallet.
///
/// `index` equals the BIP44 address-index component of `derivation_path`;
/// indices within a wallet are contiguous from 0 (appended, never sparse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub index: u32,
    pub address: String,
    pub public_key: String,
    pub encrypted_private_key: EncryptedBlob,
    pub derivation_path: String,
    /// Cached on-chain snapshots from discovery; advisory only.
    pub balance: Option<String>,
    pub tx_count: Option<u64>,
}

impl Account {
    /// Build an account, deriving the path from the index so the two cannot
    /// disagree.
    pub fn new(
        index: u32,
        address: String,
        public_key: String,
        encrypted_private_key: EncryptedBlob,
    ) -> Self {
        Self {
            index,
            address,
            public_key,
            encrypted_private_key,
            derivation_path: derivation_path(index),
            balance: None,
            tx_count: None,
        }
    }

    pub fn with_snapshot(mut self, balance: String, tx_count: u64) -> Self {
        self.balance = Some(balance);
        self.tx_count = Some(tx_count);
        self
    }
}

/// A wallet aggregate: one sealed mnemonic plus its derived accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub name: String,
    pub encrypted_mnemonic: EncryptedBlob,
    pub network: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub accounts: Vec<Account>,
    pub current_account_index: usize,
}

impl Wallet {
    pub fn new(
        name: &str,
        network: &str,
        encrypted_mnemonic: EncryptedBlob,
        accounts: Vec<Account>,
    ) -> Result<Self, VaultError> {
        if accounts.is_empty() {
            return Err(VaultError::InvalidInput("wallet needs at least one account".into()));
        }
        for (pos, account) in accounts.iter().enumerate() {
            if account.index as usize != pos {
                return Err(VaultError::InvalidInput(format!(
                    "account indices must be contiguous from 0, found {} at position {}",
                    account.index, pos
                )));
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            encrypted_mnemonic,
            network: network.to_string(),
            created_at: now,
            last_used: now,
            accounts,
            current_account_index: 0,
        })
    }

    pub fn current_account(&self) -> &Account {
        // current_account_index is validated on every mutation
        &self.accounts[self.current_account_index]
    }

    pub fn touch(&mut self) {
        self.last_used = Utc::now();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Send,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// One entry in the append-only transaction log.
///
/// `wallet_id` is a relation, not ownership: it dangles harmlessly if the
/// wallet is later deleted. Records are immutable after creation except for
/// the single allowed status transition (pending to confirmed or failed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub wallet_id: String,
    pub kind: TransferKind,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub network: String,
    pub gas_used: Option<String>,
    pub gas_price: Option<String>,
    pub block_number: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub status: TxStatus,
}

impl TransactionRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallet_id: &str,
        kind: TransferKind,
        hash: &str,
        from: &str,
        to: &str,
        amount: &str,
        network: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            wallet_id: wallet_id.to_string(),
            kind,
            hash: hash.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.to_string(),
            network: network.to_string(),
            gas_used: None,
            gas_price: None,
            block_number: None,
            timestamp: Utc::now(),
            status: TxStatus::Pending,
        }
    }

    pub fn with_receipt(mut self, gas_used: &str, gas_price: &str, block_number: u64) -> Self {
        self.gas_used = Some(gas_used.to_string());
        self.gas_price = Some(gas_price.to_string());
        self.block_number = Some(block_number);
        self
    }
}

/// Plaintext profile metadata stored in `user.json`. Not part of the vault's
/// trust boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(username: &str) -> Self {
        Self { username: username.to_string(), created_at: Utc::now() }
    }
}

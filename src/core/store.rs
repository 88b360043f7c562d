//! Wallet and transaction CRUD over the sealed collections.
//!
//! Every mutation is read-modify-write on the whole collection: load, change,
//! seal, replace the file. The store holds no cache, so concurrent stores over
//! the same directory see each other's writes on the next load.

use std::sync::Arc;

use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::core::discovery::DiscoveredAccount;
use crate::core::errors::VaultError;
use crate::core::hd::HdDeriver;
use crate::core::models::{Account, TransactionRecord, TxStatus, Wallet};
use crate::storage::Vault;

/// Plaintext secrets revealed by `decrypt`. Both buffers zeroize on drop.
pub struct DecryptedWallet {
    pub mnemonic: Zeroizing<String>,
    /// Hex private key of the wallet's current account.
    pub private_key: Zeroizing<String>,
}

pub struct WalletStore {
    vault: Arc<Vault>,
    deriver: HdDeriver,
}

impl WalletStore {
    pub fn new(vault: Arc<Vault>) -> Self {
        Self { vault, deriver: HdDeriver::new() }
    }

    /// Create a single-account wallet from a mnemonic. Account 0 is derived
    /// and selected; the mnemonic and private key are sealed before anything
    /// touches disk.
    pub fn create(&self, name: &str, network: &str, mnemonic: &str) -> Result<Wallet, VaultError> {
        self.deriver.validate_mnemonic(mnemonic)?;
        let account = self.derive_sealed(mnemonic, 0)?;
        self.insert_wallet(name, network, mnemonic, vec![account])
    }

    /// Create a wallet from a discovery result: one stored account per
    /// discovered index, snapshots included, current account left at 0.
    pub fn create_multi_account(
        &self,
        name: &str,
        network: &str,
        mnemonic: &str,
        discovered: &[DiscoveredAccount],
    ) -> Result<Wallet, VaultError> {
        if discovered.is_empty() {
            return Err(VaultError::InvalidInput(
                "discovery result is empty, create a fresh wallet instead".into(),
            ));
        }
        self.deriver.validate_mnemonic(mnemonic)?;

        let mut accounts = Vec::with_capacity(discovered.len());
        for found in discovered {
            let sealed_key = self.vault.seal_secret(&found.account.private_key.to_hex())?;
            let account = Account::new(
                found.account.index,
                found.account.address.clone(),
                found.account.public_key.clone(),
                sealed_key,
            )
            .with_snapshot(found.balance.to_string(), found.tx_count);
            accounts.push(account);
        }
        self.insert_wallet(name, network, mnemonic, accounts)
    }

    /// Derive the next account (index = current count) from the wallet's own
    /// sealed mnemonic and append it.
    pub fn append_account(&self, wallet_id: &str) -> Result<Account, VaultError> {
        let mut wallets = self.vault.load_wallets()?;
        let wallet = find_mut(&mut wallets, wallet_id)?;

        let mnemonic = self.vault.open_secret(&wallet.encrypted_mnemonic)?;
        let next_index = wallet.accounts.len() as u32;
        let account = self.derive_sealed(&mnemonic, next_index)?;

        wallet.accounts.push(account.clone());
        wallet.touch();
        info!(wallet_id, index = next_index, "appended account");
        self.vault.save_wallets(&wallets)?;
        Ok(account)
    }

    /// Point the wallet at another of its accounts.
    pub fn switch_current_account(&self, wallet_id: &str, index: usize) -> Result<(), VaultError> {
        let mut wallets = self.vault.load_wallets()?;
        let wallet = find_mut(&mut wallets, wallet_id)?;

        if index >= wallet.accounts.len() {
            return Err(VaultError::IndexOutOfRange { index, len: wallet.accounts.len() });
        }
        wallet.current_account_index = index;
        wallet.touch();
        self.vault.save_wallets(&wallets)
    }

    /// Reveal the wallet's mnemonic and its current account's private key.
    pub fn decrypt(&self, wallet_id: &str) -> Result<DecryptedWallet, VaultError> {
        let wallet = self.get_wallet(wallet_id)?;
        let mnemonic = self.vault.open_secret(&wallet.encrypted_mnemonic)?;
        let private_key = self
            .vault
            .open_secret(&wallet.current_account().encrypted_private_key)?;
        Ok(DecryptedWallet { mnemonic, private_key })
    }

    /// Remove a wallet. Returns whether anything was deleted; the transaction
    /// log keeps its records either way.
    pub fn delete(&self, wallet_id: &str) -> Result<bool, VaultError> {
        let mut wallets = self.vault.load_wallets()?;
        let before = wallets.len();
        wallets.retain(|w| w.id != wallet_id);
        if wallets.len() == before {
            return Ok(false);
        }
        self.vault.save_wallets(&wallets)?;
        info!(wallet_id, "deleted wallet");
        Ok(true)
    }

    pub fn list_wallets(&self) -> Result<Vec<Wallet>, VaultError> {
        self.vault.load_wallets()
    }

    pub fn get_wallet(&self, wallet_id: &str) -> Result<Wallet, VaultError> {
        self.vault
            .load_wallets()?
            .into_iter()
            .find(|w| w.id == wallet_id)
            .ok_or_else(|| VaultError::NotFound(format!("wallet {}", wallet_id)))
    }

    // Transaction log.

    pub fn record_transaction(&self, record: TransactionRecord) -> Result<(), VaultError> {
        let mut records = self.vault.load_transactions()?;
        debug!(id = %record.id, wallet_id = %record.wallet_id, "recording transaction");
        records.push(record);
        self.vault.save_transactions(&records)
    }

    /// All records, or only those of one wallet, oldest first.
    pub fn list_transactions(
        &self,
        wallet_id: Option<&str>,
    ) -> Result<Vec<TransactionRecord>, VaultError> {
        let records = self.vault.load_transactions()?;
        Ok(match wallet_id {
            Some(id) => records.into_iter().filter(|r| r.wallet_id == id).collect(),
            None => records,
        })
    }

    /// Settle a pending record. A record settles exactly once; asking for a
    /// second transition (or for `Pending`) is a caller error.
    pub fn update_transaction_status(
        &self,
        tx_id: &str,
        status: TxStatus,
    ) -> Result<(), VaultError> {
        if status == TxStatus::Pending {
            return Err(VaultError::InvalidInput("cannot transition back to pending".into()));
        }
        let mut records = self.vault.load_transactions()?;
        let record = records
            .iter_mut()
            .find(|r| r.id == tx_id)
            .ok_or_else(|| VaultError::NotFound(format!("transaction {}", tx_id)))?;
        if record.status != TxStatus::Pending {
            return Err(VaultError::InvalidInput(format!(
                "transaction {} already settled",
                tx_id
            )));
        }
        record.status = status;
        self.vault.save_transactions(&records)
    }

    fn derive_sealed(&self, mnemonic: &str, index: u32) -> Result<Account, VaultError> {
        let derived = self.deriver.derive(mnemonic, index)?;
        let sealed_key = self.vault.seal_secret(&derived.private_key.to_hex())?;
        Ok(Account::new(derived.index, derived.address, derived.public_key, sealed_key))
    }

    fn insert_wallet(
        &self,
        name: &str,
        network: &str,
        mnemonic: &str,
        accounts: Vec<Account>,
    ) -> Result<Wallet, VaultError> {
        let mut wallets = self.vault.load_wallets()?;
        if wallets.iter().any(|w| w.name == name) {
            return Err(VaultError::InvalidInput(format!("wallet name '{}' already in use", name)));
        }

        let sealed_mnemonic = self.vault.seal_secret(mnemonic)?;
        let wallet = Wallet::new(name, network, sealed_mnemonic, accounts)?;
        wallets.push(wallet.clone());
        self.vault.save_wallets(&wallets)?;
        info!(id = %wallet.id, name, accounts = wallet.accounts.len(), "created wallet");
        Ok(wallet)
    }
}

fn find_mut<'a>(wallets: &'a mut [Wallet], wallet_id: &str) -> Result<&'a mut Wallet, VaultError> {
    wallets
        .iter_mut()
        .find(|w| w.id == wallet_id)
        .ok_or_else(|| VaultError::NotFound(format!("wallet {}", wallet_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hd::derivation_path;
    use crate::core::models::TransferKind;
    use crate::crypto::KeyDerivation;
    use ethers::types::U256;
    use tempfile::TempDir;

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn open_store() -> (TempDir, WalletStore) {
        let dir = TempDir::new().unwrap();
        let vault = Vault::with_kdf(dir.path(), KeyDerivation::with_iterations(10)).unwrap();
        vault.unlock("pw").unwrap();
        (dir, WalletStore::new(Arc::new(vault)))
    }

    #[test]
    fn test_create_and_get() {
        let (_dir, store) = open_store();
        let wallet = store.create("main", "eth", TEST_MNEMONIC).unwrap();

        let loaded = store.get_wallet(&wallet.id).unwrap();
        assert_eq!(loaded.name, "main");
        assert_eq!(loaded.accounts.len(), 1);
        assert_eq!(loaded.current_account().index, 0);
        assert_eq!(
            loaded.current_account().address,
            "0x9858effd232b4033e47d90003d41ec34ecaeda94"
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (_dir, store) = open_store();
        store.create("main", "eth", TEST_MNEMONIC).unwrap();
        assert!(matches!(
            store.create("main", "eth", TEST_MNEMONIC),
            Err(VaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_create_multi_account_rejects_empty() {
        let (_dir, store) = open_store();
        let result = store.create_multi_account("found", "eth", TEST_MNEMONIC, &[]);
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_create_multi_account_keeps_snapshots() {
        let (_dir, store) = open_store();
        let deriver = HdDeriver::new();
        let discovered: Vec<DiscoveredAccount> = (0..2)
            .map(|i| DiscoveredAccount {
                account: deriver.derive(TEST_MNEMONIC, i).unwrap(),
                active: true,
                balance: U256::from(500u64),
                tx_count: 4,
            })
            .collect();

        let wallet = store
            .create_multi_account("found", "eth", TEST_MNEMONIC, &discovered)
            .unwrap();
        assert_eq!(wallet.accounts.len(), 2);
        assert_eq!(wallet.current_account_index, 0);
        assert_eq!(wallet.accounts[1].balance.as_deref(), Some("500"));
        assert_eq!(wallet.accounts[1].tx_count, Some(4));
    }

    #[test]
    fn test_append_account_extends_chain() {
        let (_dir, store) = open_store();
        let wallet = store.create("main", "eth", TEST_MNEMONIC).unwrap();

        let account = store.append_account(&wallet.id).unwrap();
        assert_eq!(account.index, 1);
        assert_eq!(account.derivation_path, derivation_path(1));

        let loaded = store.get_wallet(&wallet.id).unwrap();
        assert_eq!(loaded.accounts.len(), 2);
        // appended address matches direct derivation
        let expected = HdDeriver::new().derive(TEST_MNEMONIC, 1).unwrap().address;
        assert_eq!(loaded.accounts[1].address, expected);
    }

    #[test]
    fn test_switch_current_account() {
        let (_dir, store) = open_store();
        let wallet = store.create("main", "eth", TEST_MNEMONIC).unwrap();
        store.append_account(&wallet.id).unwrap();

        store.switch_current_account(&wallet.id, 1).unwrap();
        assert_eq!(store.get_wallet(&wallet.id).unwrap().current_account().index, 1);
    }

    #[test]
    fn test_switch_out_of_range() {
        let (_dir, store) = open_store();
        let wallet = store.create("main", "eth", TEST_MNEMONIC).unwrap();
        let result = store.switch_current_account(&wallet.id, 7);
        assert!(matches!(result, Err(VaultError::IndexOutOfRange { index: 7, len: 1 })));
    }

    #[test]
    fn test_decrypt_reveals_secrets() {
        let (_dir, store) = open_store();
        let wallet = store.create("main", "eth", TEST_MNEMONIC).unwrap();

        let secrets = store.decrypt(&wallet.id).unwrap();
        assert_eq!(secrets.mnemonic.as_str(), TEST_MNEMONIC);

        let expected = HdDeriver::new().derive(TEST_MNEMONIC, 0).unwrap();
        assert_eq!(secrets.private_key.as_str(), expected.private_key.to_hex().as_str());
    }

    #[test]
    fn test_delete_is_reported_once() {
        let (_dir, store) = open_store();
        let wallet = store.create("main", "eth", TEST_MNEMONIC).unwrap();
        assert!(store.delete(&wallet.id).unwrap());
        assert!(!store.delete(&wallet.id).unwrap());
        assert!(matches!(store.get_wallet(&wallet.id), Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_transaction_log_filtering() {
        let (_dir, store) = open_store();
        let wallet = store.create("main", "eth", TEST_MNEMONIC).unwrap();

        let record =
            TransactionRecord::new(&wallet.id, TransferKind::Send, "0xh1", "0xa", "0xb", "1", "eth");
        store.record_transaction(record).unwrap();
        let other =
            TransactionRecord::new("other-wallet", TransferKind::Send, "0xh2", "0xc", "0xd", "2", "eth");
        store.record_transaction(other).unwrap();

        assert_eq!(store.list_transactions(None).unwrap().len(), 2);
        let mine = store.list_transactions(Some(&wallet.id)).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].hash, "0xh1");
    }

    #[test]
    fn test_transaction_settles_exactly_once() {
        let (_dir, store) = open_store();
        let record =
            TransactionRecord::new("wid", TransferKind::Send, "0xh", "0xa", "0xb", "1", "eth");
        let id = record.id.clone();
        store.record_transaction(record).unwrap();

        store.update_transaction_status(&id, TxStatus::Confirmed).unwrap();
        assert_eq!(store.list_transactions(None).unwrap()[0].status, TxStatus::Confirmed);

        assert!(matches!(
            store.update_transaction_status(&id, TxStatus::Failed),
            Err(VaultError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_survives_deleted_wallet_records() {
        let (_dir, store) = open_store();
        let wallet = store.create("main", "eth", TEST_MNEMONIC).unwrap();
        let record =
            TransactionRecord::new(&wallet.id, TransferKind::Send, "0xh", "0xa", "0xb", "1", "eth");
        store.record_transaction(record).unwrap();

        store.delete(&wallet.id).unwrap();
        assert_eq!(store.list_transactions(Some(&wallet.id)).unwrap().len(), 1);
    }
}

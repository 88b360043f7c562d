//! Encrypted at-rest storage.
//!
//! One directory per vault, one file per concern:
//!
//! - `salt.enc`          hex KDF salt (public value, stored beside the data)
//! - `wallets.enc`       encoded `EncryptedBlob` over the wallet collection
//! - `transactions.enc`  encoded `EncryptedBlob` over the transaction log
//! - `config.json`       plaintext settings
//! - `user.json`         plaintext profile metadata
//!
//! The vault is a session state machine: `Locked` until `unlock` succeeds,
//! `Unlocked` (master key held in memory) until `lock` or drop. Three failed
//! unlock attempts lock the session out for the life of the process.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::core::config::VaultConfig;
use crate::core::errors::VaultError;
use crate::core::models::{TransactionRecord, UserProfile, Wallet};
use crate::crypto::{AuthenticatedCipher, EncryptedBlob, KeyDerivation, KEY_LEN, SALT_LEN};

const SALT_FILE: &str = "salt.enc";
const WALLETS_FILE: &str = "wallets.enc";
const TRANSACTIONS_FILE: &str = "transactions.enc";
const CONFIG_FILE: &str = "config.json";
const USER_FILE: &str = "user.json";

/// Failed unlock attempts tolerated before the session locks out.
const MAX_UNLOCK_ATTEMPTS: u32 = 3;

pub struct Vault {
    base_dir: PathBuf,
    kdf: KeyDerivation,
    master_key: RwLock<Option<Zeroizing<[u8; KEY_LEN]>>>,
    failed_attempts: RwLock<u32>,
}

impl Vault {
    /// Open (or create) the vault directory. Does not unlock.
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self, VaultError> {
        Self::with_kdf_inner(base_dir.into(), KeyDerivation::new())
    }

    #[cfg(test)]
    pub(crate) fn with_kdf(
        base_dir: impl Into<PathBuf>,
        kdf: KeyDerivation,
    ) -> Result<Self, VaultError> {
        Self::with_kdf_inner(base_dir.into(), kdf)
    }

    fn with_kdf_inner(base_dir: PathBuf, kdf: KeyDerivation) -> Result<Self, VaultError> {
        ensure_private_dir(&base_dir)?;
        Ok(Self {
            base_dir,
            kdf,
            master_key: RwLock::new(None),
            failed_attempts: RwLock::new(0),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn is_unlocked(&self) -> bool {
        self.master_key.read().is_some()
    }

    /// Derive the master key from `password` and validate it against the
    /// stored data. First ever unlock initializes the vault instead: a fresh
    /// salt is generated and empty collections are sealed immediately, so
    /// every later unlock has a real blob to validate against.
    ///
    /// Wrong passwords count toward the session lockout; after
    /// `MAX_UNLOCK_ATTEMPTS` failures every further attempt fails with
    /// `AuthenticationFailed` even if the password is correct.
    pub fn unlock(&self, password: &str) -> Result<(), VaultError> {
        if self.is_unlocked() {
            return Ok(());
        }
        if *self.failed_attempts.read() >= MAX_UNLOCK_ATTEMPTS {
            warn!("unlock refused: session locked out");
            return Err(VaultError::AuthenticationFailed);
        }

        let salt_path = self.base_dir.join(SALT_FILE);
        if !salt_path.exists() {
            return self.initialize(password);
        }

        let salt = self.read_salt()?;
        let candidate = self.kdf.derive(password, &salt)?;

        // The wallet blob doubles as the password check: only the right key
        // passes its authentication tag.
        let encoded = fs::read_to_string(self.base_dir.join(WALLETS_FILE))?;
        let blob: EncryptedBlob = encoded.trim().parse()?;
        match AuthenticatedCipher::open(&blob, &candidate) {
            Ok(_) => {
                *self.master_key.write() = Some(candidate);
                *self.failed_attempts.write() = 0;
                info!("vault unlocked");
                Ok(())
            }
            Err(VaultError::Integrity) => {
                let mut attempts = self.failed_attempts.write();
                *attempts += 1;
                warn!(attempts = *attempts, "unlock failed");
                Err(VaultError::AuthenticationFailed)
            }
            Err(e) => Err(e),
        }
    }

    /// First-use setup: generate the salt and seal empty collections under
    /// the new key.
    fn initialize(&self, password: &str) -> Result<(), VaultError> {
        let salt = KeyDerivation::generate_salt();
        let key = self.kdf.derive(password, &salt)?;

        self.write_private(SALT_FILE, hex::encode(salt).as_bytes())?;
        self.seal_to_file(WALLETS_FILE, &Vec::<Wallet>::new(), &key)?;
        self.seal_to_file(TRANSACTIONS_FILE, &Vec::<TransactionRecord>::new(), &key)?;

        *self.master_key.write() = Some(key);
        *self.failed_attempts.write() = 0;
        info!(dir = %self.base_dir.display(), "vault initialized");
        Ok(())
    }

    /// Drop the in-memory master key. Idempotent; the key buffer zeroizes
    /// itself on drop.
    pub fn lock(&self) {
        if self.master_key.write().take().is_some() {
            info!("vault locked");
        }
    }

    /// Run `f` with the master key, failing if the vault is locked.
    fn with_key<R>(
        &self,
        f: impl FnOnce(&[u8; KEY_LEN]) -> Result<R, VaultError>,
    ) -> Result<R, VaultError> {
        let guard = self.master_key.read();
        match guard.as_ref() {
            Some(key) => f(key),
            None => Err(VaultError::NotAuthenticated),
        }
    }

    // Sealed collections. Whole collections are rewritten on every change;
    // the data volumes here never justify anything finer-grained.

    pub fn load_wallets(&self) -> Result<Vec<Wallet>, VaultError> {
        self.open_collection(WALLETS_FILE)
    }

    pub fn save_wallets(&self, wallets: &[Wallet]) -> Result<(), VaultError> {
        self.seal_collection(WALLETS_FILE, &wallets)
    }

    pub fn load_transactions(&self) -> Result<Vec<TransactionRecord>, VaultError> {
        self.open_collection(TRANSACTIONS_FILE)
    }

    pub fn save_transactions(&self, records: &[TransactionRecord]) -> Result<(), VaultError> {
        self.seal_collection(TRANSACTIONS_FILE, &records)
    }

    fn seal_collection<T: Serialize>(&self, file: &str, value: &T) -> Result<(), VaultError> {
        self.with_key(|key| self.seal_to_file(file, value, key))
    }

    fn open_collection<T: DeserializeOwned>(&self, file: &str) -> Result<T, VaultError> {
        self.with_key(|key| {
            let encoded = fs::read_to_string(self.base_dir.join(file))?;
            let blob: EncryptedBlob = encoded.trim().parse()?;
            let plaintext = AuthenticatedCipher::open(&blob, key)?;
            Ok(serde_json::from_str(&plaintext)?)
        })
    }

    fn seal_to_file<T: Serialize>(
        &self,
        file: &str,
        value: &T,
        key: &[u8; KEY_LEN],
    ) -> Result<(), VaultError> {
        let json = serde_json::to_string(value)?;
        let blob = AuthenticatedCipher::seal(&json, key)?;
        self.write_private(file, blob.encode().as_bytes())
    }

    // Standalone secrets (mnemonics, private keys) sealed under the same
    // master key but stored inline in wallet records, not in their own files.

    pub fn seal_secret(&self, plaintext: &str) -> Result<EncryptedBlob, VaultError> {
        self.with_key(|key| AuthenticatedCipher::seal(plaintext, key))
    }

    pub fn open_secret(&self, blob: &EncryptedBlob) -> Result<Zeroizing<String>, VaultError> {
        self.with_key(|key| AuthenticatedCipher::open(blob, key))
    }

    // Plaintext sidecars. Readable without unlocking.

    pub fn load_config(&self) -> Result<VaultConfig, VaultError> {
        let path = self.base_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(VaultConfig::default());
        }
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn save_config(&self, config: &VaultConfig) -> Result<(), VaultError> {
        self.write_private(CONFIG_FILE, serde_json::to_string_pretty(config)?.as_bytes())
    }

    pub fn load_user(&self) -> Result<Option<UserProfile>, VaultError> {
        let path = self.base_dir.join(USER_FILE);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&fs::read_to_string(path)?)?))
    }

    pub fn save_user(&self, profile: &UserProfile) -> Result<(), VaultError> {
        self.write_private(USER_FILE, serde_json::to_string_pretty(profile)?.as_bytes())
    }

    fn read_salt(&self) -> Result<[u8; SALT_LEN], VaultError> {
        let encoded = fs::read_to_string(self.base_dir.join(SALT_FILE))?;
        let bytes = hex::decode(encoded.trim())
            .map_err(|_| VaultError::StorageIo("malformed salt file".into()))?;
        bytes
            .try_into()
            .map_err(|_| VaultError::StorageIo("malformed salt file".into()))
    }

    fn write_private(&self, file: &str, contents: &[u8]) -> Result<(), VaultError> {
        let path = self.base_dir.join(file);
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        opts.mode(0o600);
        let mut f = opts.open(&path)?;
        f.write_all(contents)?;
        Ok(())
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.lock();
    }
}

fn ensure_private_dir(path: &Path) -> Result<(), VaultError> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(path)?;
    Ok(())
}

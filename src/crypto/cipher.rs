//! Authenticated encryption for persisted secrets.
//!
//! AES-256-GCM with a fresh random 128-bit nonce per seal and a fixed context
//! string bound as associated data, so a blob lifted from one vault cannot be
//! replayed into an unrelated one. Every persisted secret goes through this
//! one primitive; a blob is self-contained and encodes as
//! `nonce:tag:ciphertext` (hex fields).

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Nonce};
use rand::RngCore;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

use crate::core::errors::VaultError;
use crate::crypto::KEY_LEN;

/// AES-256-GCM with a 16-byte nonce.
type VaultCipher = AesGcm<Aes256, U16>;

const NONCE_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// Associated data bound into every seal. Tied to the blob format version.
const AAD_CONTEXT: &[u8] = b"hd-vault:blob:v1";

/// One authenticated-encryption result: (nonce, tag, ciphertext).
///
/// Order-independent and individually portable; opening under any key other
/// than the sealing key fails the integrity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    nonce: [u8; NONCE_LEN],
    tag: [u8; TAG_LEN],
    ciphertext: Vec<u8>,
}

impl EncryptedBlob {
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}",
            hex::encode(self.nonce),
            hex::encode(self.tag),
            hex::encode(&self.ciphertext)
        )
    }

    /// Bit-flipping helper for tamper tests.
    #[cfg(test)]
    pub(crate) fn corrupt_ciphertext(&mut self) {
        if let Some(byte) = self.ciphertext.first_mut() {
            *byte ^= 0x01;
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_tag(&mut self) {
        self.tag[0] ^= 0x01;
    }
}

impl fmt::Display for EncryptedBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for EncryptedBlob {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let (nonce_hex, tag_hex, ct_hex) = match (parts.next(), parts.next(), parts.next()) {
            (Some(n), Some(t), Some(c)) => (n, t, c),
            _ => {
                return Err(VaultError::InvalidInput(
                    "encrypted blob must have nonce:tag:ciphertext form".into(),
                ))
            }
        };

        let nonce_bytes =
            hex::decode(nonce_hex).map_err(|e| VaultError::InvalidInput(e.to_string()))?;
        let tag_bytes =
            hex::decode(tag_hex).map_err(|e| VaultError::InvalidInput(e.to_string()))?;
        let ciphertext =
            hex::decode(ct_hex).map_err(|e| VaultError::InvalidInput(e.to_string()))?;

        let nonce: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| VaultError::InvalidInput("nonce must be 16 bytes".into()))?;
        let tag: [u8; TAG_LEN] = tag_bytes
            .try_into()
            .map_err(|_| VaultError::InvalidInput("tag must be 16 bytes".into()))?;

        Ok(Self { nonce, tag, ciphertext })
    }
}

impl Serialize for EncryptedBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for EncryptedBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BlobVisitor;

        impl Visitor<'_> for BlobVisitor {
            type Value = EncryptedBlob;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a nonce:tag:ciphertext encoded blob")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(BlobVisitor)
    }
}

pub struct AuthenticatedCipher;

impl AuthenticatedCipher {
    /// Encrypt a UTF-8 string under the given key.
    ///
    /// The nonce comes from the OS CSPRNG on every call; nonce reuse under
    /// one key breaks GCM, so nonces are never cached or derived.
    pub fn seal(plaintext: &str, key: &[u8; KEY_LEN]) -> Result<EncryptedBlob, VaultError> {
        let cipher = VaultCipher::new_from_slice(key)
            .map_err(|_| VaultError::InvalidInput("invalid key length".into()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(
                Nonce::<U16>::from_slice(&nonce),
                Payload { msg: plaintext.as_bytes(), aad: AAD_CONTEXT },
            )
            .map_err(|_| VaultError::Integrity)?;

        // aes-gcm appends the tag to the ciphertext
        let split = sealed.len() - TAG_LEN;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&sealed[split..]);

        Ok(EncryptedBlob { nonce, tag, ciphertext: sealed[..split].to_vec() })
    }

    /// Decrypt a blob. Any verification failure (wrong key, corrupted data,
    /// tampering) comes back as the same `Integrity` error with no detail;
    /// this is the sole wrong-master-password signal, and it must not
    /// distinguish the causes or leak partial plaintext.
    pub fn open(
        blob: &EncryptedBlob,
        key: &[u8; KEY_LEN],
    ) -> Result<Zeroizing<String>, VaultError> {
        let cipher = VaultCipher::new_from_slice(key)
            .map_err(|_| VaultError::InvalidInput("invalid key length".into()))?;

        let mut sealed = blob.ciphertext.clone();
        sealed.extend_from_slice(&blob.tag);

        let plaintext = cipher
            .decrypt(
                Nonce::<U16>::from_slice(&blob.nonce),
                Payload { msg: &sealed, aad: AAD_CONTEXT },
            )
            .map_err(|_| VaultError::Integrity)?;

        String::from_utf8(plaintext)
            .map(Zeroizing::new)
            .map_err(|_| VaultError::Integrity)
    }
}

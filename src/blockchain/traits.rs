//! Chain collaborator interface.
//!
//! The vault never talks to a node directly; everything on-chain goes through
//! this trait so discovery and transfer logic stay testable against mocks.

use async_trait::async_trait;
use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::core::errors::VaultError;

/// Minimal transfer description handed to `estimate_gas`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRequest {
    pub from: String,
    pub to: String,
    pub value: U256,
    pub data: Option<Vec<u8>>,
}

/// Current fee quote from the network.
#[derive(Debug, Clone, Copy)]
pub struct FeeData {
    pub gas_price: U256,
}

/// Mined-transaction receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub hash: String,
    pub block_number: u64,
    pub gas_used: U256,
    pub effective_gas_price: U256,
    pub success: bool,
}

/// Read/submit access to one EVM network.
///
/// Implementations are expected to be cheap to share (`Arc`) and safe to call
/// concurrently. All failures surface as `VaultError::ChainQuery`; callers
/// decide whether that is fatal (transfers) or advisory (discovery probes).
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Native balance in wei.
    async fn get_balance(&self, address: &str) -> Result<U256, VaultError>;

    /// Outgoing transaction count (nonce) for the address.
    async fn get_transaction_count(&self, address: &str) -> Result<u64, VaultError>;

    async fn estimate_gas(&self, tx: &TxRequest) -> Result<U256, VaultError>;

    async fn get_fee_data(&self) -> Result<FeeData, VaultError>;

    /// Broadcast a signed raw transaction, returning its hash.
    async fn send_transaction(&self, raw_tx: &[u8]) -> Result<String, VaultError>;

    /// Block until the transaction is mined (or the provider gives up).
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, VaultError>;
}

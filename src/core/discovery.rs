//! Account discovery for imported mnemonics.
//!
//! Probes derivation indices sequentially from 0 and decides which prefix of
//! the HD chain was in use before. An index is active when its address has a
//! nonzero balance or a nonzero outgoing transaction count. The scan stops
//! once `gap_limit` consecutive indices come up inactive, or after
//! `max_probes` indices total.
//!
//! Probes run one at a time with a small pause between them; public RPC
//! endpoints rate-limit bursts. A probe that errors is classified as inactive
//! rather than aborting the scan, so a flaky provider degrades the result
//! instead of destroying it.

use std::time::Duration;

use ethers::types::U256;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blockchain::ChainClient;
use crate::core::errors::VaultError;
use crate::core::hd::{DerivedAccount, HdDeriver};

/// Scan parameters. The defaults match what the importer uses.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryPolicy {
    /// Consecutive inactive indices that end the scan.
    pub gap_limit: u32,
    /// Hard cap on probed indices, gap or no gap.
    pub max_probes: u32,
    /// Pause between consecutive probes.
    pub probe_delay: Duration,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self { gap_limit: 3, max_probes: 20, probe_delay: Duration::from_millis(200) }
    }
}

/// One probed index with its on-chain snapshot.
pub struct DiscoveredAccount {
    pub account: DerivedAccount,
    pub active: bool,
    pub balance: U256,
    pub tx_count: u64,
}

/// Per-probe progress report, for callers that surface scan status.
#[derive(Debug, Clone, Copy)]
pub struct ProbeReport {
    pub index: u32,
    pub active: bool,
}

type ProgressFn = dyn Fn(ProbeReport) + Send + Sync;

pub struct AccountDiscovery<'a> {
    deriver: HdDeriver,
    client: &'a dyn ChainClient,
    policy: DiscoveryPolicy,
    progress: Option<Box<ProgressFn>>,
}

impl<'a> AccountDiscovery<'a> {
    pub fn new(client: &'a dyn ChainClient) -> Self {
        Self {
            deriver: HdDeriver::new(),
            client,
            policy: DiscoveryPolicy::default(),
            progress: None,
        }
    }

    pub fn with_policy(mut self, policy: DiscoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_progress(
        mut self,
        progress: impl Fn(ProbeReport) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Scan the mnemonic's HD chain and return the used prefix: every index
    /// from 0 through the last active one, in order, with snapshots. Empty
    /// when no index is active, in which case the caller typically falls
    /// back to a fresh wallet on index 0.
    ///
    /// Cancelling `cancel` aborts between probes with `VaultError::Cancelled`;
    /// partial results are discarded.
    pub async fn discover(
        &self,
        mnemonic: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DiscoveredAccount>, VaultError> {
        self.deriver.validate_mnemonic(mnemonic)?;

        let mut probed: Vec<DiscoveredAccount> = Vec::new();
        let mut consecutive_inactive = 0u32;
        let mut index = 0u32;

        while index < self.policy.max_probes && consecutive_inactive < self.policy.gap_limit {
            if cancel.is_cancelled() {
                info!(index, "discovery cancelled");
                return Err(VaultError::Cancelled);
            }

            if index > 0 {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!(index, "discovery cancelled");
                        return Err(VaultError::Cancelled);
                    }
                    _ = tokio::time::sleep(self.policy.probe_delay) => {}
                }
            }

            let account = self.deriver.derive(mnemonic, index)?;
            let (active, balance, tx_count) = self.probe(&account.address, index).await;

            if active {
                consecutive_inactive = 0;
            } else {
                consecutive_inactive += 1;
            }
            debug!(index, active, consecutive_inactive, "probed index");
            if let Some(progress) = &self.progress {
                progress(ProbeReport { index, active });
            }

            probed.push(DiscoveredAccount { account, active, balance, tx_count });
            index += 1;
        }

        // Keep the prefix through the last active index; trailing inactive
        // probes were only there to satisfy the gap limit.
        let used = match probed.iter().rposition(|a| a.active) {
            Some(last) => {
                probed.truncate(last + 1);
                probed
            }
            None => Vec::new(),
        };
        info!(found = used.len(), scanned = index, "discovery finished");
        Ok(used)
    }

    /// Probe one address. Query failures classify the index as inactive.
    async fn probe(&self, address: &str, index: u32) -> (bool, U256, u64) {
        let balance = match self.client.get_balance(address).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(index, error = %e, "balance probe failed, treating index as inactive");
                return (false, U256::zero(), 0);
            }
        };
        let tx_count = match self.client.get_transaction_count(address).await {
            Ok(count) => count,
            Err(e) => {
                warn!(index, error = %e, "nonce probe failed, treating index as inactive");
                return (false, U256::zero(), 0);
            }
        };
        (balance > U256::zero() || tx_count > 0, balance, tx_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{FeeData, TxReceipt, TxRequest};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    /// Chain stub keyed by derivation index (resolved through the address).
    struct MockChain {
        // address -> (balance, tx_count)
        state: HashMap<String, (U256, u64)>,
        // addresses whose probes always error
        failing: Vec<String>,
        probes: AtomicU32,
    }

    impl MockChain {
        fn with_active_indices(indices: &[u32]) -> Self {
            let deriver = HdDeriver::new();
            let mut state = HashMap::new();
            for &i in indices {
                let address = deriver.derive(TEST_MNEMONIC, i).unwrap().address;
                state.insert(address, (U256::from(1_000_000u64), 2));
            }
            Self { state, failing: Vec::new(), probes: AtomicU32::new(0) }
        }

        fn address_of(index: u32) -> String {
            HdDeriver::new().derive(TEST_MNEMONIC, index).unwrap().address
        }
    }

    #[async_trait]
    impl ChainClient for MockChain {
        async fn get_balance(&self, address: &str) -> Result<U256, VaultError> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.failing.iter().any(|a| a == address) {
                return Err(VaultError::ChainQuery("rpc unavailable".into()));
            }
            Ok(self.state.get(address).map(|(b, _)| *b).unwrap_or_default())
        }

        async fn get_transaction_count(&self, address: &str) -> Result<u64, VaultError> {
            if self.failing.iter().any(|a| a == address) {
                return Err(VaultError::ChainQuery("rpc unavailable".into()));
            }
            Ok(self.state.get(address).map(|(_, c)| *c).unwrap_or_default())
        }

        async fn estimate_gas(&self, _tx: &TxRequest) -> Result<U256, VaultError> {
            Ok(U256::from(21_000u64))
        }

        async fn get_fee_data(&self) -> Result<FeeData, VaultError> {
            Ok(FeeData { gas_price: U256::from(1u64) })
        }

        async fn send_transaction(&self, _raw_tx: &[u8]) -> Result<String, VaultError> {
            Err(VaultError::ChainQuery("not implemented".into()))
        }

        async fn wait_for_receipt(&self, _tx_hash: &str) -> Result<TxReceipt, VaultError> {
            Err(VaultError::ChainQuery("not implemented".into()))
        }
    }

    fn fast_policy() -> DiscoveryPolicy {
        DiscoveryPolicy { probe_delay: Duration::ZERO, ..Default::default() }
    }

    #[tokio::test]
    async fn test_contiguous_active_prefix() {
        let chain = MockChain::with_active_indices(&[0, 1, 2, 6]);
        let discovery = AccountDiscovery::new(&chain).with_policy(fast_policy());
        let found = discovery.discover(TEST_MNEMONIC, &CancellationToken::new()).await.unwrap();

        // 3, 4, 5 inactive ends the scan before index 6 is ever probed.
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|a| a.active));
        assert_eq!(
            found.iter().map(|a| a.account.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(chain.probes.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_unused_mnemonic_finds_nothing() {
        let chain = MockChain::with_active_indices(&[]);
        let discovery = AccountDiscovery::new(&chain).with_policy(fast_policy());
        let found = discovery.discover(TEST_MNEMONIC, &CancellationToken::new()).await.unwrap();
        assert!(found.is_empty());
        // gap_limit probes, then stop
        assert_eq!(chain.probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gap_inside_prefix_is_kept() {
        // Index 1 is empty but 2 is active: the used prefix spans 0..=2.
        let chain = MockChain::with_active_indices(&[0, 2]);
        let discovery = AccountDiscovery::new(&chain).with_policy(fast_policy());
        let found = discovery.discover(TEST_MNEMONIC, &CancellationToken::new()).await.unwrap();

        assert_eq!(found.len(), 3);
        assert!(found[0].active);
        assert!(!found[1].active);
        assert!(found[2].active);
    }

    #[tokio::test]
    async fn test_max_probes_caps_scan() {
        let all: Vec<u32> = (0..40).collect();
        let chain = MockChain::with_active_indices(&all);
        let discovery = AccountDiscovery::new(&chain).with_policy(fast_policy());
        let found = discovery.discover(TEST_MNEMONIC, &CancellationToken::new()).await.unwrap();
        assert_eq!(found.len(), 20);
    }

    #[tokio::test]
    async fn test_probe_error_counts_as_inactive() {
        let mut chain = MockChain::with_active_indices(&[0, 1]);
        // Index 1 is funded but its probes fail; the scan must not abort.
        chain.failing.push(MockChain::address_of(1));
        let discovery = AccountDiscovery::new(&chain).with_policy(fast_policy());
        let found = discovery.discover(TEST_MNEMONIC, &CancellationToken::new()).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].account.index, 0);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_scan() {
        let chain = MockChain::with_active_indices(&[0, 1, 2]);
        let discovery = AccountDiscovery::new(&chain).with_policy(fast_policy());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = discovery.discover(TEST_MNEMONIC, &cancel).await;
        assert!(matches!(result, Err(VaultError::Cancelled)));
    }

    #[tokio::test]
    async fn test_progress_callback_sees_every_probe() {
        use std::sync::{Arc, Mutex};
        let chain = MockChain::with_active_indices(&[0]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_cb = Arc::clone(&seen);
        let discovery = AccountDiscovery::new(&chain)
            .with_policy(fast_policy())
            .with_progress(move |report| seen_in_cb.lock().unwrap().push(report.index));

        discovery.discover(TEST_MNEMONIC, &CancellationToken::new()).await.unwrap();
        // index 0 active, then 1..=3 inactive
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_invalid_mnemonic_rejected_before_probing() {
        let chain = MockChain::with_active_indices(&[0]);
        let discovery = AccountDiscovery::new(&chain).with_policy(fast_policy());
        let result = discovery.discover("not a mnemonic", &CancellationToken::new()).await;
        assert!(matches!(result, Err(VaultError::InvalidMnemonic(_))));
        assert_eq!(chain.probes.load(Ordering::SeqCst), 0);
    }
}

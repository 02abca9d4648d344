//! Common test utilities shared across integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use vaultkit_core::{
    contract::IStatelessVault::{Configuration, ExecutionSuccess},
    MemoryLedger, MessageSigner, VaultError, VaultResult,
};

/// An owner key held in memory.
pub struct LocalOwner(PrivateKeySigner);

impl LocalOwner {
    /// A freshly generated key.
    pub fn random() -> Self {
        Self(PrivateKeySigner::random())
    }
}

#[async_trait]
impl MessageSigner for LocalOwner {
    fn address(&self) -> Address {
        self.0.address()
    }

    async fn sign_message(&self, message: &[u8]) -> VaultResult<Bytes> {
        let signature = self
            .0
            .sign_message_sync(message)
            .map_err(|err| VaultError::Generic {
                error: err.to_string(),
            })?;
        Ok(signature.as_bytes().to_vec().into())
    }
}

/// `count` fresh owners, sorted by address.
pub fn owners(count: usize) -> Vec<LocalOwner> {
    let mut owners: Vec<_> = (0..count).map(|_| LocalOwner::random()).collect();
    owners.sort_by_key(MessageSigner::address);
    owners
}

/// Addresses of `owners`, in the given order.
pub fn addresses(owners: &[LocalOwner]) -> Vec<Address> {
    owners.iter().map(MessageSigner::address).collect()
}

/// Emits the setup (or a later configuration change) of `vault`.
pub fn configure(
    ledger: &MemoryLedger,
    vault: Address,
    ledger_tx_id: B256,
    current_nonce: u64,
    signers: Vec<Address>,
    threshold: u64,
) {
    ledger.emit(
        vault,
        ledger_tx_id,
        &Configuration {
            currentNonce: U256::from(current_nonce),
            signers,
            threshold: U256::from(threshold),
            implementation: Address::repeat_byte(0x99),
            signatureChecker: Address::ZERO,
            requestGuard: Address::ZERO,
            fallbackHandler: Address::ZERO,
        },
    );
}

/// Emits a successful execution of `vault_digest`.
pub fn executed(ledger: &MemoryLedger, vault: Address, ledger_tx_id: B256, nonce: u64, vault_digest: B256) {
    ledger.emit(
        vault,
        ledger_tx_id,
        &ExecutionSuccess {
            usedNonce: U256::from(nonce),
            txHash: vault_digest,
        },
    );
}

/// An empty shared ledger for `chain_id`.
pub fn memory_ledger(chain_id: u64) -> Arc<MemoryLedger> {
    Arc::new(MemoryLedger::new(chain_id))
}

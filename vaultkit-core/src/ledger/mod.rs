//! Access to the ledger: event logs and read-only contract calls.

use alloy_primitives::{Address, Bytes, LogData, B256, U64};
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{contract::IStatelessVault, error::VaultResult};

mod memory;
mod rpc;

pub use memory::MemoryLedger;
pub use rpc::JsonRpcLedger;

/// A log entry as returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerLog {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics, the first one being the event signature hash.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed parameters.
    pub data: Bytes,
    /// Ledger transaction that emitted the log (absent for pending logs).
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    /// Block that included the log.
    #[serde(default)]
    pub block_number: Option<U64>,
    /// Position of the log within its block.
    #[serde(default)]
    pub log_index: Option<U64>,
}

impl LedgerLog {
    /// Topics and data in the form event decoders expect. `None` if there are
    /// more than four topics.
    #[must_use]
    pub fn log_data(&self) -> Option<LogData> {
        LogData::new(self.topics.clone(), self.data.clone())
    }

    /// Builds a log for `event` emitted by `address` in ledger transaction `transaction_hash`.
    #[must_use]
    pub fn from_event<E: SolEvent>(address: Address, transaction_hash: B256, event: &E) -> Self {
        let data = event.encode_log_data();
        Self {
            address,
            topics: data.topics().to_vec(),
            data: data.data,
            transaction_hash: Some(transaction_hash),
            block_number: None,
            log_index: None,
        }
    }
}

/// Log query: one contract, optional alternatives per topic position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFilter {
    /// Emitting contract.
    pub address: Address,
    /// Per-position topic alternatives; `None` matches anything.
    pub topics: Vec<Option<Vec<B256>>>,
}

impl LogFilter {
    /// Every configuration and execution event of `vault`.
    #[must_use]
    pub fn vault_events(vault: Address) -> Self {
        Self {
            address: vault,
            topics: vec![Some(vec![
                IStatelessVault::Configuration::SIGNATURE_HASH,
                IStatelessVault::ExecutionFailure::SIGNATURE_HASH,
                IStatelessVault::ExecutionSuccess::SIGNATURE_HASH,
            ])],
        }
    }

    /// Execution events of `vault` for one vault digest.
    #[must_use]
    pub fn executions_of(vault: Address, vault_digest: B256) -> Self {
        Self {
            address: vault,
            topics: vec![
                Some(vec![
                    IStatelessVault::ExecutionFailure::SIGNATURE_HASH,
                    IStatelessVault::ExecutionSuccess::SIGNATURE_HASH,
                ]),
                None,
                Some(vec![vault_digest]),
            ],
        }
    }

    /// Whether `log` satisfies the filter.
    #[must_use]
    pub fn matches(&self, log: &LedgerLog) -> bool {
        log.address == self.address
            && self.topics.iter().enumerate().all(|(i, wanted)| {
                wanted.as_ref().is_none_or(|alternatives| {
                    log.topics
                        .get(i)
                        .is_some_and(|topic| alternatives.contains(topic))
                })
            })
    }
}

/// Read access to the ledger the vault lives on.
///
/// Implementations are expected to be stateless with respect to the vault:
/// every call observes the ledger as it is now.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Returns all logs matching `filter`, in emission order.
    ///
    /// # Errors
    /// Returns an error if the ledger cannot be queried.
    async fn get_logs(&self, filter: &LogFilter) -> VaultResult<Vec<LedgerLog>>;

    /// Executes a read-only call against `to`.
    ///
    /// # Errors
    /// Returns an error if the call reverts or the ledger cannot be reached.
    async fn call(&self, to: Address, input: Bytes) -> VaultResult<Bytes>;

    /// Chain identifier used for EIP-712 domain separation.
    ///
    /// # Errors
    /// Returns an error if the ledger cannot be reached.
    async fn chain_id(&self) -> VaultResult<u64>;
}

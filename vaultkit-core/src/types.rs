//! Vault domain types shared by the reconstruction, proof and content modules.

use std::collections::HashSet;

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    contract,
    error::{VaultError, VaultResult},
};

/// The vault configuration as reconstructed from the ledger's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultConfig {
    /// Implementation (singleton) the vault proxy delegates to.
    pub implementation: Address,
    /// Optional external signature checker, zero when unused.
    pub signature_checker: Address,
    /// Optional request guard, zero when unused.
    pub request_guard: Address,
    /// Fallback handler, zero when unused.
    pub fallback_handler: Address,
    /// Ordered owner set. The order fixes the Merkle leaf positions.
    pub signers: Vec<Address>,
    /// Number of confirmations required.
    pub threshold: U256,
    /// Next nonce the vault will accept.
    pub nonce: U256,
}

impl VaultConfig {
    /// Checks that the owner set is free of duplicates and the threshold fits it.
    ///
    /// # Errors
    /// - `DuplicateSigner` if an owner is listed twice.
    /// - `InvalidThreshold` if the threshold is zero or larger than the owner set.
    pub fn validate(&self) -> VaultResult<()> {
        ensure_unique_signers(&self.signers)?;
        ensure_threshold(self.threshold, self.signers.len())
    }

    /// Position of `signer` in the owner set.
    #[must_use]
    pub fn index_of(&self, signer: &Address) -> Option<usize> {
        self.signers.iter().position(|owner| owner == signer)
    }
}

pub(crate) fn ensure_unique_signers(signers: &[Address]) -> VaultResult<()> {
    let mut seen = HashSet::with_capacity(signers.len());
    for signer in signers {
        if !seen.insert(signer) {
            return Err(VaultError::DuplicateSigner { signer: *signer });
        }
    }
    Ok(())
}

pub(crate) fn ensure_threshold(threshold: U256, signers: usize) -> VaultResult<()> {
    if threshold.is_zero() || threshold > U256::from(signers) {
        return Err(VaultError::InvalidThreshold { threshold, signers });
    }
    Ok(())
}

/// One entry of the vault history, produced by replaying the ledger log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum VaultAction {
    /// The configuration was set up or changed.
    ConfigUpdate {
        /// Hash of the ledger transaction that emitted the event.
        #[serde(rename = "ledgerTxId")]
        ledger_tx_id: B256,
        /// Nonce consumed by the change. Absent for the initial setup.
        #[serde(skip_serializing_if = "Option::is_none")]
        nonce: Option<U256>,
    },
    /// A vault transaction was executed.
    ExecutedTransaction {
        /// Vault digest (EIP-712 signing hash) of the executed transaction.
        #[serde(rename = "vaultDigest")]
        vault_digest: B256,
        /// Hash of the ledger transaction that emitted the event.
        #[serde(rename = "ledgerTxId")]
        ledger_tx_id: B256,
        /// Nonce consumed by the execution.
        nonce: U256,
        /// Whether the inner call succeeded.
        success: bool,
    },
}

impl VaultAction {
    /// Hash of the ledger transaction that produced this action.
    #[must_use]
    pub const fn ledger_tx_id(&self) -> B256 {
        match self {
            Self::ConfigUpdate { ledger_tx_id, .. }
            | Self::ExecutedTransaction { ledger_tx_id, .. } => *ledger_tx_id,
        }
    }
}

/// Outcome of a vault transaction as visible on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Executed and the inner call succeeded.
    Success,
    /// Executed but the inner call failed.
    Failed,
    /// Not executed, or the log is ambiguous.
    Unknown,
}

/// How the vault performs the inner call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Operation {
    /// Regular `CALL`.
    #[default]
    Call = 0,
    /// `DELEGATECALL` in the vault's context.
    DelegateCall = 1,
}

impl TryFrom<u8> for Operation {
    type Error = VaultError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Call),
            1 => Ok(Self::DelegateCall),
            other => Err(VaultError::InvalidInput {
                attribute: "operation".to_string(),
                reason: format!("unknown operation {other}"),
            }),
        }
    }
}

impl From<Operation> for u8 {
    fn from(operation: Operation) -> Self {
        operation as Self
    }
}

/// A vault transaction together with its optional human readable metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultTransaction {
    /// Call target.
    pub to: Address,
    /// Wei forwarded with the call.
    pub value: U256,
    /// Call data.
    pub data: Bytes,
    /// Call type.
    pub operation: Operation,
    /// Gas that must be left for the inner call.
    pub min_available_gas: U256,
    /// Vault nonce the transaction is bound to.
    pub nonce: U256,
    /// Digest of `meta`, zero when there is none.
    pub meta_hash: B256,
    /// Opaque metadata payload (usually JSON).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<String>,
}

impl VaultTransaction {
    /// Creates a transaction, deriving `meta_hash` from `meta`.
    #[must_use]
    pub fn new(
        to: Address,
        value: U256,
        data: Bytes,
        operation: Operation,
        nonce: U256,
        meta: Option<String>,
    ) -> Self {
        Self {
            to,
            value,
            data,
            operation,
            min_available_gas: U256::ZERO,
            nonce,
            meta_hash: meta_hash(meta.as_deref()),
            meta,
        }
    }

    /// The EIP-712 struct the owners sign.
    #[must_use]
    pub fn to_typed(&self) -> contract::Transaction {
        contract::Transaction {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            operation: self.operation.into(),
            minAvailableGas: self.min_available_gas,
            nonce: self.nonce,
            metaHash: self.meta_hash,
        }
    }
}

/// Digest of a metadata payload as committed in `metaHash`.
#[must_use]
pub fn meta_hash(meta: Option<&str>) -> B256 {
    meta.map_or(B256::ZERO, keccak256)
}

//! Replays the vault's event log into its current configuration and history.
//!
//! The contract keeps no readable owner state, so everything here is a pure
//! fold over logs in ledger emission order. Callers fetch the log once per
//! query and hand it over; nothing is cached between calls.

use alloy_primitives::{B256, U256};
use alloy_sol_types::SolEvent;

use crate::{
    contract::IStatelessVault::{Configuration, ExecutionFailure, ExecutionSuccess},
    error::{VaultError, VaultResult},
    ledger::LedgerLog,
    types::{TransactionStatus, VaultAction, VaultConfig},
};

/// A decoded vault event together with the ledger transaction that emitted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// The owner set or another configuration parameter was set.
    Configuration {
        /// Emitting ledger transaction.
        ledger_tx_id: B256,
        /// Decoded event payload.
        event: Configuration,
    },
    /// A vault transaction was executed.
    Execution {
        /// Emitting ledger transaction.
        ledger_tx_id: B256,
        /// Vault digest of the executed transaction.
        vault_digest: B256,
        /// Nonce consumed by the execution.
        used_nonce: U256,
        /// Whether the inner call succeeded.
        success: bool,
    },
}

/// Decodes `logs`, dropping anything that is not a well-formed vault event.
///
/// Skipped logs are reported through `log::warn!`.
#[must_use]
pub fn decode_events(logs: &[LedgerLog]) -> Vec<VaultEvent> {
    logs.iter()
        .filter_map(|log| match decode_event(log) {
            Ok(event) => Some(event),
            Err(err) => {
                log::warn!(
                    "skipping log of {:?}: {err}",
                    log.transaction_hash.unwrap_or_default()
                );
                None
            }
        })
        .collect()
}

fn decode_event(log: &LedgerLog) -> VaultResult<VaultEvent> {
    let topic = log.topics.first().copied().unwrap_or_default();
    let data = log.log_data().ok_or(VaultError::UnknownLogTopic { topic })?;
    let ledger_tx_id = log.transaction_hash.unwrap_or_default();

    if topic == Configuration::SIGNATURE_HASH {
        return Ok(VaultEvent::Configuration {
            ledger_tx_id,
            event: Configuration::decode_log_data(&data)?,
        });
    }

    let (used_nonce, vault_digest, success) = if topic == ExecutionSuccess::SIGNATURE_HASH {
        let event = ExecutionSuccess::decode_log_data(&data)?;
        (event.usedNonce, event.txHash, true)
    } else if topic == ExecutionFailure::SIGNATURE_HASH {
        let event = ExecutionFailure::decode_log_data(&data)?;
        (event.usedNonce, event.txHash, false)
    } else {
        return Err(VaultError::UnknownLogTopic { topic });
    };

    Ok(VaultEvent::Execution {
        ledger_tx_id,
        vault_digest,
        used_nonce,
        success,
    })
}

/// Folds `events` into the current configuration.
///
/// A `Configuration` event whose `currentNonce` is at least the running nonce
/// replaces the whole configuration. Executions only move the nonce forward to
/// `usedNonce + 1`.
///
/// # Errors
/// `ConfigNotFound` if no event ever set a nonce or no configuration was applied.
pub fn reconstruct_config(events: &[VaultEvent]) -> VaultResult<VaultConfig> {
    let mut config: Option<VaultConfig> = None;
    let mut nonce: Option<U256> = None;

    for event in events {
        match event {
            VaultEvent::Configuration { event, .. } => {
                if nonce.is_none_or(|current| event.currentNonce >= current) {
                    nonce = Some(event.currentNonce);
                    config = Some(VaultConfig {
                        implementation: event.implementation,
                        signature_checker: event.signatureChecker,
                        request_guard: event.requestGuard,
                        fallback_handler: event.fallbackHandler,
                        signers: event.signers.clone(),
                        threshold: event.threshold,
                        nonce: event.currentNonce,
                    });
                }
            }
            VaultEvent::Execution { used_nonce, .. } => {
                let next = used_nonce.saturating_add(U256::from(1));
                if nonce.is_none_or(|current| current < next) {
                    nonce = Some(next);
                }
            }
        }
    }

    match (config, nonce) {
        (Some(config), Some(nonce)) => Ok(VaultConfig { nonce, ..config }),
        _ => Err(VaultError::ConfigNotFound),
    }
}

/// Projects `events` into history entries, most recent first.
///
/// The setup event (`currentNonce == 0`) carries no nonce; later configuration
/// changes report the nonce they consumed.
#[must_use]
pub fn project_actions(events: &[VaultEvent]) -> Vec<VaultAction> {
    events
        .iter()
        .rev()
        .map(|event| match event {
            VaultEvent::Configuration {
                ledger_tx_id,
                event,
            } => VaultAction::ConfigUpdate {
                ledger_tx_id: *ledger_tx_id,
                nonce: event.currentNonce.checked_sub(U256::from(1)),
            },
            VaultEvent::Execution {
                ledger_tx_id,
                vault_digest,
                used_nonce,
                success,
            } => VaultAction::ExecutedTransaction {
                vault_digest: *vault_digest,
                ledger_tx_id: *ledger_tx_id,
                nonce: *used_nonce,
                success: *success,
            },
        })
        .collect()
}

/// Status of `vault_digest` given the execution events recorded for it.
///
/// Exactly one execution decides the status; none or several yield `Unknown`.
#[must_use]
pub fn transaction_status(events: &[VaultEvent], vault_digest: B256) -> TransactionStatus {
    let mut executions = events.iter().filter_map(|event| match event {
        VaultEvent::Execution {
            vault_digest: digest,
            success,
            ..
        } if *digest == vault_digest => Some(*success),
        _ => None,
    });

    match (executions.next(), executions.next()) {
        (Some(true), None) => TransactionStatus::Success,
        (Some(false), None) => TransactionStatus::Failed,
        _ => TransactionStatus::Unknown,
    }
}

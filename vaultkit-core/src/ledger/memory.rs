use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy_primitives::{Address, Bytes, FixedBytes, B256, U64};
use alloy_sol_types::{SolCall, SolEvent, SolStruct, SolValue};
use async_trait::async_trait;

use super::{Ledger, LedgerLog, LogFilter};
use crate::{
    contract::{IStatelessVault, Transaction},
    error::{VaultError, VaultResult},
    vault::vault_domain,
};

#[derive(Debug, Default)]
struct State {
    logs: Vec<LedgerLog>,
    call_results: HashMap<(Address, FixedBytes<4>), Bytes>,
}

/// An in-memory [`Ledger`].
///
/// Logs are appended with [`MemoryLedger::emit`]. `generateTxHash` is answered
/// with the EIP-712 signing hash for the called contract; any other call must
/// be registered with [`MemoryLedger::set_call_result`] first.
#[derive(Debug)]
pub struct MemoryLedger {
    chain_id: u64,
    state: Mutex<State>,
}

impl MemoryLedger {
    /// An empty ledger for `chain_id`.
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Appends `event` as emitted by `address` within ledger transaction `ledger_tx_id`.
    pub fn emit<E: SolEvent>(&self, address: Address, ledger_tx_id: B256, event: &E) {
        let mut state = self.state();
        let mut log = LedgerLog::from_event(address, ledger_tx_id, event);
        log.block_number = Some(U64::from(state.logs.len()));
        log.log_index = Some(U64::ZERO);
        state.logs.push(log);
    }

    /// Appends a raw log.
    pub fn push_log(&self, log: LedgerLog) {
        self.state().logs.push(log);
    }

    /// Registers the output returned for calls to `to` whose input starts with `selector`.
    ///
    /// A registered `generateTxHash` result takes precedence over the computed one.
    pub fn set_call_result(&self, to: Address, selector: [u8; 4], output: Bytes) {
        self.state()
            .call_results
            .insert((to, FixedBytes(selector)), output);
    }

    fn generate_tx_hash(&self, to: Address, input: &[u8]) -> VaultResult<Bytes> {
        let call = IStatelessVault::generateTxHashCall::abi_decode(input)?;
        let transaction = Transaction {
            to: call.to,
            value: call.value,
            data: call.data,
            operation: call.operation,
            minAvailableGas: call.minAvailableGas,
            nonce: call.nonce,
            metaHash: call.metaHash,
        };
        let digest = transaction.eip712_signing_hash(&vault_domain(self.chain_id, to));
        Ok(digest.abi_encode().into())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_logs(&self, filter: &LogFilter) -> VaultResult<Vec<LedgerLog>> {
        Ok(self
            .state()
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect())
    }

    async fn call(&self, to: Address, input: Bytes) -> VaultResult<Bytes> {
        let Some(selector) = input.get(..4).map(FixedBytes::<4>::from_slice) else {
            return Err(VaultError::InvalidInput {
                attribute: "input".to_string(),
                reason: "call input is shorter than a selector".to_string(),
            });
        };

        if let Some(output) = self.state().call_results.get(&(to, selector)) {
            return Ok(output.clone());
        }

        if selector.0 == IStatelessVault::generateTxHashCall::SELECTOR {
            return self.generate_tx_hash(to, &input);
        }

        Err(VaultError::RpcError {
            code: 3,
            message: format!("execution reverted: no result registered for {selector}"),
        })
    }

    async fn chain_id(&self) -> VaultResult<u64> {
        Ok(self.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{bytes, U256};

    use super::*;

    #[tokio::test]
    async fn test_generate_tx_hash_matches_typed_data() {
        let ledger = MemoryLedger::new(4);
        let vault = Address::repeat_byte(0xaa);
        let transaction = Transaction {
            to: Address::repeat_byte(0x01),
            value: U256::from(5),
            data: bytes!("0x1234"),
            operation: 0,
            minAvailableGas: U256::ZERO,
            nonce: U256::from(2),
            metaHash: B256::ZERO,
        };
        let call = IStatelessVault::generateTxHashCall {
            to: transaction.to,
            value: transaction.value,
            data: transaction.data.clone(),
            operation: transaction.operation,
            minAvailableGas: transaction.minAvailableGas,
            nonce: transaction.nonce,
            metaHash: transaction.metaHash,
        };

        let output = ledger.call(vault, call.abi_encode().into()).await.unwrap();
        assert_eq!(
            B256::from_slice(&output),
            transaction.eip712_signing_hash(&vault_domain(4, vault))
        );
    }

    #[tokio::test]
    async fn test_unregistered_call_reverts() {
        let ledger = MemoryLedger::new(1);
        let err = ledger
            .call(Address::ZERO, bytes!("0x01020304"))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::RpcError { .. }));

        ledger.set_call_result(Address::ZERO, [1, 2, 3, 4], bytes!("0xff"));
        let output = ledger.call(Address::ZERO, bytes!("0x01020304")).await.unwrap();
        assert_eq!(output, bytes!("0xff"));
    }

    #[tokio::test]
    async fn test_emit_is_filtered_by_vault() {
        let ledger = MemoryLedger::new(1);
        let vault = Address::repeat_byte(0x0a);
        let event = IStatelessVault::ExecutionSuccess {
            usedNonce: U256::ZERO,
            txHash: B256::repeat_byte(1),
        };
        ledger.emit(vault, B256::repeat_byte(2), &event);
        ledger.emit(Address::repeat_byte(0x0b), B256::repeat_byte(3), &event);

        let logs = ledger
            .get_logs(&LogFilter::vault_events(vault))
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].transaction_hash, Some(B256::repeat_byte(2)));
    }
}

//! Batching of several calls into one delegate call to a `MultiSend` contract.
//!
//! Each batched call is packed as
//! `uint8 operation ‖ address to ‖ uint256 value ‖ uint256 dataLength ‖ bytes data`.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::{Deserialize, Serialize};

use crate::{
    contract::IMultiSend,
    error::{VaultError, VaultResult},
    types::{Operation, VaultTransaction},
};

const HEADER_LENGTH: usize = 1 + 20 + 32 + 32;

/// A call the vault should perform, before it is bound to a nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaTransaction {
    /// Call target.
    pub to: Address,
    /// Wei forwarded with the call.
    pub value: U256,
    /// Call data.
    pub data: Bytes,
    /// Call type.
    #[serde(default)]
    pub operation: Operation,
}

impl MetaTransaction {
    /// Binds the call to `nonce`, attaching optional metadata.
    #[must_use]
    pub fn into_vault_transaction(self, nonce: U256, meta: Option<String>) -> VaultTransaction {
        VaultTransaction::new(self.to, self.value, self.data, self.operation, nonce, meta)
    }
}

/// Packs `transactions` into a single delegate call to `multi_send`.
///
/// A single transaction is returned as is.
///
/// # Errors
/// Returns `InvalidInput` if `transactions` is empty.
pub fn build_multi_send(
    multi_send: Address,
    transactions: &[MetaTransaction],
) -> VaultResult<MetaTransaction> {
    match transactions {
        [] => Err(VaultError::InvalidInput {
            attribute: "transactions".to_string(),
            reason: "cannot batch an empty list".to_string(),
        }),
        [single] => Ok(single.clone()),
        batch => {
            let mut packed = Vec::new();
            for tx in batch {
                packed.push(u8::from(tx.operation));
                packed.extend_from_slice(tx.to.as_slice());
                packed.extend_from_slice(&tx.value.to_be_bytes::<32>());
                packed.extend_from_slice(&U256::from(tx.data.len()).to_be_bytes::<32>());
                packed.extend_from_slice(&tx.data);
            }
            let data = IMultiSend::multiSendCall {
                transactions: packed.into(),
            }
            .abi_encode();
            Ok(MetaTransaction {
                to: multi_send,
                value: U256::ZERO,
                data: data.into(),
                operation: Operation::DelegateCall,
            })
        }
    }
}

/// Splits a batch built by [`build_multi_send`] back into its calls.
///
/// Anything that is not a zero-value delegate call to `multi_send`, or that
/// fails to decode, is returned unchanged as a single call.
#[must_use]
pub fn decode_multi_send(multi_send: Address, transaction: &MetaTransaction) -> Vec<MetaTransaction> {
    if transaction.operation != Operation::DelegateCall
        || transaction.to != multi_send
        || !transaction.value.is_zero()
    {
        return vec![transaction.clone()];
    }

    match unpack(&transaction.data) {
        Ok(transactions) => transactions,
        Err(err) => {
            log::warn!("not a multi send batch: {err}");
            vec![transaction.clone()]
        }
    }
}

fn unpack(data: &[u8]) -> VaultResult<Vec<MetaTransaction>> {
    let packed = IMultiSend::multiSendCall::abi_decode(data)?.transactions;
    let truncated = || VaultError::SerializationError {
        error: "truncated multi send entry".to_string(),
    };

    let mut transactions = Vec::new();
    let mut rest = packed.as_ref();
    while !rest.is_empty() {
        let header = rest.get(..HEADER_LENGTH).ok_or_else(truncated)?;
        let operation = Operation::try_from(header[0])?;
        let to = Address::from_slice(&header[1..21]);
        let value = U256::from_be_slice(&header[21..53]);
        let length = usize::try_from(U256::from_be_slice(&header[53..85]))
            .map_err(|_| truncated())?;
        let end = HEADER_LENGTH.checked_add(length).ok_or_else(truncated)?;
        let data = rest.get(HEADER_LENGTH..end).ok_or_else(truncated)?;

        transactions.push(MetaTransaction {
            to,
            value,
            data: Bytes::copy_from_slice(data),
            operation,
        });
        rest = &rest[end..];
    }
    Ok(transactions)
}

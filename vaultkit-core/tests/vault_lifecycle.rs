//! Propose, confirm, execute and re-key a vault against in-memory collaborators.

mod common;

use std::sync::Arc;

use alloy_primitives::{address, bytes, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use eyre::Result;
use vaultkit_core::{
    contract::IStatelessVault,
    defaults::MULTI_SEND,
    merkle::build_root,
    multisend::{build_multi_send, decode_multi_send, MetaTransaction},
    validation::verify_validation_data,
    MemoryContentStore, MessageSigner, Operation, TransactionStatus, TransactionStore, Vault,
    VaultAction, VaultError, VaultTransaction,
};

use common::{addresses, configure, executed, memory_ledger, owners, LocalOwner};

const VAULT: Address = address!("0x5afe5afe5afe5afe5afe5afe5afe5afe5afe5afe");

fn payments() -> Vec<MetaTransaction> {
    vec![
        MetaTransaction {
            to: Address::repeat_byte(0x01),
            value: U256::from(1_000_000_000u64),
            data: Bytes::new(),
            operation: Operation::Call,
        },
        MetaTransaction {
            to: Address::repeat_byte(0x02),
            value: U256::ZERO,
            data: bytes!("0xa9059cbb00000000000000000000000000000000000000000000000000000000000000ff"),
            operation: Operation::Call,
        },
    ]
}

async fn confirm(
    vault: &Vault,
    tx: &VaultTransaction,
    signers: &[&LocalOwner],
) -> Result<Vec<Bytes>> {
    let mut signatures = Vec::with_capacity(signers.len());
    for signer in signers {
        signatures.push(vault.sign_transaction(tx, *signer).await?);
    }
    Ok(signatures)
}

#[tokio::test]
async fn test_vault_lifecycle() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();

    let ledger = memory_ledger(4);
    let keys = owners(3);
    let owner_set = addresses(&keys);
    configure(&ledger, VAULT, B256::repeat_byte(0x01), 0, owner_set.clone(), 2);

    let vault = Vault::connect(VAULT, ledger.clone()).await?;
    let network = Arc::new(MemoryContentStore::new());
    let store = TransactionStore::new(network.clone());

    // propose a batch
    let config = vault.load_config().await?;
    assert_eq!(config.nonce, U256::ZERO);
    let batch = build_multi_send(MULTI_SEND, &payments())?;
    let proposal = batch.into_vault_transaction(config.nonce, Some(r#"{"note":"payroll"}"#.into()));
    let digest = store.publish(&vault, &proposal).await?;
    assert_eq!(digest, vault.tx_hash(&proposal));

    // a co-owner only learns the digest
    let fetched = store.fetch(digest).await?;
    assert_eq!(fetched, proposal);
    let calls = decode_multi_send(
        MULTI_SEND,
        &MetaTransaction {
            to: fetched.to,
            value: fetched.value,
            data: fetched.data.clone(),
            operation: fetched.operation,
        },
    );
    assert_eq!(calls, payments());

    let signatures = confirm(&vault, &fetched, &[&keys[0], &keys[2]]).await?;
    let exec = vault.build_exec_data(&fetched, &signatures, None).await?;
    let root = verify_validation_data(digest, &owner_set, &exec.validation_data)?;
    assert_eq!(root, build_root(&owner_set)?);

    let call = IStatelessVault::execTransactionCall::abi_decode(&exec.calldata())?;
    assert_eq!(call.to, MULTI_SEND);
    assert_eq!(call.operation, 1);
    assert_eq!(call.nonce, U256::ZERO);

    // the executor submits, the ledger records it
    assert_eq!(
        vault.load_transaction_state(digest).await?,
        TransactionStatus::Unknown
    );
    executed(&ledger, VAULT, B256::repeat_byte(0x02), 0, digest);
    assert_eq!(
        vault.load_transaction_state(digest).await?,
        TransactionStatus::Success
    );
    assert_eq!(vault.load_config().await?.nonce, U256::from(1));
    assert!(matches!(
        vault.build_exec_data(&fetched, &signatures, None).await,
        Err(VaultError::InvalidNonce { .. })
    ));

    // replace the owner set
    let newcomer = LocalOwner::random();
    let mut new_owner_set = vec![owner_set[1], newcomer.address()];
    new_owner_set.sort();
    let change_digest = B256::repeat_byte(0xc4);
    ledger.set_call_result(
        VAULT,
        IStatelessVault::generateConfigChangeHashCall::SELECTOR,
        change_digest.0.to_vec().into(),
    );

    let mut update_signatures = Vec::new();
    for key in [&keys[0], &keys[1]] {
        update_signatures.push(
            vault
                .sign_update(&new_owner_set, U256::from(1), U256::from(1), key)
                .await?,
        );
    }
    let update = vault
        .build_update_data(
            new_owner_set.clone(),
            U256::from(1),
            U256::from(1),
            &update_signatures,
            None,
        )
        .await?;
    verify_validation_data(change_digest, &owner_set, &update.validation_data)?;

    configure(&ledger, VAULT, B256::repeat_byte(0x03), 2, new_owner_set.clone(), 1);
    let config = vault.load_config().await?;
    assert_eq!(config.signers, new_owner_set);
    assert_eq!(config.threshold, U256::from(1));
    assert_eq!(config.nonce, U256::from(2));

    let history = vault.load_transactions().await?;
    assert_eq!(
        history,
        vec![
            VaultAction::ConfigUpdate {
                ledger_tx_id: B256::repeat_byte(0x03),
                nonce: Some(U256::from(1)),
            },
            VaultAction::ExecutedTransaction {
                vault_digest: digest,
                ledger_tx_id: B256::repeat_byte(0x02),
                nonce: U256::ZERO,
                success: true,
            },
            VaultAction::ConfigUpdate {
                ledger_tx_id: B256::repeat_byte(0x01),
                nonce: None,
            },
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_confirmations_must_follow_owner_order() -> Result<()> {
    let ledger = memory_ledger(1);
    let keys = owners(4);
    configure(&ledger, VAULT, B256::repeat_byte(0x01), 0, addresses(&keys), 2);
    let vault = Vault::new(VAULT, 1, ledger);

    let tx = VaultTransaction::new(
        Address::repeat_byte(0x42),
        U256::ZERO,
        Bytes::new(),
        Operation::Call,
        U256::ZERO,
        None,
    );

    let reversed = confirm(&vault, &tx, &[&keys[3], &keys[1]]).await?;
    assert!(matches!(
        vault.build_exec_data(&tx, &reversed, None).await,
        Err(VaultError::InvalidSigner { signer, .. }) if signer == keys[1].address()
    ));

    let repeated = confirm(&vault, &tx, &[&keys[1], &keys[1]]).await?;
    assert!(matches!(
        vault.build_exec_data(&tx, &repeated, None).await,
        Err(VaultError::DuplicateSigner { .. })
    ));

    let outsider = LocalOwner::random();
    let foreign = confirm(&vault, &tx, &[&keys[0], &outsider]).await?;
    assert!(matches!(
        vault.build_exec_data(&tx, &foreign, None).await,
        Err(VaultError::InvalidSigner { signer, .. }) if signer == outsider.address()
    ));

    let single = confirm(&vault, &tx, &[&keys[2]]).await?;
    assert!(matches!(
        vault.build_exec_data(&tx, &single, None).await,
        Err(VaultError::MissingConfirmations)
    ));

    let ordered = confirm(&vault, &tx, &[&keys[1], &keys[3]]).await?;
    let exec = vault.build_exec_data(&tx, &ordered, None).await?;
    verify_validation_data(vault.tx_hash(&tx), &addresses(&keys), &exec.validation_data)?;

    Ok(())
}

#[tokio::test]
async fn test_unconfigured_vault() {
    let vault = Vault::new(VAULT, 1, memory_ledger(1));
    assert!(matches!(
        vault.load_config().await,
        Err(VaultError::ConfigNotFound)
    ));
    assert!(matches!(
        vault.load_transactions().await,
        Err(VaultError::ConfigNotFound)
    ));
}

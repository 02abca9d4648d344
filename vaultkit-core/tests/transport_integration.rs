//! Vault reads over JSON-RPC and transaction fetches over the IPFS HTTP API.

use std::sync::Arc;

use alloy_primitives::{address, keccak256, Address, B256, U256};
use mockito::{Matcher, Server};
use serde_json::json;
use vaultkit_core::{
    contract::IStatelessVault::Configuration, ContentId, ContentLoader, IpfsClient,
    JsonRpcLedger, LedgerLog, MemoryContentStore, MemoryLedger, Operation, TransactionStore,
    Vault, VaultTransaction, struct_preimage,
};

const VAULT: Address = address!("0x5afe5afe5afe5afe5afe5afe5afe5afe5afe5afe");

fn rpc_result(result: &serde_json::Value) -> String {
    json!({ "jsonrpc": "2.0", "id": 1, "result": result }).to_string()
}

#[tokio::test]
async fn test_load_config_over_json_rpc() {
    let mut server = Server::new_async().await;
    let owners = vec![Address::repeat_byte(0x10), Address::repeat_byte(0x20)];
    let log = LedgerLog::from_event(
        VAULT,
        B256::repeat_byte(0x01),
        &Configuration {
            currentNonce: U256::from(3),
            signers: owners.clone(),
            threshold: U256::from(2),
            implementation: Address::repeat_byte(0x99),
            signatureChecker: Address::ZERO,
            requestGuard: Address::ZERO,
            fallbackHandler: Address::ZERO,
        },
    );

    server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "method": "eth_chainId" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(&json!("0x4")))
        .create_async()
        .await;
    let logs = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({ "method": "eth_getLogs" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(rpc_result(&json!([log])))
        .expect(2)
        .create_async()
        .await;

    let ledger = Arc::new(JsonRpcLedger::new(server.url()));
    let vault = Vault::connect(VAULT, ledger).await.unwrap();
    assert_eq!(vault.chain_id(), 4);

    let config = vault.load_config().await.unwrap();
    assert_eq!(config.signers, owners);
    assert_eq!(config.nonce, U256::from(3));

    // every load replays the log again
    vault.load_config().await.unwrap();
    logs.assert_async().await;
}

#[tokio::test]
async fn test_fetch_transaction_over_ipfs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();

    let vault = Vault::new(VAULT, 4, Arc::new(MemoryLedger::new(4)));
    let published = Arc::new(MemoryContentStore::new());
    let tx = VaultTransaction::new(
        Address::repeat_byte(0x42),
        U256::from(1),
        vec![0xde, 0xad, 0xbe, 0xef].into(),
        Operation::Call,
        U256::ZERO,
        Some("{}".to_string()),
    );
    let digest = TransactionStore::new(published.clone())
        .publish(&vault, &tx)
        .await
        .unwrap();

    let mut server = Server::new_async().await;
    let struct_hash = keccak256(struct_preimage(&tx.to_typed()));
    for hash in [
        digest,
        struct_hash,
        keccak256(&tx.data),
        tx.meta_hash,
    ] {
        let id = ContentId::from_digest(hash).unwrap();
        let content = published.get(&id).await.unwrap();
        server
            .mock("POST", "/api/v0/cat")
            .match_query(Matcher::UrlEncoded("arg".into(), id.to_string()))
            .with_status(200)
            .with_body(content)
            .create_async()
            .await;
    }

    let ipfs = IpfsClient::new(server.url());
    let fetched = TransactionStore::fetch_with(&ipfs, digest).await.unwrap();
    assert_eq!(fetched, tx);
    assert_eq!(fetched.meta.as_deref(), Some("{}"));
}

//! Developer CLI for VaultKit.
//!
//! Reads vault state from a JSON-RPC node, exchanges transactions over the IPFS
//! HTTP API and prints everything as JSON.

use std::{path::PathBuf, sync::Arc};

use alloy::signers::{local::PrivateKeySigner, SignerSync};
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use eyre::{eyre, Result, WrapErr};
use serde::Serialize;
use serde_json::json;
use vaultkit_core::{
    defaults::{DEFAULT_IPFS_URL, MULTI_SEND},
    factory::{calculate_address, creation_data, deploy_calldata, salt_nonce, VaultSetup},
    merkle::{build_proof, build_root},
    multisend::{decode_multi_send, MetaTransaction},
    primitives::ParseFromString,
    IpfsClient, JsonRpcLedger, MessageSigner, Network, Operation, TransactionStore, Vault,
    VaultError, VaultKitConfig, VaultResult, VaultTransaction,
};

#[derive(Parser)]
#[command(name = "vaultkit")]
#[command(about = "Inspect, propose and confirm stateless multisig vault transactions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file (`rpcUrl`, `ipfsUrl`, `chainId`, `multiSend`)
    #[arg(long, global = true, env = "VAULT_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of the ledger
    #[arg(long, global = true, env = "VAULT_RPC_URL")]
    rpc_url: Option<String>,

    /// IPFS HTTP API endpoint
    #[arg(long, global = true, env = "VAULT_IPFS_URL")]
    ipfs_url: Option<String>,

    /// Network name; the chain id is queried from the node when omitted
    #[arg(long, global = true, env = "VAULT_NETWORK")]
    network: Option<Network>,

    /// Vault address
    #[arg(long, global = true, env = "VAULT_ADDRESS", value_parser = address)]
    vault: Option<Address>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current vault configuration
    Config,

    /// List configuration changes and executions, newest first
    History,

    /// Show whether a transaction was executed
    Status {
        /// Vault digest of the transaction
        #[arg(value_parser = digest)]
        digest: B256,
    },

    /// Download a proposed transaction by its digest
    Fetch {
        /// Vault digest of the transaction
        #[arg(value_parser = digest)]
        digest: B256,
    },

    /// Publish a transaction proposal
    Publish {
        /// Call target
        #[arg(long, value_parser = address)]
        to: Address,

        /// Wei forwarded with the call
        #[arg(long, default_value = "0", value_parser = amount)]
        value: U256,

        /// Hex encoded call data
        #[arg(long, default_value = "0x", value_parser = calldata)]
        data: Bytes,

        /// 0 for CALL, 1 for DELEGATECALL
        #[arg(long, default_value = "0", value_parser = operation)]
        operation: Operation,

        /// Vault nonce, defaults to the current one
        #[arg(long, value_parser = amount)]
        nonce: Option<U256>,

        /// Metadata attached to the proposal
        #[arg(long)]
        meta: Option<String>,
    },

    /// Confirm a published transaction with `VAULT_PRIVATE_KEY`
    Confirm {
        /// Vault digest of the transaction
        #[arg(value_parser = digest)]
        digest: B256,

        /// Hex encoded owner key
        #[arg(long, env = "VAULT_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },

    /// Build `execTransaction` call data from owner confirmations
    ExecData {
        /// Vault digest of the transaction
        #[arg(value_parser = digest)]
        digest: B256,

        /// Confirmations in owner order
        #[arg(long, value_delimiter = ',', value_parser = calldata)]
        signatures: Vec<Bytes>,

        /// Account submitting the transaction
        #[arg(long, value_parser = address)]
        executor: Option<Address>,
    },

    /// Build a Merkle proof for a subset of owners
    Proof {
        /// Full owner list, in vault order
        #[arg(long, required = true, value_delimiter = ',', value_parser = address)]
        owners: Vec<Address>,

        /// Signing owners, in owner order
        #[arg(long, required = true, value_delimiter = ',', value_parser = address)]
        signers: Vec<Address>,
    },

    /// Predict the address of a vault before the factory deploys it
    Predict {
        /// Proxy factory
        #[arg(long, value_parser = address)]
        factory: Address,

        /// Vault implementation the proxy delegates to
        #[arg(long, value_parser = address)]
        singleton: Address,

        /// Initial owners, in vault order
        #[arg(long, required = true, value_delimiter = ',', value_parser = address)]
        owners: Vec<Address>,

        /// Number of confirmations required
        #[arg(long, value_parser = amount)]
        threshold: U256,

        /// Label the salt nonce is derived from
        #[arg(long)]
        salt: String,
    },
}

fn address(s: &str) -> VaultResult<Address> {
    Address::parse_from_str(s, "address")
}

fn digest(s: &str) -> VaultResult<B256> {
    B256::parse_from_str(s, "digest")
}

fn amount(s: &str) -> VaultResult<U256> {
    U256::parse_from_str(s, "amount")
}

fn calldata(s: &str) -> VaultResult<Bytes> {
    Bytes::parse_from_str(s, "data")
}

fn operation(s: &str) -> VaultResult<Operation> {
    let code = s.parse::<u8>().map_err(|err| VaultError::InvalidInput {
        attribute: "operation".to_string(),
        reason: err.to_string(),
    })?;
    Operation::try_from(code)
}

/// An owner key given on the command line.
struct LocalKey(PrivateKeySigner);

#[async_trait]
impl MessageSigner for LocalKey {
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

/// Resolved connection settings plus the vault they point at.
struct Session {
    settings: VaultKitConfig,
    vault: Vault,
}

impl Session {
    fn store(&self) -> TransactionStore {
        TransactionStore::new(Arc::new(IpfsClient::new(self.settings.ipfs_url.clone())))
    }

    async fn fetch(&self, digest: B256) -> Result<VaultTransaction> {
        self.store()
            .fetch(digest)
            .await
            .wrap_err_with(|| format!("failed to fetch transaction {digest}"))
    }
}

impl Cli {
    fn read_config(&self) -> Result<Option<VaultKitConfig>> {
        let Some(path) = &self.config else {
            return Ok(None);
        };
        let json = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Ok(Some(VaultKitConfig::from_json(&json)?))
    }

    fn resolve_rpc_url(&self, settings: Option<&VaultKitConfig>) -> Result<String> {
        self.rpc_url
            .clone()
            .or_else(|| settings.map(|s| s.rpc_url.clone()))
            .ok_or_else(|| eyre!("--rpc-url or VAULT_RPC_URL is required"))
    }

    async fn session(&self) -> Result<Session> {
        let address = self
            .vault
            .ok_or_else(|| eyre!("--vault or VAULT_ADDRESS is required"))?;

        let mut settings = self.read_config()?;
        let rpc_url = self.resolve_rpc_url(settings.as_ref())?;
        if settings.is_none() {
            if let Some(network) = self.network {
                settings = Some(VaultKitConfig::from_network(network, rpc_url.clone()));
            }
        }

        let ledger = Arc::new(JsonRpcLedger::new(rpc_url.clone()));
        let (vault, mut settings) = match settings {
            Some(settings) => (
                Vault::new(address, settings.chain_id, ledger),
                settings,
            ),
            None => {
                let vault = Vault::connect(address, ledger).await?;
                let settings = VaultKitConfig {
                    rpc_url: rpc_url.clone(),
                    ipfs_url: DEFAULT_IPFS_URL.to_string(),
                    chain_id: vault.chain_id(),
                    multi_send: MULTI_SEND,
                };
                (vault, settings)
            }
        };
        settings.rpc_url = rpc_url;
        if let Some(ipfs_url) = &self.ipfs_url {
            settings.ipfs_url.clone_from(ipfs_url);
        }
        tracing::debug!(
            vault = %address,
            chain_id = settings.chain_id,
            ipfs = %settings.ipfs_url,
            "session ready"
        );
        Ok(Session { settings, vault })
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config => {
            let session = cli.session().await?;
            print_json(&session.vault.load_config().await?)?;
        }

        Commands::History => {
            let session = cli.session().await?;
            print_json(&session.vault.load_transactions().await?)?;
        }

        Commands::Status { digest } => {
            let session = cli.session().await?;
            let status = session.vault.load_transaction_state(*digest).await?;
            print_json(&json!({ "vaultDigest": digest, "status": status }))?;
        }

        Commands::Fetch { digest } => {
            let session = cli.session().await?;
            let tx = session.fetch(*digest).await?;
            let calls = decode_multi_send(
                session.settings.multi_send,
                &MetaTransaction {
                    to: tx.to,
                    value: tx.value,
                    data: tx.data.clone(),
                    operation: tx.operation,
                },
            );
            print_json(&json!({ "vaultDigest": digest, "transaction": tx, "calls": calls }))?;
        }

        Commands::Publish {
            to,
            value,
            data,
            operation,
            nonce,
            meta,
        } => {
            let session = cli.session().await?;
            let nonce = match nonce {
                Some(nonce) => *nonce,
                None => session.vault.load_config().await?.nonce,
            };
            let tx = VaultTransaction::new(*to, *value, data.clone(), *operation, nonce, meta.clone());
            let digest = session.store().publish(&session.vault, &tx).await?;
            tracing::info!(%digest, "published proposal");
            print_json(&json!({ "vaultDigest": digest, "transaction": tx }))?;
        }

        Commands::Confirm {
            digest,
            private_key,
        } => {
            let key = private_key
                .parse::<PrivateKeySigner>()
                .map_err(|err| eyre!("invalid private key: {err}"))?;
            let signer = LocalKey(key);
            let session = cli.session().await?;
            let tx = session.fetch(*digest).await?;
            let signature = session.vault.sign_transaction(&tx, &signer).await?;
            print_json(&json!({
                "vaultDigest": digest,
                "signer": signer.address(),
                "signature": signature,
            }))?;
        }

        Commands::ExecData {
            digest,
            signatures,
            executor,
        } => {
            let session = cli.session().await?;
            let tx = session.fetch(*digest).await?;
            let exec = session
                .vault
                .build_exec_data(&tx, signatures, *executor)
                .await?;
            print_json(&json!({
                "to": exec.wallet,
                "data": exec.calldata(),
                "validationData": exec.validation_data,
            }))?;
        }

        Commands::Proof { owners, signers } => {
            let proof = build_proof(signers, owners)?;
            let root = build_root(owners)?;
            print_json(&json!({ "root": root, "proof": proof }))?;
        }

        Commands::Predict {
            factory,
            singleton,
            owners,
            threshold,
            salt,
        } => {
            let rpc_url = cli.resolve_rpc_url(cli.read_config()?.as_ref())?;
            let ledger = JsonRpcLedger::new(rpc_url);
            let initializer = creation_data(&VaultSetup {
                signers: owners.clone(),
                threshold: *threshold,
            })?;
            let salt_nonce = salt_nonce(salt);
            let vault =
                calculate_address(&ledger, *factory, *singleton, &initializer, salt_nonce).await?;
            print_json(&json!({
                "vault": vault,
                "factory": factory,
                "data": deploy_calldata(*singleton, initializer, salt_nonce),
                "saltNonce": salt_nonce,
            }))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_proof_lists() {
        let cli = Cli::try_parse_from([
            "vaultkit",
            "proof",
            "--owners",
            "0x1000000000000000000000000000000000000001,0x1000000000000000000000000000000000000002",
            "--signers",
            "0x1000000000000000000000000000000000000002",
        ])
        .unwrap();
        let Commands::Proof { owners, signers } = cli.command else {
            panic!("expected proof command");
        };
        assert_eq!(owners.len(), 2);
        assert_eq!(signers, vec![owners[1]]);
    }

    #[test]
    fn test_parse_predict() {
        let cli = Cli::try_parse_from([
            "vaultkit",
            "predict",
            "--factory",
            "0x76e2cfc1f5fa8f6a5b3fc4c8f4788f0116861f9b",
            "--singleton",
            "0x5555555555555555555555555555555555555555",
            "--owners",
            "0x1000000000000000000000000000000000000001,0x1000000000000000000000000000000000000002",
            "--threshold",
            "2",
            "--salt",
            "treasury",
        ])
        .unwrap();
        let Commands::Predict {
            owners, threshold, ..
        } = cli.command
        else {
            panic!("expected predict command");
        };
        assert_eq!(owners.len(), 2);
        assert_eq!(threshold, U256::from(2));
    }

    #[test]
    fn test_parse_publish_defaults() {
        let cli = Cli::try_parse_from([
            "vaultkit",
            "publish",
            "--to",
            "0x8D29bE29923b68abfDD21e541b9374737B49cdAD",
        ])
        .unwrap();
        let Commands::Publish {
            value,
            data,
            operation,
            nonce,
            ..
        } = cli.command
        else {
            panic!("expected publish command");
        };
        assert_eq!(value, U256::ZERO);
        assert!(data.is_empty());
        assert_eq!(operation, Operation::Call);
        assert_eq!(nonce, None);
    }

    #[test]
    fn test_rejects_unknown_operation() {
        assert!(operation("2").is_err());
        assert!(operation("call").is_err());
        assert_eq!(operation("1").unwrap(), Operation::DelegateCall);
    }

    #[test]
    fn test_network_from_name() {
        let cli = Cli::try_parse_from(["vaultkit", "--network", "xdai", "config"]).unwrap();
        assert_eq!(cli.network, Some(Network::Xdai));
        assert_eq!(DEFAULT_IPFS_URL, VaultKitConfig::from_network(Network::Xdai, "").ipfs_url);
    }
}

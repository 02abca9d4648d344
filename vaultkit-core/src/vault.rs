//! The vault as seen from the ledger: configuration, history and the payloads
//! owners sign and executors submit.

use std::{fmt, sync::Arc};

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{Eip712Domain, SolCall, SolStruct};
use async_trait::async_trait;

use crate::{
    contract::IStatelessVault,
    error::{VaultError, VaultResult},
    ledger::{Ledger, LogFilter},
    reconstruct::{
        decode_events, project_actions, reconstruct_config, transaction_status, VaultEvent,
    },
    types::{
        ensure_threshold, ensure_unique_signers, TransactionStatus, VaultAction, VaultConfig,
        VaultTransaction,
    },
    validation::{format_signatures, prepare_eth_sign_signature, ValidationData},
};

/// EIP-712 domain of the vault at `vault` on chain `chain_id`.
///
/// Only `chainId` and `verifyingContract` are part of the domain.
#[must_use]
pub fn vault_domain(chain_id: u64, vault: Address) -> Eip712Domain {
    Eip712Domain::new(None, None, Some(U256::from(chain_id)), Some(vault), None)
}

/// Something that can produce EIP-191 (`personal_sign`) signatures for an owner.
///
/// Key custody stays with the implementor; the vault only hands out digests.
#[async_trait]
pub trait MessageSigner: Send + Sync {
    /// The owner address the signatures recover to.
    fn address(&self) -> Address;

    /// Signs the EIP-191 message of `message`, returning `r ‖ s ‖ v`.
    ///
    /// # Errors
    /// Returns an error if the signature cannot be produced.
    async fn sign_message(&self, message: &[u8]) -> VaultResult<Bytes>;
}

/// Everything needed to submit `execTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecInfo {
    /// The vault to call.
    pub wallet: Address,
    /// Encoded [`ValidationData`].
    pub validation_data: Bytes,
    /// The transaction being executed.
    pub transaction: VaultTransaction,
}

impl ExecInfo {
    /// ABI-encoded `execTransaction` call, reverting if the inner call fails.
    #[must_use]
    pub fn calldata(&self) -> Bytes {
        let tx = &self.transaction;
        IStatelessVault::execTransactionCall {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: tx.operation.into(),
            minAvailableGas: tx.min_available_gas,
            nonce: tx.nonce,
            metaHash: tx.meta_hash,
            validationData: self.validation_data.clone(),
            revertOnFailure: true,
        }
        .abi_encode()
        .into()
    }
}

/// Everything needed to submit `updateConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    /// The vault to call.
    pub wallet: Address,
    /// Encoded [`ValidationData`], proven against the current owners.
    pub validation_data: Bytes,
    /// Implementation kept from the current configuration.
    pub implementation: Address,
    /// New owner set.
    pub signers: Vec<Address>,
    /// New threshold.
    pub threshold: U256,
    /// Signature checker kept from the current configuration.
    pub signature_checker: Address,
    /// Request guard kept from the current configuration.
    pub request_guard: Address,
    /// Fallback handler kept from the current configuration.
    pub fallback_handler: Address,
    /// Nonce consumed by the update.
    pub nonce: U256,
}

impl UpdateInfo {
    /// ABI-encoded `updateConfig` call.
    #[must_use]
    pub fn calldata(&self) -> Bytes {
        IStatelessVault::updateConfigCall {
            implementation: self.implementation,
            signers: self.signers.clone(),
            threshold: self.threshold,
            signatureChecker: self.signature_checker,
            requestGuard: self.request_guard,
            fallbackHandler: self.fallback_handler,
            hookBytes: Bytes::new(),
            nonce: self.nonce,
            metaData: Bytes::new(),
            validationData: self.validation_data.clone(),
        }
        .abi_encode()
        .into()
    }
}

/// A stateless vault on a ledger.
///
/// Nothing is cached: every load replays the full event log.
#[derive(Clone)]
pub struct Vault {
    address: Address,
    chain_id: u64,
    ledger: Arc<dyn Ledger>,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// A vault at `address` on a ledger with a known chain id.
    #[must_use]
    pub fn new(address: Address, chain_id: u64, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            address,
            chain_id,
            ledger,
        }
    }

    /// A vault at `address`, asking the ledger for its chain id.
    ///
    /// # Errors
    /// Returns an error if the chain id cannot be queried.
    pub async fn connect(address: Address, ledger: Arc<dyn Ledger>) -> VaultResult<Self> {
        let chain_id = ledger.chain_id().await?;
        Ok(Self::new(address, chain_id, ledger))
    }

    /// Address of the vault contract.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Chain the vault lives on.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// The ledger this vault reads from.
    #[must_use]
    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// EIP-712 domain transactions of this vault are signed under.
    #[must_use]
    pub fn domain(&self) -> Eip712Domain {
        vault_domain(self.chain_id, self.address)
    }

    /// Vault digest of `tx`, computed locally.
    #[must_use]
    pub fn tx_hash(&self, tx: &VaultTransaction) -> B256 {
        tx.to_typed().eip712_signing_hash(&self.domain())
    }

    /// Vault digest of `tx` as computed by the contract's `generateTxHash`.
    ///
    /// # Errors
    /// Returns an error if the call fails or returns malformed output.
    pub async fn remote_tx_hash(&self, tx: &VaultTransaction) -> VaultResult<B256> {
        let call = IStatelessVault::generateTxHashCall {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: tx.operation.into(),
            minAvailableGas: tx.min_available_gas,
            nonce: tx.nonce,
            metaHash: tx.meta_hash,
        };
        let output = self.ledger.call(self.address, call.abi_encode().into()).await?;
        Ok(IStatelessVault::generateTxHashCall::abi_decode_returns(&output)?)
    }

    /// Digest owners sign to move `config` to a new owner set, as computed by
    /// the contract's `generateConfigChangeHash`.
    ///
    /// # Errors
    /// Returns an error if the call fails or returns malformed output.
    pub async fn config_change_hash(
        &self,
        config: &VaultConfig,
        new_signers: &[Address],
        new_threshold: U256,
        nonce: U256,
    ) -> VaultResult<B256> {
        // `address[]` packed: every element left-padded to a word
        let signers: Vec<u8> = new_signers
            .iter()
            .flat_map(|signer| signer.into_word().0)
            .collect();
        let call = IStatelessVault::generateConfigChangeHashCall {
            implementation: config.implementation,
            signers: signers.into(),
            threshold: new_threshold,
            signatureChecker: config.signature_checker,
            requestGuard: config.request_guard,
            fallbackHandler: config.fallback_handler,
            hookBytes: Bytes::new(),
            nonce,
            metaData: Bytes::new(),
        };
        let output = self.ledger.call(self.address, call.abi_encode().into()).await?;
        Ok(IStatelessVault::generateConfigChangeHashCall::abi_decode_returns(&output)?)
    }

    async fn events(&self) -> VaultResult<Vec<VaultEvent>> {
        let logs = self
            .ledger
            .get_logs(&LogFilter::vault_events(self.address))
            .await?;
        log::debug!("replaying {} logs of vault {}", logs.len(), self.address);
        Ok(decode_events(&logs))
    }

    /// Current configuration, replayed from the event log.
    ///
    /// # Errors
    /// `ConfigNotFound` if the log holds no configuration; ledger errors otherwise.
    pub async fn load_config(&self) -> VaultResult<VaultConfig> {
        reconstruct_config(&self.events().await?)
    }

    /// Vault history, most recent first.
    ///
    /// # Errors
    /// `ConfigNotFound` if the log holds no vault event; ledger errors otherwise.
    pub async fn load_transactions(&self) -> VaultResult<Vec<VaultAction>> {
        let events = self.events().await?;
        if events.is_empty() {
            return Err(VaultError::ConfigNotFound);
        }
        Ok(project_actions(&events))
    }

    /// Execution status of the transaction with digest `vault_digest`.
    ///
    /// # Errors
    /// Returns an error if the ledger cannot be queried.
    pub async fn load_transaction_state(
        &self,
        vault_digest: B256,
    ) -> VaultResult<TransactionStatus> {
        let logs = self
            .ledger
            .get_logs(&LogFilter::executions_of(self.address, vault_digest))
            .await?;
        Ok(transaction_status(&decode_events(&logs), vault_digest))
    }

    /// Builds the `execTransaction` payload for `tx` from owner `signatures`.
    ///
    /// Without signatures, the sole owner of a single-owner vault may authorize
    /// the transaction by passing itself as `executor`.
    ///
    /// # Errors
    /// - `InvalidNonce` if `tx` is not bound to the current nonce.
    /// - Signature errors from [`format_signatures`].
    pub async fn build_exec_data(
        &self,
        tx: &VaultTransaction,
        signatures: &[Bytes],
        executor: Option<Address>,
    ) -> VaultResult<ExecInfo> {
        let config = self.load_config().await?;
        ensure_nonce(&config, tx.nonce)?;

        let digest = self.remote_tx_hash(tx).await?;
        let formatted = format_signatures(&config, digest, signatures, executor)?;
        let validation_data =
            ValidationData::build(&config, formatted.signatures, &formatted.signers)?;

        Ok(ExecInfo {
            wallet: self.address,
            validation_data: validation_data.encode(),
            transaction: tx.clone(),
        })
    }

    /// Builds the `updateConfig` payload replacing the owner set.
    ///
    /// Confirmations are proven against the current owners.
    ///
    /// # Errors
    /// - `InvalidNonce` if `nonce` is not the current nonce.
    /// - `DuplicateSigner`/`InvalidThreshold` for an invalid new owner set.
    /// - Signature errors from [`format_signatures`].
    pub async fn build_update_data(
        &self,
        new_signers: Vec<Address>,
        new_threshold: U256,
        nonce: U256,
        signatures: &[Bytes],
        executor: Option<Address>,
    ) -> VaultResult<UpdateInfo> {
        ensure_unique_signers(&new_signers)?;
        ensure_threshold(new_threshold, new_signers.len())?;

        let config = self.load_config().await?;
        ensure_nonce(&config, nonce)?;

        let digest = self
            .config_change_hash(&config, &new_signers, new_threshold, nonce)
            .await?;
        let formatted = format_signatures(&config, digest, signatures, executor)?;
        let validation_data =
            ValidationData::build(&config, formatted.signatures, &formatted.signers)?;

        Ok(UpdateInfo {
            wallet: self.address,
            validation_data: validation_data.encode(),
            implementation: config.implementation,
            signers: new_signers,
            threshold: new_threshold,
            signature_checker: config.signature_checker,
            request_guard: config.request_guard,
            fallback_handler: config.fallback_handler,
            nonce,
        })
    }

    /// Confirms `tx` with `signer`, returning a signature ready for
    /// [`Vault::build_exec_data`].
    ///
    /// # Errors
    /// Returns an error if the digest cannot be obtained or signing fails.
    pub async fn sign_transaction(
        &self,
        tx: &VaultTransaction,
        signer: &dyn MessageSigner,
    ) -> VaultResult<Bytes> {
        let digest = self.remote_tx_hash(tx).await?;
        let signature = signer.sign_message(digest.as_slice()).await?;
        prepare_eth_sign_signature(&signature)
    }

    /// Confirms an owner set change with `signer`, returning a signature ready
    /// for [`Vault::build_update_data`].
    ///
    /// # Errors
    /// Returns an error if the configuration or digest cannot be obtained or signing fails.
    pub async fn sign_update(
        &self,
        new_signers: &[Address],
        new_threshold: U256,
        nonce: U256,
        signer: &dyn MessageSigner,
    ) -> VaultResult<Bytes> {
        let config = self.load_config().await?;
        let digest = self
            .config_change_hash(&config, new_signers, new_threshold, nonce)
            .await?;
        let signature = signer.sign_message(digest.as_slice()).await?;
        prepare_eth_sign_signature(&signature)
    }
}

fn ensure_nonce(config: &VaultConfig, provided: U256) -> VaultResult<()> {
    if config.nonce != provided {
        return Err(VaultError::InvalidNonce {
            expected: config.nonce,
            provided,
        });
    }
    Ok(())
}

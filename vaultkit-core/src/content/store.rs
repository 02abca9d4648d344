use std::sync::Arc;

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct};

use super::{ContentId, ContentLoader, ContentNetwork};
use crate::{
    contract::Transaction,
    error::{VaultError, VaultResult},
    types::{meta_hash, Operation, VaultTransaction},
    vault::Vault,
};

const TYPED_DATA_PREFIX: [u8; 2] = [0x19, 0x01];
const SIGNING_PREIMAGE_LENGTH: usize = 66;
const STRUCT_PREIMAGE_LENGTH: usize = 8 * 32;

/// Publishes and fetches vault transactions on a content network.
///
/// A transaction is stored as four independent payloads, each under the
/// keccak-256 digest of its bytes:
/// - the metadata (if any), referenced by `metaHash`,
/// - the call data, referenced by the struct pre-image,
/// - the struct pre-image `typeHash ‖ encodeData(tx)`,
/// - the signing pre-image `0x1901 ‖ domainSeparator ‖ structHash`.
///
/// The digest of the signing pre-image is the vault digest, so a transaction
/// can be recovered from the digest alone.
#[derive(Clone)]
pub struct TransactionStore {
    network: Arc<dyn ContentNetwork>,
}

impl std::fmt::Debug for TransactionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStore").finish_non_exhaustive()
    }
}

impl TransactionStore {
    /// A store writing to and reading from `network`.
    #[must_use]
    pub fn new(network: Arc<dyn ContentNetwork>) -> Self {
        Self { network }
    }

    async fn put(&self, content: Vec<u8>) -> VaultResult<ContentId> {
        let expected = ContentId::for_content(&content)?;
        let returned = self.network.add(content).await?;
        if returned != expected {
            return Err(VaultError::ContentAddressMismatch {
                expected: expected.to_string(),
                returned: returned.to_string(),
            });
        }
        Ok(expected)
    }

    /// Publishes `tx` for `vault` and returns its vault digest.
    ///
    /// The digest is cross-checked against the contract once every payload is
    /// written.
    ///
    /// # Errors
    /// - `HashMismatch` if `meta_hash` does not commit to `meta`, or the
    ///   contract derives another digest.
    /// - `ContentAddressMismatch` if the network files a payload under another identifier.
    /// - Network and ledger errors.
    pub async fn publish(&self, vault: &Vault, tx: &VaultTransaction) -> VaultResult<B256> {
        let computed_meta_hash = meta_hash(tx.meta.as_deref());
        if computed_meta_hash != tx.meta_hash {
            return Err(VaultError::HashMismatch {
                expected: tx.meta_hash,
                computed: computed_meta_hash,
            });
        }

        if let Some(meta) = &tx.meta {
            let id = self.put(meta.as_bytes().to_vec()).await?;
            log::debug!("published metadata {id}");
        }

        let id = self.put(tx.data.to_vec()).await?;
        log::debug!("published data {id}");

        let struct_preimage = struct_preimage(&tx.to_typed());
        let struct_hash = keccak256(&struct_preimage);
        let id = self.put(struct_preimage).await?;
        log::debug!("published transaction {id}");

        let signing_preimage = signing_preimage(&vault.domain(), struct_hash);
        let vault_digest = keccak256(&signing_preimage);
        let id = self.put(signing_preimage).await?;
        log::debug!("published transaction hash {id}");

        let expected = vault.remote_tx_hash(tx).await?;
        if expected != vault_digest {
            return Err(VaultError::HashMismatch {
                expected,
                computed: vault_digest,
            });
        }
        Ok(vault_digest)
    }

    /// Fetches the transaction with digest `vault_digest` from the network.
    ///
    /// # Errors
    /// See [`TransactionStore::fetch_with`].
    pub async fn fetch(&self, vault_digest: B256) -> VaultResult<VaultTransaction> {
        Self::fetch_with(self.network.as_ref(), vault_digest).await
    }

    /// Fetches the transaction with digest `vault_digest` through `loader`.
    ///
    /// Missing or undecodable metadata is logged and leaves `meta` empty.
    ///
    /// # Errors
    /// - `HashMismatch` if a payload does not hash to the digest it was requested by.
    /// - `InvalidInput` if a pre-image is malformed.
    /// - Loader errors for everything but the metadata.
    pub async fn fetch_with<L: ContentLoader + ?Sized>(
        loader: &L,
        vault_digest: B256,
    ) -> VaultResult<VaultTransaction> {
        let signing_preimage = pull(loader, vault_digest).await?;
        if signing_preimage.len() != SIGNING_PREIMAGE_LENGTH
            || signing_preimage[..2] != TYPED_DATA_PREFIX
        {
            return Err(malformed("signing pre-image", vault_digest));
        }
        let struct_hash = B256::from_slice(&signing_preimage[34..66]);

        let struct_preimage = pull(loader, struct_hash).await?;
        if struct_preimage.len() != STRUCT_PREIMAGE_LENGTH {
            return Err(malformed("transaction pre-image", struct_hash));
        }
        let word = |i: usize| B256::from_slice(&struct_preimage[i * 32..(i + 1) * 32]);

        if word(0) != keccak256(Transaction::eip712_encode_type().as_bytes()) {
            return Err(malformed("transaction type", struct_hash));
        }
        let to = word(1);
        if to[..12].iter().any(|byte| *byte != 0) {
            return Err(malformed("transaction target", struct_hash));
        }
        let operation = u8::try_from(U256::from_be_bytes(word(4).0))
            .map_err(|_| malformed("transaction operation", struct_hash))
            .and_then(Operation::try_from)?;

        let data_hash = word(3);
        let data = pull(loader, data_hash).await?;

        let meta_hash = word(7);
        let meta = if meta_hash.is_zero() {
            None
        } else {
            load_meta(loader, meta_hash).await
        };

        Ok(VaultTransaction {
            to: Address::from_word(to),
            value: U256::from_be_bytes(word(2).0),
            data: data.into(),
            operation,
            min_available_gas: U256::from_be_bytes(word(5).0),
            nonce: U256::from_be_bytes(word(6).0),
            meta_hash,
            meta,
        })
    }
}

/// `typeHash ‖ encodeData(tx)`, whose digest is the EIP-712 struct hash.
#[must_use]
pub fn struct_preimage(tx: &Transaction) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(STRUCT_PREIMAGE_LENGTH);
    preimage.extend_from_slice(tx.eip712_type_hash().as_slice());
    preimage.extend_from_slice(&tx.eip712_encode_data());
    preimage
}

/// `0x1901 ‖ domainSeparator ‖ structHash`, whose digest is the vault digest.
#[must_use]
pub fn signing_preimage(domain: &Eip712Domain, struct_hash: B256) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(SIGNING_PREIMAGE_LENGTH);
    preimage.extend_from_slice(&TYPED_DATA_PREFIX);
    preimage.extend_from_slice(domain.separator().as_slice());
    preimage.extend_from_slice(struct_hash.as_slice());
    preimage
}

async fn pull<L: ContentLoader + ?Sized>(loader: &L, digest: B256) -> VaultResult<Vec<u8>> {
    let id = ContentId::from_digest(digest)?;
    let content = loader.get(&id).await?;
    let computed = keccak256(&content);
    if computed != digest {
        return Err(VaultError::HashMismatch {
            expected: digest,
            computed,
        });
    }
    log::debug!("pulled {id}");
    Ok(content)
}

async fn load_meta<L: ContentLoader + ?Sized>(loader: &L, meta_hash: B256) -> Option<String> {
    let meta = pull(loader, meta_hash).await.and_then(|bytes| {
        String::from_utf8(bytes).map_err(|err| VaultError::SerializationError {
            error: err.to_string(),
        })
    });
    match meta {
        Ok(meta) => Some(meta),
        Err(err) => {
            let unavailable = VaultError::MetadataUnavailable {
                meta_hash,
                error: err.to_string(),
            };
            log::warn!("{unavailable}");
            None
        }
    }
}

fn malformed(what: &str, digest: B256) -> VaultError {
    VaultError::InvalidInput {
        attribute: "content".to_string(),
        reason: format!("malformed {what} under {digest}"),
    }
}

//! Content-addressed storage of transaction payloads.
//!
//! Every payload is stored under the keccak-256 digest of its bytes, wrapped in
//! a `CIDv1` (`raw` codec, `keccak-256` multihash). This lets a ledger digest be
//! used directly as a storage key.

use std::{fmt, str::FromStr};

use alloy_primitives::{keccak256, B256};
use async_trait::async_trait;
use cid::{multihash::Multihash, Cid};

use crate::error::{VaultError, VaultResult};

mod ipfs;
mod memory;
mod store;

pub use ipfs::{IpfsClient, MAX_CONTENT_SIZE};
pub use memory::MemoryContentStore;
pub use store::{signing_preimage, struct_preimage, TransactionStore};

/// Multicodec code of keccak-256.
pub const KECCAK_256_CODE: u64 = 0x1b;
/// Multicodec code of raw binary content.
pub const RAW_CODEC: u64 = 0x55;

/// Identifier of a payload on the content network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentId(Cid);

impl ContentId {
    /// Identifier of the content whose keccak-256 digest is `digest`.
    ///
    /// # Errors
    /// Only fails if the multihash cannot hold a 32 byte digest.
    pub fn from_digest(digest: B256) -> VaultResult<Self> {
        let hash = Multihash::<64>::wrap(KECCAK_256_CODE, digest.as_slice()).map_err(|err| {
            VaultError::SerializationError {
                error: format!("multihash: {err}"),
            }
        })?;
        Ok(Self(Cid::new_v1(RAW_CODEC, hash)))
    }

    /// Identifier under which `content` is stored.
    ///
    /// # Errors
    /// See [`ContentId::from_digest`].
    pub fn for_content(content: &[u8]) -> VaultResult<Self> {
        Self::from_digest(keccak256(content))
    }

    /// The keccak-256 digest this identifier addresses.
    ///
    /// # Errors
    /// `InvalidInput` if the identifier uses another hash function or length.
    pub fn digest(&self) -> VaultResult<B256> {
        let hash = self.0.hash();
        if hash.code() != KECCAK_256_CODE || hash.size() != 32 {
            return Err(VaultError::InvalidInput {
                attribute: "content_id".to_string(),
                reason: format!("{} is not a keccak-256 identifier", self.0),
            });
        }
        Ok(B256::from_slice(hash.digest()))
    }

    /// The underlying CID.
    #[must_use]
    pub const fn cid(&self) -> &Cid {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ContentId {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::try_from(s)
            .map(Self)
            .map_err(|err| VaultError::InvalidInput {
                attribute: "content_id".to_string(),
                reason: format!("{s}: {err}"),
            })
    }
}

/// Read access to content-addressed payloads.
///
/// Implement this to put a cache or a local mirror in front of the network.
#[async_trait]
pub trait ContentLoader: Send + Sync {
    /// Returns the bytes stored under `id`.
    ///
    /// # Errors
    /// Returns an error if the content cannot be retrieved.
    async fn get(&self, id: &ContentId) -> VaultResult<Vec<u8>>;
}

/// A content network that also accepts new payloads.
#[async_trait]
pub trait ContentNetwork: ContentLoader {
    /// Stores `content` and returns the identifier assigned by the network.
    ///
    /// # Errors
    /// Returns an error if the content cannot be stored.
    async fn add(&self, content: Vec<u8>) -> VaultResult<ContentId>;
}

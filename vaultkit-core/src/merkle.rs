//! Owner-set Merkle proofs.
//!
//! The vault commits to the root of a binary tree whose leaves are
//! `keccak256(uint256(owner))` in owner order. A proof lets the signing owners
//! authenticate against that root without revealing the addresses of the
//! owners that did not sign: signer leaves are elided (the verifier recovers
//! them from signatures), and only the digests of sibling subtrees that contain
//! no signer are shipped.
//!
//! Levels with an odd number of nodes are padded on the right with
//! `keccak256(uint256(0))`.

use alloy_primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};

use crate::{
    error::{VaultError, VaultResult},
    types::ensure_unique_signers,
};

/// Membership proof for a set of signing owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Positions of the signers within the full owner list, in signer order.
    pub indices: Vec<usize>,
    /// Sibling digests, level by level and left to right.
    pub hashes: Vec<B256>,
}

/// Node of the prover's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProofNode {
    /// Subtree containing at least one signer. Reconstructed by the verifier.
    Elided,
    /// Subtree without signers, known only to the prover.
    Digest(B256),
}

/// Node of the verifier's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifyNode {
    /// Subtree whose digest must be taken from the proof.
    Unknown,
    /// Subtree derived from recovered signers.
    Known(B256),
}

/// Leaf digest of an owner: `keccak256(abi.encodePacked(uint256(owner)))`.
#[must_use]
pub fn leaf_hash(owner: &Address) -> B256 {
    keccak256(owner.into_word())
}

/// Digest used to pad the right side of odd levels.
#[must_use]
pub fn padding_hash() -> B256 {
    keccak256(B256::ZERO)
}

fn hash_pair(left: &B256, right: &B256) -> B256 {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(left.as_slice());
    buf[32..].copy_from_slice(right.as_slice());
    keccak256(buf)
}

/// Builds the proof that `tx_signers` belong to `all_signers`.
///
/// `indices` follow the order of `tx_signers`; each signer consumes the first
/// unused position holding its address.
///
/// # Errors
/// - `InvalidInput` if the owner set or the signer set is empty.
/// - `DuplicateSigner` if either list repeats an address.
/// - `InvalidSigner` if a signer is not an owner.
pub fn build_proof(
    tx_signers: &[Address],
    all_signers: &[Address],
) -> VaultResult<MerkleProof> {
    if all_signers.is_empty() {
        return Err(VaultError::InvalidInput {
            attribute: "all_signers".to_string(),
            reason: "owner set is empty".to_string(),
        });
    }
    if tx_signers.is_empty() {
        return Err(VaultError::InvalidInput {
            attribute: "tx_signers".to_string(),
            reason: "no signers provided".to_string(),
        });
    }
    ensure_unique_signers(all_signers)?;
    ensure_unique_signers(tx_signers)?;

    let mut owners: Vec<Option<&Address>> = all_signers.iter().map(Some).collect();
    let indices = tx_signers
        .iter()
        .map(|signer| {
            let index = owners
                .iter()
                .position(|owner| *owner == Some(signer))
                .ok_or_else(|| VaultError::InvalidSigner {
                    signer: *signer,
                    reason: "not an owner".to_string(),
                })?;
            owners[index] = None;
            Ok(index)
        })
        .collect::<VaultResult<Vec<_>>>()?;

    let mut nodes: Vec<ProofNode> = all_signers
        .iter()
        .map(|owner| {
            if tx_signers.contains(owner) {
                ProofNode::Elided
            } else {
                ProofNode::Digest(leaf_hash(owner))
            }
        })
        .collect();

    let mut hashes = Vec::new();
    let mut count = nodes.len();
    while count > 1 {
        for i in (0..count).step_by(2) {
            let left = nodes[i];
            let right = if i + 1 < count {
                nodes[i + 1]
            } else {
                ProofNode::Digest(padding_hash())
            };
            nodes[i / 2] = match (left, right) {
                (ProofNode::Elided, ProofNode::Elided) => ProofNode::Elided,
                (ProofNode::Elided, ProofNode::Digest(sibling))
                | (ProofNode::Digest(sibling), ProofNode::Elided) => {
                    hashes.push(sibling);
                    ProofNode::Elided
                }
                (ProofNode::Digest(left), ProofNode::Digest(right)) => {
                    ProofNode::Digest(hash_pair(&left, &right))
                }
            };
        }
        count = count.div_ceil(2);
    }

    Ok(MerkleProof { indices, hashes })
}

/// Hashes the complete owner tree, i.e. the root the vault commits to.
///
/// # Errors
/// Returns `InvalidInput` for an empty owner set.
pub fn build_root(owners: &[Address]) -> VaultResult<B256> {
    let mut nodes: Vec<B256> = owners.iter().map(leaf_hash).collect();
    if nodes.is_empty() {
        return Err(VaultError::InvalidInput {
            attribute: "owners".to_string(),
            reason: "owner set is empty".to_string(),
        });
    }
    let mut count = nodes.len();
    while count > 1 {
        for i in (0..count).step_by(2) {
            let right = if i + 1 < count {
                nodes[i + 1]
            } else {
                padding_hash()
            };
            nodes[i / 2] = hash_pair(&nodes[i], &right);
        }
        count = count.div_ceil(2);
    }
    Ok(nodes[0])
}

/// Recomputes the owner root from the proven signer positions.
///
/// `signers` pairs each owner index with the address recovered for it and must
/// be strictly increasing by index. Proof hashes are consumed in order wherever
/// a known subtree meets an unknown one.
///
/// # Errors
/// - `DuplicateSigner` / `InvalidSigner` for repeated or out of order indices,
///   or an index outside the owner set.
/// - `InvalidInput` if the proof has too few or too many hashes, or no signer is given.
pub fn verify_proof(
    owner_count: usize,
    signers: &[(usize, Address)],
    hashes: &[B256],
) -> VaultResult<B256> {
    if signers.is_empty() {
        return Err(VaultError::InvalidInput {
            attribute: "signers".to_string(),
            reason: "no signers to verify".to_string(),
        });
    }

    let mut nodes = vec![VerifyNode::Unknown; owner_count];
    let mut previous: Option<usize> = None;
    for (index, signer) in signers {
        match previous {
            Some(prev) if *index == prev => {
                return Err(VaultError::DuplicateSigner { signer: *signer });
            }
            Some(prev) if *index < prev => {
                return Err(VaultError::InvalidSigner {
                    signer: *signer,
                    reason: format!("index {index} is not above {prev}"),
                });
            }
            _ => {}
        }
        let node = nodes.get_mut(*index).ok_or_else(|| VaultError::InvalidSigner {
            signer: *signer,
            reason: format!("index {index} is outside of {owner_count} owners"),
        })?;
        *node = VerifyNode::Known(leaf_hash(signer));
        previous = Some(*index);
    }

    let mut proof = hashes.iter();
    let mut take = |node: VerifyNode| match node {
        VerifyNode::Known(digest) => Ok(digest),
        VerifyNode::Unknown => {
            proof.next().copied().ok_or_else(|| VaultError::InvalidInput {
                attribute: "hashes".to_string(),
                reason: "proof is too short".to_string(),
            })
        }
    };

    let mut count = nodes.len();
    while count > 1 {
        for i in (0..count).step_by(2) {
            let left = nodes[i];
            let right = if i + 1 < count {
                nodes[i + 1]
            } else {
                VerifyNode::Unknown
            };
            nodes[i / 2] = if left == VerifyNode::Unknown && right == VerifyNode::Unknown
            {
                VerifyNode::Unknown
            } else {
                let left = take(left)?;
                let right = take(right)?;
                VerifyNode::Known(hash_pair(&left, &right))
            };
        }
        count = count.div_ceil(2);
    }

    if proof.next().is_some() {
        return Err(VaultError::InvalidInput {
            attribute: "hashes".to_string(),
            reason: "proof has unused hashes".to_string(),
        });
    }

    match nodes[0] {
        VerifyNode::Known(root) => Ok(root),
        VerifyNode::Unknown => Err(VaultError::InvalidInput {
            attribute: "signers".to_string(),
            reason: "root could not be reconstructed".to_string(),
        }),
    }
}

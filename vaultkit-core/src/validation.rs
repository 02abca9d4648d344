//! Encoding of the validation blob passed to `execTransaction`/`updateConfig`.
//!
//! Layout (ABI parameter encoding, order is part of the wire contract):
//! `(uint256 threshold, uint256 ownerCount, address signatureChecker,
//! address requestGuard, uint256[] indices, bytes32[] hashes, bytes signatures)`.
//!
//! Signatures are 65 bytes `r ‖ s ‖ v`. The recovery byte selects how the
//! signer is recovered:
//! - `0x1b`/`0x1c`: the digest itself was signed (typed data).
//! - `0x1f`/`0x20`: the EIP-191 message of the digest was signed (`v + 4`).
//! - `0x01`: approval by the executing owner, whose address sits in `r`.

use alloy_primitives::{eip191_hash_message, Address, Bytes, Signature, B256, U256};
use alloy_sol_types::SolValue;

use crate::{
    error::{VaultError, VaultResult},
    merkle::{build_proof, build_root, verify_proof},
    types::VaultConfig,
};

/// Length of a single packed signature.
pub const SIGNATURE_LENGTH: usize = 65;

const APPROVAL_V: u8 = 0x01;
const TYPED_DATA_V: [u8; 2] = [0x1b, 0x1c];
const ETH_SIGN_V: [u8; 2] = [0x1f, 0x20];

type EncodedValidationData = (U256, U256, Address, Address, Vec<U256>, Vec<B256>, Bytes);

/// Decoded validation blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationData {
    /// Threshold of the configuration being proven.
    pub threshold: U256,
    /// Number of owners in the configuration being proven.
    pub owner_count: U256,
    /// Signature checker of the configuration, zero when unused.
    pub signature_checker: Address,
    /// Request guard of the configuration, zero when unused.
    pub request_guard: Address,
    /// Owner positions of the signers, strictly increasing.
    pub indices: Vec<U256>,
    /// Merkle proof hashes.
    pub hashes: Vec<B256>,
    /// Concatenated 65-byte signatures, in the order of `indices`.
    pub signatures: Bytes,
}

impl ValidationData {
    /// Builds the blob for `signers` (in owner order) of `config`.
    ///
    /// # Errors
    /// Propagates proof construction errors.
    pub fn build(
        config: &VaultConfig,
        signatures: Bytes,
        signers: &[Address],
    ) -> VaultResult<Self> {
        let proof = build_proof(signers, &config.signers)?;
        Ok(Self {
            threshold: config.threshold,
            owner_count: U256::from(config.signers.len()),
            signature_checker: Address::ZERO,
            request_guard: Address::ZERO,
            indices: proof.indices.into_iter().map(U256::from).collect(),
            hashes: proof.hashes,
            signatures,
        })
    }

    /// ABI-encodes the blob.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let encoded: EncodedValidationData = (
            self.threshold,
            self.owner_count,
            self.signature_checker,
            self.request_guard,
            self.indices.clone(),
            self.hashes.clone(),
            self.signatures.clone(),
        );
        encoded.abi_encode_params().into()
    }

    /// Decodes an ABI-encoded blob.
    ///
    /// # Errors
    /// Returns `SerializationError` if `data` does not match the layout.
    pub fn decode(data: &[u8]) -> VaultResult<Self> {
        let (
            threshold,
            owner_count,
            signature_checker,
            request_guard,
            indices,
            hashes,
            signatures,
        ) = EncodedValidationData::abi_decode_params(data)?;
        Ok(Self {
            threshold,
            owner_count,
            signature_checker,
            request_guard,
            indices,
            hashes,
            signatures,
        })
    }
}

/// Signatures ordered by owner index together with the owners that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedSignatures {
    /// Concatenated signatures.
    pub signatures: Bytes,
    /// Recovered signers, in owner order.
    pub signers: Vec<Address>,
}

/// Rewrites the recovery byte of an EIP-191 message signature into the range
/// the vault reserves for such signatures (`00`/`1b` → `1f`, `01`/`1c` → `20`).
///
/// # Errors
/// Returns `InvalidInput` if the signature is not 65 bytes long.
pub fn prepare_eth_sign_signature(signature: &[u8]) -> VaultResult<Bytes> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(VaultError::InvalidInput {
            attribute: "signature".to_string(),
            reason: format!("expected {SIGNATURE_LENGTH} bytes, got {}", signature.len()),
        });
    }
    let mut prepared = signature.to_vec();
    prepared[64] = match prepared[64] {
        0x00 | 0x1b => 0x1f,
        0x01 | 0x1c => 0x20,
        v => v,
    };
    Ok(prepared.into())
}

/// Approval signature for an owner that executes the transaction itself:
/// `uint256(owner) ‖ uint256(0) ‖ 0x01`.
#[must_use]
pub fn approval_signature(owner: Address) -> Bytes {
    let mut signature = Vec::with_capacity(SIGNATURE_LENGTH);
    signature.extend_from_slice(owner.into_word().as_slice());
    signature.extend_from_slice(B256::ZERO.as_slice());
    signature.push(APPROVAL_V);
    signature.into()
}

/// Recovers the owner that produced `signature` over `digest`.
///
/// # Errors
/// Returns `InvalidInput` for malformed signatures or unsupported recovery bytes.
pub fn recover_signer(digest: B256, signature: &[u8]) -> VaultResult<Address> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(VaultError::InvalidInput {
            attribute: "signature".to_string(),
            reason: format!("expected {SIGNATURE_LENGTH} bytes, got {}", signature.len()),
        });
    }
    let r = U256::from_be_slice(&signature[..32]);
    let s = U256::from_be_slice(&signature[32..64]);
    let v = signature[64];

    let (prehash, parity) = match v {
        APPROVAL_V => return Ok(Address::from_word(B256::from(r))),
        v if TYPED_DATA_V.contains(&v) => (digest, v == TYPED_DATA_V[1]),
        v if ETH_SIGN_V.contains(&v) => (eip191_hash_message(digest), v == ETH_SIGN_V[1]),
        v => {
            return Err(VaultError::InvalidInput {
                attribute: "signature".to_string(),
                reason: format!("unsupported recovery byte {v:#04x}"),
            })
        }
    };

    Signature::new(r, s, parity)
        .recover_address_from_prehash(&prehash)
        .map_err(|err| VaultError::InvalidInput {
            attribute: "signature".to_string(),
            reason: err.to_string(),
        })
}

/// Normalizes, recovers and orders the confirmations for `digest`.
///
/// Every signature must recover to an owner positioned after the previous
/// signer. Without signatures, a single-owner vault can be authorized by its
/// owner acting as `executor`.
///
/// # Errors
/// - `InvalidSigner` if a signer is not an owner or is out of owner order.
/// - `DuplicateSigner` if a signer confirms twice.
/// - `MissingConfirmations` if fewer than `threshold` confirmations are present.
pub fn format_signatures(
    config: &VaultConfig,
    digest: B256,
    signatures: &[Bytes],
    executor: Option<Address>,
) -> VaultResult<FormattedSignatures> {
    if signatures.is_empty() {
        return match (config.signers.as_slice(), executor) {
            ([owner], Some(executor)) if *owner == executor => Ok(FormattedSignatures {
                signatures: approval_signature(executor),
                signers: vec![executor],
            }),
            ([_], Some(executor)) => Err(VaultError::InvalidSigner {
                signer: executor,
                reason: "executor is not an owner".to_string(),
            }),
            _ => Err(VaultError::MissingConfirmations),
        };
    }

    let mut packed = Vec::with_capacity(signatures.len() * SIGNATURE_LENGTH);
    let mut signers = Vec::with_capacity(signatures.len());
    let mut previous: Option<usize> = None;
    for signature in signatures {
        let signature = prepare_eth_sign_signature(signature)?;
        let signer = recover_signer(digest, &signature)?;
        let start = previous.map_or(0, |prev| prev + 1);
        let index = config.signers[start.min(config.signers.len())..]
            .iter()
            .position(|owner| *owner == signer)
            .map(|offset| start + offset)
            .ok_or_else(|| match (config.index_of(&signer), previous) {
                (Some(index), Some(prev)) if index == prev => {
                    VaultError::DuplicateSigner { signer }
                }
                (Some(index), _) => VaultError::InvalidSigner {
                    signer,
                    reason: format!("owner index {index} is out of order"),
                },
                (None, _) => VaultError::InvalidSigner {
                    signer,
                    reason: "not an owner".to_string(),
                },
            })?;
        previous = Some(index);
        packed.extend_from_slice(&signature);
        signers.push(signer);
    }

    if U256::from(signers.len()) < config.threshold {
        return Err(VaultError::MissingConfirmations);
    }

    Ok(FormattedSignatures {
        signatures: packed.into(),
        signers,
    })
}

/// Verifies a validation blob off-chain the way the vault does and returns the
/// reconstructed owner root.
///
/// # Errors
/// - `SerializationError` if the blob cannot be decoded.
/// - `InvalidInput` if counts disagree with `owners`.
/// - `InvalidSigner`/`DuplicateSigner` for signatures that do not match their index.
/// - `MissingConfirmations` if the threshold is not reached.
/// - `HashMismatch` if the reconstructed root differs from the root of `owners`.
pub fn verify_validation_data(
    digest: B256,
    owners: &[Address],
    validation_data: &[u8],
) -> VaultResult<B256> {
    let data = ValidationData::decode(validation_data)?;
    if data.owner_count != U256::from(owners.len()) {
        return Err(VaultError::InvalidInput {
            attribute: "owner_count".to_string(),
            reason: format!("blob claims {} owners, expected {}", data.owner_count, owners.len()),
        });
    }
    if data.signatures.len() != data.indices.len() * SIGNATURE_LENGTH {
        return Err(VaultError::InvalidInput {
            attribute: "signatures".to_string(),
            reason: format!(
                "{} bytes of signatures for {} indices",
                data.signatures.len(),
                data.indices.len()
            ),
        });
    }

    let positions = data
        .signatures
        .chunks_exact(SIGNATURE_LENGTH)
        .zip(&data.indices)
        .map(|(signature, index)| {
            let signer = recover_signer(digest, signature)?;
            let index = usize::try_from(*index).map_err(|_| VaultError::InvalidSigner {
                signer,
                reason: format!("index {index} is out of range"),
            })?;
            match owners.get(index) {
                Some(owner) if *owner == signer => Ok((index, signer)),
                _ => Err(VaultError::InvalidSigner {
                    signer,
                    reason: format!("not the owner at index {index}"),
                }),
            }
        })
        .collect::<VaultResult<Vec<_>>>()?;

    if U256::from(positions.len()) < data.threshold {
        return Err(VaultError::MissingConfirmations);
    }

    let root = verify_proof(owners.len(), &positions, &data.hashes)?;
    let committed = build_root(owners)?;
    if root != committed {
        return Err(VaultError::HashMismatch {
            expected: committed,
            computed: root,
        });
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::{local::PrivateKeySigner, SignerSync};
    use alloy_primitives::keccak256;

    fn owners_with_keys(count: usize) -> (Vec<PrivateKeySigner>, VaultConfig) {
        let mut keys: Vec<PrivateKeySigner> =
            (0..count).map(|_| PrivateKeySigner::random()).collect();
        keys.sort_by_key(PrivateKeySigner::address);
        let config = VaultConfig {
            implementation: Address::ZERO,
            signature_checker: Address::ZERO,
            request_guard: Address::ZERO,
            fallback_handler: Address::ZERO,
            signers: keys.iter().map(PrivateKeySigner::address).collect(),
            threshold: U256::from(2),
            nonce: U256::ZERO,
        };
        (keys, config)
    }

    fn eth_sign(key: &PrivateKeySigner, digest: B256) -> Bytes {
        let signature = key.sign_message_sync(digest.as_slice()).unwrap();
        prepare_eth_sign_signature(&signature.as_bytes()).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let data = ValidationData {
            threshold: U256::from(2),
            owner_count: U256::from(4),
            signature_checker: Address::ZERO,
            request_guard: Address::ZERO,
            indices: vec![U256::from(1), U256::from(3)],
            hashes: vec![B256::repeat_byte(0xaa), B256::repeat_byte(0xbb)],
            signatures: Bytes::from(vec![0x11; 130]),
        };
        let encoded = data.encode();

        // seven head words, the first two are the plain integers
        assert_eq!(U256::from_be_slice(&encoded[..32]), U256::from(2));
        assert_eq!(U256::from_be_slice(&encoded[32..64]), U256::from(4));
        // indices offset points right after the head
        assert_eq!(U256::from_be_slice(&encoded[128..160]), U256::from(7 * 32));

        assert_eq!(ValidationData::decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            ValidationData::decode(&[0x01, 0x02]),
            Err(VaultError::SerializationError { .. })
        ));
    }

    #[test]
    fn test_prepare_eth_sign_signature() {
        for (input, expected) in [(0x00, 0x1f), (0x1b, 0x1f), (0x01, 0x20), (0x1c, 0x20)] {
            let mut signature = vec![0x42; 65];
            signature[64] = input;
            let prepared = prepare_eth_sign_signature(&signature).unwrap();
            assert_eq!(prepared[64], expected);
            assert_eq!(prepared[..64], signature[..64]);
        }
        assert!(prepare_eth_sign_signature(&[0u8; 64]).is_err());
    }

    #[test]
    fn test_recover_each_signature_kind() {
        let key = PrivateKeySigner::random();
        let digest = keccak256("vault transaction");

        let typed = key.sign_hash_sync(&digest).unwrap().as_bytes();
        assert!(TYPED_DATA_V.contains(&typed[64]));
        assert_eq!(recover_signer(digest, &typed).unwrap(), key.address());

        let eth_sign = eth_sign(&key, digest);
        assert!(ETH_SIGN_V.contains(&eth_sign[64]));
        assert_eq!(recover_signer(digest, &eth_sign).unwrap(), key.address());

        let approval = approval_signature(key.address());
        assert_eq!(recover_signer(digest, &approval).unwrap(), key.address());
    }

    #[test]
    fn test_format_orders_and_verifies() {
        let (keys, config) = owners_with_keys(4);
        let digest = keccak256("transfer");

        let formatted = format_signatures(
            &config,
            digest,
            &[eth_sign(&keys[1], digest), eth_sign(&keys[3], digest)],
            None,
        )
        .unwrap();
        assert_eq!(formatted.signers, vec![keys[1].address(), keys[3].address()]);

        let blob = ValidationData::build(&config, formatted.signatures, &formatted.signers)
            .unwrap()
            .encode();
        let root = verify_validation_data(digest, &config.signers, &blob).unwrap();
        assert_eq!(root, build_root(&config.signers).unwrap());
    }

    #[test]
    fn test_format_rejects_out_of_order_signers() {
        let (keys, config) = owners_with_keys(4);
        let digest = keccak256("transfer");

        let err = format_signatures(
            &config,
            digest,
            &[eth_sign(&keys[3], digest), eth_sign(&keys[1], digest)],
            None,
        )
        .unwrap_err();
        assert!(
            matches!(err, VaultError::InvalidSigner { signer, .. } if signer == keys[1].address())
        );
    }

    #[test]
    fn test_format_rejects_duplicate_and_foreign_signers() {
        let (keys, config) = owners_with_keys(3);
        let digest = keccak256("transfer");

        let err = format_signatures(
            &config,
            digest,
            &[eth_sign(&keys[0], digest), eth_sign(&keys[0], digest)],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::DuplicateSigner { .. }));

        let stranger = PrivateKeySigner::random();
        let err = format_signatures(&config, digest, &[eth_sign(&stranger, digest)], None)
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidSigner { .. }));
    }

    #[test]
    fn test_format_requires_threshold() {
        let (keys, config) = owners_with_keys(3);
        let digest = keccak256("transfer");
        let err = format_signatures(&config, digest, &[eth_sign(&keys[0], digest)], None)
            .unwrap_err();
        assert!(matches!(err, VaultError::MissingConfirmations));
    }

    #[test]
    fn test_single_owner_executor_approval() {
        let (keys, mut config) = owners_with_keys(1);
        config.threshold = U256::from(1);
        let owner = keys[0].address();
        let digest = keccak256("transfer");

        let formatted = format_signatures(&config, digest, &[], Some(owner)).unwrap();
        assert_eq!(formatted.signatures, approval_signature(owner));
        assert_eq!(formatted.signers, vec![owner]);

        assert!(matches!(
            format_signatures(&config, digest, &[], Some(Address::repeat_byte(9))),
            Err(VaultError::InvalidSigner { .. })
        ));
        assert!(matches!(
            format_signatures(&config, digest, &[], None),
            Err(VaultError::MissingConfirmations)
        ));
    }

    #[test]
    fn test_verify_rejects_swapped_index() {
        let (keys, config) = owners_with_keys(4);
        let digest = keccak256("transfer");
        let formatted = format_signatures(
            &config,
            digest,
            &[eth_sign(&keys[0], digest), eth_sign(&keys[2], digest)],
            None,
        )
        .unwrap();
        let mut data =
            ValidationData::build(&config, formatted.signatures, &formatted.signers).unwrap();
        data.indices = vec![U256::from(0), U256::from(1)];

        assert!(matches!(
            verify_validation_data(digest, &config.signers, &data.encode()),
            Err(VaultError::InvalidSigner { .. })
        ));
    }
}

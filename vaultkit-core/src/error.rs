use alloy_primitives::{Address, B256, U256};
use thiserror::Error;

/// Result type used across `VaultKit`.
pub type VaultResult<T, E = VaultError> = std::result::Result<T, E>;

/// Error outputs from `VaultKit`
#[derive(Debug, Error)]
pub enum VaultError {
    /// The ledger holds no usable configuration history for the vault
    #[error("config_not_found")]
    ConfigNotFound,

    /// A signature recovers to an address that is not an owner, or owners are out of order
    #[error("invalid_signer: {signer} ({reason})")]
    InvalidSigner {
        /// The recovered (or provided) signer address.
        signer: Address,
        /// Why the signer was rejected.
        reason: String,
    },

    /// The same owner appears more than once
    #[error("duplicate_signer: {signer}")]
    DuplicateSigner {
        /// The repeated address.
        signer: Address,
    },

    /// The nonce assumed by the caller is not the reconstructed one
    #[error("invalid_nonce: expected {expected}, provided {provided}")]
    InvalidNonce {
        /// Nonce reconstructed from the ledger.
        expected: U256,
        /// Nonce supplied by the caller.
        provided: U256,
    },

    /// A locally derived digest disagrees with the expected one
    #[error("hash_mismatch: expected {expected}, computed {computed}")]
    HashMismatch {
        /// Digest that was expected (e.g. returned by the contract).
        expected: B256,
        /// Digest derived locally.
        computed: B256,
    },

    /// Transaction metadata could not be fetched or decoded. Never fatal.
    #[error("metadata_unavailable: {meta_hash}: {error}")]
    MetadataUnavailable {
        /// Digest of the metadata payload.
        meta_hash: B256,
        /// Underlying failure.
        error: String,
    },

    /// A log carried a topic this crate does not understand. Never fatal.
    #[error("unknown_log_topic: {topic}")]
    UnknownLogTopic {
        /// The unrecognised first topic (or zero for anonymous logs).
        topic: B256,
    },

    /// Not enough confirmations were provided to authorize the operation
    #[error("missing_confirmations")]
    MissingConfirmations,

    /// The threshold does not fit the owner set
    #[error("invalid_threshold: {threshold} for {signers} signers")]
    InvalidThreshold {
        /// Requested threshold.
        threshold: U256,
        /// Size of the owner set.
        signers: usize,
    },

    /// The content network stored a payload under an unexpected identifier
    #[error("content_address_mismatch: expected {expected}, returned {returned}")]
    ContentAddressMismatch {
        /// Identifier derived from the ledger digest.
        expected: String,
        /// Identifier returned by the content network.
        returned: String,
    },

    /// The presented input is not valid for the requested operation
    #[error("invalid_input_{attribute}: {reason}")]
    InvalidInput {
        /// The attribute that is invalid
        attribute: String,
        /// The reason the input is invalid
        reason: String,
    },

    /// Unexpected error serializing information
    #[error("serialization_error: {error}")]
    SerializationError {
        /// The error message from the serialization
        error: String,
    },

    /// Network connection error with details
    #[error("network_error: {url} ({status:?}): {error}")]
    NetworkError {
        /// The URL of the request
        url: String,
        /// The HTTP status code of the request, if any
        status: Option<u16>,
        /// The error message from the request
        error: String,
    },

    /// The ledger node answered a JSON-RPC call with an error object
    #[error("rpc_error {code}: {message}")]
    RpcError {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// Unexpected error
    #[error("unexpected_error: {error}")]
    Generic {
        /// The details of the error
        error: String,
    },
}

impl From<reqwest::Error> for VaultError {
    fn from(error: reqwest::Error) -> Self {
        Self::NetworkError {
            url: error
                .url()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            status: error.status().map(|status| status.as_u16()),
            error: error.to_string(),
        }
    }
}

impl From<alloy_sol_types::Error> for VaultError {
    fn from(error: alloy_sol_types::Error) -> Self {
        Self::SerializationError {
            error: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerializationError {
            error: error.to_string(),
        }
    }
}

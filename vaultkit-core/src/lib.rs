//! `VaultKit` is the off-chain engine of a stateless multi-signature vault.
//!
//! The vault contract stores no owner set. It commits to a hash of its
//! configuration, and everything else lives elsewhere:
//! - the configuration and history are replayed from the ledger's event log ([`Vault::load_config`], [`Vault::load_transactions`]),
//! - owners prove membership with Merkle proofs over the ordered owner set ([`merkle`]),
//! - transaction payloads are published on a content-addressed network keyed by the vault digest ([`TransactionStore`]).
//!
//! The ledger and the content network are reached through the [`Ledger`] and
//! [`ContentNetwork`] traits. JSON-RPC and IPFS implementations are provided,
//! as well as in-memory ones. New vaults are prepared with [`factory`].

#![deny(clippy::all, clippy::pedantic, clippy::nursery, missing_docs, dead_code)]

pub mod contract;

mod content;
pub use content::*;

pub mod defaults;
pub use defaults::{Network, VaultKitConfig};

mod error;
pub use error::*;

pub mod factory;

mod ledger;
pub use ledger::*;

pub mod logger;

pub mod merkle;
pub use merkle::MerkleProof;

pub mod multisend;

pub mod primitives;

pub mod reconstruct;

mod types;
pub use types::*;

pub mod validation;
pub use validation::ValidationData;

mod vault;
pub use vault::*;

// private modules
mod http_request;

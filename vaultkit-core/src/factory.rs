//! Counterfactual vault deployment through a `CREATE2` proxy factory.
//!
//! The address of a vault is known before it exists: it depends only on the
//! factory, the singleton its proxy delegates to, the setup calldata and a
//! salt nonce.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;

use crate::{
    contract::{IProxyFactory, IStatelessVault},
    error::VaultResult,
    ledger::Ledger,
    types::{ensure_threshold, ensure_unique_signers},
};

/// Initial owner set of a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultSetup {
    /// Owners, in the order the Merkle tree is built over.
    pub signers: Vec<Address>,
    /// Number of confirmations required.
    pub threshold: U256,
}

/// Calldata of `setup(address[],uint256,address,address,address)`, which the
/// proxy runs on deployment.
///
/// Signature checker, request guard and fallback handler are left unset.
///
/// # Errors
/// - `DuplicateSigner` if an owner is listed twice.
/// - `InvalidThreshold` if the threshold is zero or larger than the owner set.
pub fn creation_data(setup: &VaultSetup) -> VaultResult<Bytes> {
    ensure_unique_signers(&setup.signers)?;
    ensure_threshold(setup.threshold, setup.signers.len())?;
    Ok(IStatelessVault::setupCall {
        signers: setup.signers.clone(),
        threshold: setup.threshold,
        signatureChecker: Address::ZERO,
        requestGuard: Address::ZERO,
        fallbackHandler: Address::ZERO,
    }
    .abi_encode()
    .into())
}

/// Salt nonce derived from a human readable label.
#[must_use]
pub fn salt_nonce(label: &str) -> U256 {
    U256::from_be_bytes(keccak256(label.as_bytes()).0)
}

/// `keccak256(keccak256(initializer) ‖ uint256(salt_nonce))`
#[must_use]
pub fn proxy_salt(initializer: &[u8], salt_nonce: U256) -> B256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(keccak256(initializer).as_slice());
    preimage[32..].copy_from_slice(&salt_nonce.to_be_bytes::<32>());
    keccak256(preimage)
}

/// Address `factory` deploys the proxy to, given its `proxyCreationCode`.
///
/// The deployment code is the creation code followed by the singleton address
/// as a 32 byte word.
#[must_use]
pub fn proxy_address(
    factory: Address,
    creation_code: &[u8],
    singleton: Address,
    initializer: &[u8],
    salt_nonce: U256,
) -> Address {
    let mut deployment_code = Vec::with_capacity(creation_code.len() + 32);
    deployment_code.extend_from_slice(creation_code);
    deployment_code.extend_from_slice(singleton.into_word().as_slice());
    factory.create2(
        proxy_salt(initializer, salt_nonce).0,
        keccak256(&deployment_code).0,
    )
}

/// Predicts the address of the vault `factory` would deploy for `initializer`
/// (see [`creation_data`]) and `salt_nonce`.
///
/// # Errors
/// Returns an error if the `proxyCreationCode` call fails or returns malformed
/// output.
pub async fn calculate_address(
    ledger: &dyn Ledger,
    factory: Address,
    singleton: Address,
    initializer: &[u8],
    salt_nonce: U256,
) -> VaultResult<Address> {
    let call = IProxyFactory::proxyCreationCodeCall {};
    let output = ledger.call(factory, call.abi_encode().into()).await?;
    let creation_code = IProxyFactory::proxyCreationCodeCall::abi_decode_returns(&output)?;
    let address = proxy_address(factory, &creation_code, singleton, initializer, salt_nonce);
    log::debug!("vault for factory {factory} predicted at {address}");
    Ok(address)
}

/// Calldata of the factory's `createProxyWithNonce`.
#[must_use]
pub fn deploy_calldata(singleton: Address, initializer: Bytes, salt_nonce: U256) -> Bytes {
    IProxyFactory::createProxyWithNonceCall {
        singleton,
        initializer,
        saltNonce: salt_nonce,
    }
    .abi_encode()
    .into()
}

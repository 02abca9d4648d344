//! Network constants and the settings a [`crate::Vault`] connects with.

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{VaultError, VaultResult};

/// Canonical `MultiSend` deployment, identical on every supported network.
pub const MULTI_SEND: Address = address!("0x8D29bE29923b68abfDD21e541b9374737B49cdAD");

/// Public IPFS HTTP API used when no node is configured.
pub const DEFAULT_IPFS_URL: &str = "https://ipfs.infura.io:5001";

/// Networks the vault contracts are deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Ethereum mainnet.
    Mainnet,
    /// Rinkeby test network.
    Rinkeby,
    /// The `xDai` chain.
    Xdai,
}

impl Network {
    /// EIP-155 chain id.
    #[must_use]
    pub const fn chain_id(self) -> u64 {
        match self {
            Self::Mainnet => 1,
            Self::Rinkeby => 4,
            Self::Xdai => 100,
        }
    }

    /// The network with `chain_id`, if supported.
    #[must_use]
    pub const fn from_chain_id(chain_id: u64) -> Option<Self> {
        match chain_id {
            1 => Some(Self::Mainnet),
            4 => Some(Self::Rinkeby),
            100 => Some(Self::Xdai),
            _ => None,
        }
    }
}

/// Endpoints and addresses needed to talk to a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultKitConfig {
    /// JSON-RPC endpoint of the ledger.
    pub rpc_url: String,
    /// IPFS HTTP API endpoint.
    #[serde(default = "default_ipfs_url")]
    pub ipfs_url: String,
    /// Chain id used for EIP-712 domains.
    pub chain_id: u64,
    /// `MultiSend` contract used for batching.
    #[serde(default = "default_multi_send")]
    pub multi_send: Address,
}

fn default_ipfs_url() -> String {
    DEFAULT_IPFS_URL.to_string()
}

const fn default_multi_send() -> Address {
    MULTI_SEND
}

impl VaultKitConfig {
    /// Defaults for `network` talking to the node at `rpc_url`.
    #[must_use]
    pub fn from_network(network: Network, rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            ipfs_url: default_ipfs_url(),
            chain_id: network.chain_id(),
            multi_send: MULTI_SEND,
        }
    }

    /// Parses a JSON configuration.
    ///
    /// # Errors
    /// `SerializationError` if `json` is not a valid configuration.
    pub fn from_json(json: &str) -> VaultResult<Self> {
        serde_json::from_str(json).map_err(|e| VaultError::SerializationError {
            error: format!("invalid config: {e}"),
        })
    }

    /// The configured network, if it is one of the known ones.
    #[must_use]
    pub const fn network(&self) -> Option<Network> {
        Network::from_chain_id(self.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_network_names() {
        assert_eq!(Network::from_str("xdai").unwrap(), Network::Xdai);
        assert_eq!(Network::Rinkeby.to_string(), "rinkeby");
        assert!(Network::from_str("goerli").is_err());
        assert_eq!(Network::from_chain_id(100), Some(Network::Xdai));
    }

    #[test]
    fn test_config_from_json_applies_defaults() {
        let config = VaultKitConfig::from_json(
            r#"{ "rpcUrl": "https://rpc.gnosischain.com", "chainId": 100 }"#,
        )
        .unwrap();
        assert_eq!(config, VaultKitConfig::from_network(Network::Xdai, "https://rpc.gnosischain.com"));
        assert_eq!(config.network(), Some(Network::Xdai));

        assert!(matches!(
            VaultKitConfig::from_json("{}"),
            Err(VaultError::SerializationError { .. })
        ));
    }
}

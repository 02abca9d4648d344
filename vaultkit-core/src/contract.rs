//! ABI surface of the stateless vault contract and its helpers.
//!
//! Only function signatures, events and the EIP-712 transaction type are
//! described here. Nothing in this crate executes them on-chain.

use alloy_sol_types::sol;

sol! {
    /// EIP-712 typed transaction signed by the vault owners.
    ///
    /// `Transaction(address to,uint256 value,bytes data,uint8 operation,uint256 minAvailableGas,uint256 nonce,bytes32 metaHash)`
    #[derive(Debug, PartialEq, Eq)]
    struct Transaction {
        address to;
        uint256 value;
        bytes data;
        uint8 operation;
        uint256 minAvailableGas;
        uint256 nonce;
        bytes32 metaHash;
    }

    /// Functions and events of the stateless vault.
    #[derive(Debug, PartialEq, Eq)]
    interface IStatelessVault {
        event Configuration(
            uint256 currentNonce,
            address[] signers,
            uint256 threshold,
            address implementation,
            address signatureChecker,
            address requestGuard,
            address fallbackHandler
        );
        event ExecutionSuccess(uint256 indexed usedNonce, bytes32 indexed txHash);
        event ExecutionFailure(uint256 indexed usedNonce, bytes32 indexed txHash);

        function setup(
            address[] signers,
            uint256 threshold,
            address signatureChecker,
            address requestGuard,
            address fallbackHandler
        ) external;

        function generateTxHash(
            address to,
            uint256 value,
            bytes data,
            uint8 operation,
            uint256 minAvailableGas,
            uint256 nonce,
            bytes32 metaHash
        ) external view returns (bytes32);

        function generateConfigChangeHash(
            address implementation,
            bytes signers,
            uint256 threshold,
            address signatureChecker,
            address requestGuard,
            address fallbackHandler,
            bytes hookBytes,
            uint256 nonce,
            bytes metaData
        ) external view returns (bytes32);

        function execTransaction(
            address to,
            uint256 value,
            bytes data,
            uint8 operation,
            uint256 minAvailableGas,
            uint256 nonce,
            bytes32 metaHash,
            bytes validationData,
            bool revertOnFailure
        ) external returns (bool);

        function updateConfig(
            address implementation,
            address[] signers,
            uint256 threshold,
            address signatureChecker,
            address requestGuard,
            address fallbackHandler,
            bytes hookBytes,
            uint256 nonce,
            bytes metaData,
            bytes validationData
        ) external;
    }

    /// Factory deploying vault proxies with `CREATE2`.
    interface IProxyFactory {
        function proxyCreationCode() external pure returns (bytes);

        function createProxyWithNonce(
            address singleton,
            bytes initializer,
            uint256 saltNonce
        ) external returns (address proxy);
    }

    /// Batch helper executed through a delegate call.
    interface IMultiSend {
        function multiSend(bytes transactions) external payable;
    }
}

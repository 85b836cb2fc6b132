//! Solidity ABI bindings for the bridge contract's Lock/Burn events and its
//! mint/unlock/view surface, via `alloy_sol_types::sol!`.
//!
//! The exact contract is out of this relayer's scope (`spec.md` §1: on-chain
//! contracts are external collaborators); these bindings describe the minimal
//! interface `spec.md` §6 names.

use alloy_sol_types::sol;

sol! {
    #[derive(Debug)]
    event Lock(address indexed sender, address indexed recipient, uint256 amount, uint64 nonce, string targetChain, string targetToken);

    #[derive(Debug)]
    event Burn(address indexed sender, address indexed recipient, uint256 amount, uint64 nonce, string targetChain);

    function mint(address recipient, uint256 amount, string sourceChainId, uint64 sourceNonce, bytes auth) external;

    function mintAndSwap(address recipient, uint256 amount, uint256 minOut, string sourceChainId, uint64 sourceNonce, bytes auth) external;

    function unlock(address recipient, uint256 amount, string sourceChainId, uint64 sourceNonce, bytes auth) external;

    function isProcessed(string sourceChainId, uint64 sourceNonce) external view returns (bool);

    function getExpectedOutput(string targetToken, uint256 amountIn) external view returns (uint256);
}

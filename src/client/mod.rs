//! Ledger access layer.
//!
//! The engine only ever talks to the ledger through the [`ChainClient`] capability set.
//! [`JsonRpcChainClient`] is the HTTP JSON-RPC implementation used by the binary.

/// JSON-RPC implementation of the capability set
mod rpc;
/// Capability trait
mod traits;
/// Records, handles and the error taxonomy
mod types;

pub use rpc::{JsonRpcChainClient, encode_call};
pub use traits::ChainClient;
pub use types::*;

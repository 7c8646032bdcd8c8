//! Core library comparing three structured P2P overlay routing
//! protocols — ring/finger-table, XOR k-bucket, and prefix/leaf-set —
//! over a single in-process, synchronous simulation substrate.
//!
//! Every protocol implements the same [`node::DhtNode`] contract over
//! the same [`network::NetworkSimulator`], so a harness can build a
//! network of any one protocol's nodes, drive it through
//! join/stabilize/lookup, and compare the results against the
//! corresponding oracle in [`oracles`] without caring which protocol
//! it's holding.

pub mod config;
pub mod lookup_result;
pub mod network;
pub mod node;
pub mod oracles;
pub mod prefix;
pub mod ring;
pub mod xor;

pub use config::{NetworkConfig, PrefixConfig, RingConfig, XorConfig};
pub use lookup_result::LookupResult;
pub use network::{NetworkSimulator, NodeHandle};
pub use node::DhtNode;
pub use prefix::PrefixNode;
pub use ring::RingNode;
pub use xor::XorNode;

static_assertions::const_assert!(config::DEFAULT_M <= 64);

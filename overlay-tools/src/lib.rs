//! Baseline tools shared across the overlay routing protocol comparison
//! core: deterministic identifier hashing/generation and the error type
//! used by setup-time (non-protocol) operations.
//!
//! Kept deliberately small and dependency-light, the way a project's
//! foundational crate should be: nothing in here depends on any of the
//! routing-table machinery in `overlay-core`, only the other way around.

mod error;
mod identifier;

pub use error::OverlayError;
pub use identifier::{generate_keys, generate_node_ids, hash_key, OverlayId};

/// Default identifier space width in bits, matching every worked example
/// and test scenario in the comparison.
pub const DEFAULT_ID_BITS: u32 = 16;

/// Default seed used for node id generation.
pub const DEFAULT_NODE_SEED: u64 = 42;

/// Default seed used for test-key generation.
pub const DEFAULT_KEY_SEED: u64 = 123;

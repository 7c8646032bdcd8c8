use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by setup-time operations: constructing an identifier
/// space, registering a node, configuring a protocol instance.
///
/// The DHT protocol surface itself (`join`/`leave`/`lookup`/`store`/
/// `retrieve`/`stabilize`) never returns this — per the design, every
/// entry point there is total and reports failure through its own
/// return value (`LookupResult::success`, `bool`, `Option`), not
/// through an error type.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayError {
    #[error("identifier space width must be between 1 and 64 bits, got {m}")]
    InvalidIdSpace { m: u32 },

    #[error("invalid parameter: {what}")]
    InvalidParameter { what: &'static str },

    #[error("node id {id} is already registered")]
    DuplicateNodeId { id: u64 },
}

//! Per-protocol tuning knobs, serialized the same way a benchmark
//! driver would persist a run's parameters alongside its results.

use overlay_tools::OverlayError;
use serde::{Deserialize, Serialize};

/// Shared identifier-space width. Every protocol config embeds one of
/// these rather than duplicating the field, so a harness can build all
/// three configs from a single `m`.
pub const DEFAULT_M: u32 = overlay_tools::DEFAULT_ID_BITS;

/// RING (finger-table / successor-list) tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingConfig {
    /// Identifier space width in bits; the finger table has exactly
    /// `m` entries.
    pub m: u32,
    /// Number of successors tracked for fault tolerance beyond the
    /// immediate successor (finger[0]).
    pub successor_list_size: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            successor_list_size: 3,
        }
    }
}

impl RingConfig {
    /// Setup-time validation: every node constructor runs this before
    /// accepting a config, so an out-of-range `m` is rejected at the
    /// harness boundary rather than surfacing as a protocol bug later.
    pub fn validate(&self) -> Result<(), OverlayError> {
        if !(1..=64).contains(&self.m) {
            return Err(OverlayError::InvalidIdSpace { m: self.m });
        }
        Ok(())
    }
}

/// XOR (k-bucket / iterative lookup) tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XorConfig {
    pub m: u32,
    /// Bucket capacity.
    pub k: usize,
    /// Parallelism width of each lookup round.
    pub alpha: usize,
}

impl Default for XorConfig {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            k: 8,
            alpha: 3,
        }
    }
}

impl XorConfig {
    pub fn validate(&self) -> Result<(), OverlayError> {
        if !(1..=64).contains(&self.m) {
            return Err(OverlayError::InvalidIdSpace { m: self.m });
        }
        if self.k == 0 {
            return Err(OverlayError::InvalidParameter { what: "k must be non-zero" });
        }
        if self.alpha == 0 {
            return Err(OverlayError::InvalidParameter { what: "alpha must be non-zero" });
        }
        Ok(())
    }
}

/// PREFIX (prefix-routing / leaf-set) tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixConfig {
    pub m: u32,
    /// Digit width in bits; the routing table has `m / b` rows of
    /// `2^b` columns each. `m` must be a multiple of `b`.
    pub b: u32,
    /// Leaf set capacity (split evenly above/below in the reference
    /// semantics, enforced by truncation after each insert).
    pub leaf_size: usize,
}

impl Default for PrefixConfig {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            b: 4,
            leaf_size: 8,
        }
    }
}

impl PrefixConfig {
    pub fn validate(&self) -> Result<(), OverlayError> {
        if !(1..=64).contains(&self.m) {
            return Err(OverlayError::InvalidIdSpace { m: self.m });
        }
        if self.b == 0 || self.b > self.m {
            return Err(OverlayError::InvalidParameter { what: "b must be non-zero and at most m" });
        }
        Ok(())
    }
}

/// Substrate-level knobs shared by every protocol, passed to
/// [`crate::network::NetworkSimulator::new`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Simulated time charged per round-trip. `0.0` disables the
    /// virtual clock.
    pub per_hop_delay: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { per_hop_delay: 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_config_rejects_invalid_m() {
        let config = RingConfig { m: 0, successor_list_size: 3 };
        assert_eq!(config.validate(), Err(OverlayError::InvalidIdSpace { m: 0 }));
        assert!(RingConfig::default().validate().is_ok());
    }

    #[test]
    fn xor_config_rejects_zero_k_and_alpha() {
        let bad_k = XorConfig { m: 16, k: 0, alpha: 3 };
        assert_eq!(bad_k.validate(), Err(OverlayError::InvalidParameter { what: "k must be non-zero" }));
        let bad_alpha = XorConfig { m: 16, k: 8, alpha: 0 };
        assert_eq!(
            bad_alpha.validate(),
            Err(OverlayError::InvalidParameter { what: "alpha must be non-zero" })
        );
        assert!(XorConfig::default().validate().is_ok());
    }

    #[test]
    fn prefix_config_rejects_bad_digit_width() {
        let bad = PrefixConfig { m: 16, b: 0, leaf_size: 8 };
        assert!(bad.validate().is_err());
        let too_wide = PrefixConfig { m: 8, b: 16, leaf_size: 8 };
        assert!(too_wide.validate().is_err());
        assert!(PrefixConfig::default().validate().is_ok());
    }
}

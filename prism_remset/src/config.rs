//! Remembered-set and heap layout configuration.
//!
//! Sizes are tunable so tests can run against small regions while
//! production heaps keep the large defaults.

use crate::error::ConfigError;
use crate::slots::TYPED_SLOT_MAX_OFFSET;

/// Smallest permitted region unit (4KB).
pub const MIN_UNIT_SIZE: usize = 4 * 1024;

/// Smallest permitted semi-space (4KB).
pub const MIN_NEW_SPACE_SIZE: usize = 4 * 1024;

/// Smallest recording-buffer node: one typed pair must always fit.
pub const MIN_RECORDING_NODE_CAPACITY: usize = 2;

/// Configuration for region layout and slot bookkeeping.
///
/// # Example
///
/// ```
/// use prism_remset::RemsetConfig;
///
/// let config = RemsetConfig {
///     unit_size: 256 * 1024,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RemsetConfig {
    // =========================================================================
    // Regions
    // =========================================================================
    /// Size of one region unit in bytes.
    ///
    /// Every region is a whole number of units and is aligned to the unit
    /// size. Each unit gets its own slot set, so per-unit metadata stays
    /// bounded for large-object regions.
    ///
    /// Default: 1MB
    pub unit_size: usize,

    // =========================================================================
    // Young Generation
    // =========================================================================
    /// Size of each new-space semi-space in bytes.
    ///
    /// Default: 1MB (2MB total for both semi-spaces)
    pub new_space_size: usize,

    // =========================================================================
    // Recording Buffers
    // =========================================================================
    /// Capacity of one slot recording buffer node, in words.
    ///
    /// An untyped record costs one word, a typed record two.
    ///
    /// Default: 16K words
    pub recording_node_capacity: usize,

    // =========================================================================
    // Debugging
    // =========================================================================
    /// Verify remembered-set slots after stale-slot elimination.
    ///
    /// Default: false (enabled in debug builds)
    pub verify_slots: bool,
}

impl Default for RemsetConfig {
    fn default() -> Self {
        Self {
            unit_size: 1024 * 1024,              // 1MB
            new_space_size: 1024 * 1024,         // 1MB
            recording_node_capacity: 16 * 1024,  // 16K words
            verify_slots: cfg!(debug_assertions),
        }
    }
}

impl RemsetConfig {
    /// Small regions and buffers, for tests and embedded heaps.
    pub fn small_regions() -> Self {
        Self {
            unit_size: 16 * 1024,          // 16KB
            new_space_size: 64 * 1024,     // 64KB
            recording_node_capacity: 256,
            ..Default::default()
        }
    }

    /// Large regions for heaps dominated by big, long-lived objects.
    pub fn large_regions() -> Self {
        Self {
            unit_size: 4 * 1024 * 1024,        // 4MB
            new_space_size: 8 * 1024 * 1024,   // 8MB
            recording_node_capacity: 64 * 1024,
            ..Default::default()
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.unit_size.is_power_of_two() {
            return Err(ConfigError::UnitSizeNotPowerOfTwo(self.unit_size));
        }
        if self.unit_size < MIN_UNIT_SIZE {
            return Err(ConfigError::UnitTooSmall(self.unit_size));
        }
        if self.unit_size > TYPED_SLOT_MAX_OFFSET {
            return Err(ConfigError::UnitTooLarge(self.unit_size));
        }
        if self.new_space_size < MIN_NEW_SPACE_SIZE {
            return Err(ConfigError::NewSpaceTooSmall(self.new_space_size));
        }
        if self.recording_node_capacity < MIN_RECORDING_NODE_CAPACITY {
            return Err(ConfigError::RecordingNodeTooSmall(
                self.recording_node_capacity,
            ));
        }
        Ok(())
    }
}

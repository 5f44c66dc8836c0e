//! Construction-time errors.
//!
//! Remembered-set operations have no error path; contract violations are
//! assertions. Only configuration and memory reservation can fail.

use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Unit size is not a power of two.
    #[error("unit size must be a power of two, got {0} bytes")]
    UnitSizeNotPowerOfTwo(usize),
    /// Unit size is below the minimum (4KB).
    #[error("unit size must be at least 4KB, got {0} bytes")]
    UnitTooSmall(usize),
    /// Unit size exceeds what a typed slot offset can represent.
    #[error("unit size {0} exceeds the typed slot offset range")]
    UnitTooLarge(usize),
    /// Semi-space is below the minimum (4KB).
    #[error("new space semi-space must be at least 4KB, got {0} bytes")]
    NewSpaceTooSmall(usize),
    /// Recording node cannot hold a typed pair.
    #[error("recording node capacity must be at least 2 words, got {0}")]
    RecordingNodeTooSmall(usize),
}

/// Errors raised while building a heap.
#[derive(Debug, Error)]
pub enum HeapError {
    /// The configuration was rejected.
    #[error("invalid heap configuration: {0}")]
    Config(#[from] ConfigError),

    /// Backing memory could not be reserved.
    #[error("failed to allocate {size} bytes of region memory")]
    RegionAllocation {
        /// Requested size in bytes.
        size: usize,
    },

    /// A region must span at least one unit.
    #[error("a region needs at least one unit")]
    EmptyRegion,

    /// The region is too large for typed slot offsets.
    #[error("region of {size} bytes exceeds the typed slot offset range")]
    RegionTooLarge {
        /// Requested size in bytes.
        size: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::UnitTooSmall(512);
        assert_eq!(err.to_string(), "unit size must be at least 4KB, got 512 bytes");
    }

    #[test]
    fn test_heap_error_wraps_config_error() {
        let err: HeapError = ConfigError::NewSpaceTooSmall(16).into();
        assert!(matches!(err, HeapError::Config(ConfigError::NewSpaceTooSmall(16))));
        assert!(err.to_string().starts_with("invalid heap configuration"));
    }
}

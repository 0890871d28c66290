//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! A cache miss is never an error: lookups report absence through `Option`.
//! The only failures are the ones that can happen while building a cache.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No tokio runtime was supplied and none is running on this thread
    #[error("no tokio runtime available to drive the background sweeper")]
    NoRuntime,

    /// Construction parameters are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

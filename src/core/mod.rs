//! Core components of the crate.
//!
//! This module contains the thread callback table, the library control
//! interface, the one-time initialization guard and error handling.

// Thread callback table and the mutex built on it
pub mod threading;

// Library control interface and implementations
pub mod library;

// One-time initialization guard
pub mod init;

// Initialization options
pub mod config;

// Algorithm identifiers
pub mod algorithms;

// Digest and MAC handles
pub mod ops;

// Library constants
pub mod constants;

// Error handling
pub mod error;

// Re-exports for convenience
pub use self::error::{Error, ErrorCode, Result};
pub use self::init::{Crypto, Initializer, LibraryInitState, Registrar};
pub use self::threading::{thread_callback_table, ThreadCallbacks};

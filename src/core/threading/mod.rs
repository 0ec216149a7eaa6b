//! Thread primitives handed to native cryptographic libraries.
//!
//! [`thread_callback_table`] is the registrar's only operation. Passing the
//! table to a library is done by [`crate::core::init::Registrar`].

pub mod callbacks;
pub mod mutex;

pub use callbacks::{thread_callback_table, InitFn, MutexFn, ThreadCallbacks, ThreadIdFn, ThreadingModel};
pub use mutex::{NativeMutex, NativeMutexGuard};

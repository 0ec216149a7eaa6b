/*!
# crypto-threading

Thread-safety registration and one-time initialization for native
cryptographic libraries.

## Overview

A native cryptographic library that guards its internal state with mutexes
has to be told, before its first use, which threading primitives to use.
This crate provides:

- A static POSIX threads callback table and [`thread_callback_table`], the
  accessor that hands out a reference to it
- [`CryptoLibrary`], the control interface the table is registered through
- [`Registrar`], which registers the table and initializes the library exactly
  once per process, even when first use happens on many threads at once
- An in-process [`SoftwareLibrary`] and, with the `gcrypt` feature, a
  libgcrypt binding
- Digest, MAC, cipher, key derivation and random handles that are only
  available after successful initialization

## Initialization

```rust
let crypto = crypto_threading::init(|x| {
    x.disable_secmem();
    Ok(())
})?;
let digest = crypto.hash(crypto_threading::Algorithm::Sha256, b"abc")?;
assert_eq!(digest.len(), 32);
# Ok::<(), crypto_threading::Error>(())
```

Functions that need an initialized library, such as [`hash`], initialize the
default library with [`InitConfig::default`] when no `init*` call happened
first.

## Ordering

The callback table must be registered before the library allocates any
thread-sensitive state. Skipping or reordering that step cannot be detected
reliably: a native library will race on its internal locks. Route every first
use through a [`Registrar`].
*/

use once_cell::sync::Lazy;

// Core components
pub mod core;

// C bindings
#[cfg(feature = "ffi")]
pub mod ffi;

// Re-export commonly used types for convenience
pub use crate::core::algorithms::{
    Algorithm, CipherAlgorithm, KdfAlgorithm, KdfParams, MacAlgorithm, RandomLevel,
};
pub use crate::core::config::{InitConfig, SecureMemory};
pub use crate::core::constants::MIN_VERSION;
pub use crate::core::error::{Error, ErrorCode, Result};
pub use crate::core::init::{Crypto, Initializer, LibraryInitState, Registrar};
pub use crate::core::library::{
    CipherContext, Control, CryptoLibrary, DigestContext, MacContext, SoftwareLibrary,
};
pub use crate::core::ops::{Cipher, Mac, MessageDigest};
pub use crate::core::threading::{thread_callback_table, NativeMutex, ThreadCallbacks, ThreadingModel};

#[cfg(feature = "gcrypt")]
pub use crate::core::library::gcrypt;

/// Handle to the process-wide default library
pub type DefaultCrypto = Crypto<'static, SoftwareLibrary>;

// Process-wide default registrar
static DEFAULT: Lazy<Registrar<SoftwareLibrary>> =
    Lazy::new(|| Registrar::new(SoftwareLibrary::new()));

/// Registrar of the process-wide default library
#[inline]
pub fn registrar() -> &'static Registrar<SoftwareLibrary> {
    &DEFAULT
}

/// Initialize the default library, configuring it through `f`
#[inline]
pub fn init(f: impl FnOnce(&mut Initializer<'_>) -> Result<()>) -> Result<DefaultCrypto> {
    DEFAULT.init(f)
}

/// Initialize the default library in FIPS mode
#[inline]
pub fn init_fips_mode(f: impl FnOnce(&mut Initializer<'_>) -> Result<()>) -> Result<DefaultCrypto> {
    DEFAULT.init_fips_mode(f)
}

#[inline]
pub fn init_with_config(config: &InitConfig) -> Result<DefaultCrypto> {
    DEFAULT.init_with_config(config)
}

#[inline]
pub fn init_default() -> Result<DefaultCrypto> {
    DEFAULT.init_default()
}

#[inline]
pub fn is_initialized() -> bool {
    DEFAULT.is_initialized()
}

#[inline]
pub fn state() -> LibraryInitState {
    DEFAULT.state()
}

/// Handle to the default library; `Error::NotInitialized` before `init*`
#[inline]
pub fn handle() -> Result<DefaultCrypto> {
    DEFAULT.handle()
}

/// Enable the default library's memory guard before initialization
#[inline]
pub fn enable_memory_guard() -> bool {
    DEFAULT.enable_memory_guard()
}

/// One-shot digest with the default library
pub fn hash(algo: Algorithm, data: &[u8]) -> Result<Vec<u8>> {
    DEFAULT.handle_or_init()?.hash(algo, data)
}

/// Random bytes from the default library
pub fn random_bytes(len: usize, level: RandomLevel) -> Result<Vec<u8>> {
    DEFAULT.handle_or_init()?.random_bytes(len, level)
}

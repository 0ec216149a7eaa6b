/*!
Constants for native cryptographic library initialization.

This module contains the control command numbers, thread option tags and
algorithm identifiers shared by every library implementation. The numeric
values follow the libgcrypt ABI so that they can be handed to the native
library unchanged.
*/

/// Minimum library version accepted during initialization
pub const MIN_VERSION: &str = "1.6.0";

/// Version reported by the in-process software library
pub const SOFTWARE_VERSION: &str = "1.10.3";

/// Thread option tags stored in the low byte of a callback table's `option`
pub mod thread_option {
    /// Library default threading
    pub const DEFAULT: u32 = 0;

    /// User supplied callbacks
    pub const USER: u32 = 1;

    /// GNU Pth callbacks
    pub const PTH: u32 = 2;

    /// POSIX threads callbacks
    pub const PTHREAD: u32 = 3;

    /// Version of the callback table layout, stored in bits 8..16
    pub const VERSION: u32 = 1;

    /// Shift applied to `VERSION` when building an option tag
    pub const VERSION_SHIFT: u32 = 8;
}

/// Control command numbers understood by the library's control interface
pub mod ctl {
    pub const USE_SECURE_RNDPOOL: u32 = 22;
    pub const INIT_SECMEM: u32 = 24;
    pub const TERM_SECMEM: u32 = 25;
    pub const ENABLE_M_GUARD: u32 = 31;
    pub const DISABLE_SECMEM: u32 = 37;
    pub const INITIALIZATION_FINISHED: u32 = 38;
    pub const INITIALIZATION_FINISHED_P: u32 = 39;
    pub const ANY_INITIALIZATION_P: u32 = 40;
    pub const ENABLE_QUICK_RANDOM: u32 = 44;

    /// Register the thread callback table
    pub const SET_THREAD_CBS: u32 = 47;

    pub const FIPS_MODE_P: u32 = 55;
    pub const FORCE_FIPS_MODE: u32 = 56;
    pub const SELFTEST: u32 = 57;
    pub const AUTO_EXPAND_SECMEM: u32 = 78;
}

/// Message digest algorithm identifiers
pub mod md {
    pub const MD5: u32 = 1;
    pub const SHA1: u32 = 2;
    pub const RMD160: u32 = 3;
    pub const SHA256: u32 = 8;
    pub const SHA384: u32 = 9;
    pub const SHA512: u32 = 10;
    pub const SHA224: u32 = 11;
    pub const SHA3_224: u32 = 312;
    pub const SHA3_256: u32 = 313;
    pub const SHA3_384: u32 = 314;
    pub const SHA3_512: u32 = 315;
    pub const BLAKE2B_512: u32 = 318;
}

/// MAC algorithm identifiers
pub mod mac {
    pub const HMAC_SHA256: u32 = 101;
    pub const HMAC_SHA224: u32 = 102;
    pub const HMAC_SHA512: u32 = 103;
    pub const HMAC_SHA384: u32 = 104;
    pub const HMAC_SHA1: u32 = 105;
}

/// Cipher algorithm identifiers
pub mod cipher {
    pub const AES128: u32 = 7;
    pub const AES256: u32 = 9;
    pub const CHACHA20: u32 = 316;
}

/// Cipher mode identifiers
pub mod cipher_mode {
    pub const GCM: u32 = 9;
    pub const POLY1305: u32 = 10;
}

/// Key derivation algorithm identifiers
pub mod kdf {
    pub const SIMPLE_S2K: u32 = 16;
    pub const SALTED_S2K: u32 = 17;
    pub const ITERSALTED_S2K: u32 = 19;
    pub const PBKDF1: u32 = 33;
    pub const PBKDF2: u32 = 34;
    pub const SCRYPT: u32 = 48;

    /// Extract-and-expand KDF; only the software library supports it
    pub const HKDF: u32 = 105;
}

/// Random quality levels
pub mod random {
    pub const WEAK: u32 = 0;
    pub const STRONG: u32 = 1;
    pub const VERY_STRONG: u32 = 2;
}

/// Secure memory pool size used by the default configuration when enabled (32KB)
pub const DEFAULT_SECMEM_SIZE: usize = 32768;

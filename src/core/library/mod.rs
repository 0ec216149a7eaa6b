/*!
Control interface of a native cryptographic library.

[`CryptoLibrary`] is the seam between the initialization guard and the
library itself. Implementations translate [`Control`] commands into the
library's numeric control calls and report raw statuses unchanged.
*/

use crate::core::algorithms::{Algorithm, CipherAlgorithm, KdfParams, MacAlgorithm, RandomLevel};
use crate::core::constants::ctl;
use crate::core::error::ErrorCode;
use crate::core::threading::ThreadCallbacks;

pub mod software;

#[cfg(feature = "gcrypt")]
pub mod gcrypt;

pub use software::SoftwareLibrary;

#[cfg(feature = "gcrypt")]
pub use gcrypt::GcryptLibrary;

/// Commands accepted by [`CryptoLibrary::control`]
#[derive(Debug, Clone, Copy)]
pub enum Control {
    /// Register the thread callback table; must precede any other call
    SetThreadCallbacks(&'static ThreadCallbacks),
    DisableSecmem,
    InitSecmem(usize),
    AutoExpandSecmem(usize),
    EnableQuickRandom,
    UseSecureRndpool,
    EnableMemoryGuard,
    ForceFipsMode,
    SelfTest,
    InitializationFinished,
    TermSecmem,
    /// Query: non-zero once any initialization step has run
    AnyInitializationP,
    /// Query: non-zero once `InitializationFinished` has been processed
    InitializationFinishedP,
    /// Query: non-zero while FIPS mode is active
    FipsModeP,
}

impl Control {
    /// Numeric command constant
    pub fn command(&self) -> u32 {
        match self {
            Control::SetThreadCallbacks(_) => ctl::SET_THREAD_CBS,
            Control::DisableSecmem => ctl::DISABLE_SECMEM,
            Control::InitSecmem(_) => ctl::INIT_SECMEM,
            Control::AutoExpandSecmem(_) => ctl::AUTO_EXPAND_SECMEM,
            Control::EnableQuickRandom => ctl::ENABLE_QUICK_RANDOM,
            Control::UseSecureRndpool => ctl::USE_SECURE_RNDPOOL,
            Control::EnableMemoryGuard => ctl::ENABLE_M_GUARD,
            Control::ForceFipsMode => ctl::FORCE_FIPS_MODE,
            Control::SelfTest => ctl::SELFTEST,
            Control::InitializationFinished => ctl::INITIALIZATION_FINISHED,
            Control::TermSecmem => ctl::TERM_SECMEM,
            Control::AnyInitializationP => ctl::ANY_INITIALIZATION_P,
            Control::InitializationFinishedP => ctl::INITIALIZATION_FINISHED_P,
            Control::FipsModeP => ctl::FIPS_MODE_P,
        }
    }

    /// Queries report a boolean through the status value instead of an error
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Control::AnyInitializationP | Control::InitializationFinishedP | Control::FipsModeP
        )
    }
}

/// Streaming digest state owned by a library
pub trait DigestContext: Send {
    fn algorithm(&self) -> Algorithm;

    fn update(&mut self, data: &[u8]) -> Result<(), ErrorCode>;

    /// Produce the digest and return the context to its initial state
    fn finish(&mut self) -> Result<Vec<u8>, ErrorCode>;

    fn reset(&mut self);
}

/// Streaming MAC state owned by a library
pub trait MacContext: Send {
    fn algorithm(&self) -> MacAlgorithm;

    fn update(&mut self, data: &[u8]) -> Result<(), ErrorCode>;

    /// Produce the tag and return the context to its keyed initial state
    fn finish(&mut self) -> Result<Vec<u8>, ErrorCode>;

    fn reset(&mut self);
}

/// Keyed authenticated cipher owned by a library
pub trait CipherContext: Send {
    fn algorithm(&self) -> CipherAlgorithm;

    /// Ciphertext of `plaintext` followed by the authentication tag
    fn encrypt(
        &mut self,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ErrorCode>;

    /// Plaintext of `sealed` (ciphertext followed by tag) if the tag verifies
    fn decrypt(&mut self, nonce: &[u8], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>, ErrorCode>;
}

/// A native cryptographic library as seen by the initialization guard
pub trait CryptoLibrary: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Issue a control command, returning the library's raw status
    fn control(&self, cmd: Control) -> ErrorCode;

    /// Library version if it satisfies `required`. Triggers the library's lazy
    /// self-initialization, exactly like the native call.
    fn check_version(&self, required: Option<&str>) -> Option<&'static str>;

    fn open_digest(&self, algo: Algorithm) -> Result<Box<dyn DigestContext>, ErrorCode>;

    fn open_mac(&self, algo: MacAlgorithm, key: &[u8]) -> Result<Box<dyn MacContext>, ErrorCode>;

    fn open_cipher(
        &self,
        algo: CipherAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn CipherContext>, ErrorCode>;

    /// Fill `out` with key material derived from `passphrase`
    fn derive(
        &self,
        params: &KdfParams<'_>,
        passphrase: &[u8],
        out: &mut [u8],
    ) -> Result<(), ErrorCode>;

    fn randomize(&self, buf: &mut [u8], level: RandomLevel) -> Result<(), ErrorCode>;

    fn is_any_initialization_started(&self) -> bool {
        self.control(Control::AnyInitializationP).raw() != 0
    }

    fn is_initialization_finished(&self) -> bool {
        self.control(Control::InitializationFinishedP).raw() != 0
    }

    fn is_fips_mode_active(&self) -> bool {
        self.control(Control::FipsModeP).raw() != 0
    }

    /// One-shot digest of `data`
    fn hash(&self, algo: Algorithm, data: &[u8]) -> Result<Vec<u8>, ErrorCode> {
        let mut ctx = self.open_digest(algo)?;
        ctx.update(data)?;
        ctx.finish()
    }
}

/// Compare dotted numeric versions; missing components count as zero
pub fn version_at_least(actual: &str, required: &str) -> bool {
    fn parts(v: &str) -> Vec<u64> {
        v.split('.')
            .map(|p| {
                p.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    }

    let a = parts(actual);
    let r = parts(required);
    let len = a.len().max(r.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = r.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_compare() {
        assert!(version_at_least("1.10.3", "1.6.0"));
        assert!(version_at_least("1.6", "1.6.0"));
        assert!(!version_at_least("1.5.9", "1.6.0"));
        assert!(version_at_least("2.0.0-beta", "1.11"));
    }

    #[test]
    fn test_command_constants() {
        assert_eq!(Control::SetThreadCallbacks(crate::thread_callback_table()).command(), 47);
        assert_eq!(Control::InitializationFinished.command(), 38);
        assert!(Control::FipsModeP.is_query());
        assert!(!Control::SelfTest.is_query());
    }
}

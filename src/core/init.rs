/*!
One-time library initialization.

A [`Registrar`] owns a library and the thread callback table destined for it.
The first call to any of its `init*` methods runs the registration body under
a one-time guard: concurrent callers block until that body completes and then
observe its outcome. The body runs at most once per registrar, and a failed
outcome is terminal because the library may already have allocated internal
state. A panic inside the body is recorded as a failure with the `GENERAL`
code before it is resumed on the calling thread.

Registration order:

1. `SetThreadCallbacks(table)`, skipped if the library reports that some
   initialization already happened
2. `ForceFipsMode` when requested
3. `check_version`, which makes the library initialize itself
4. caller-provided configuration through an [`Initializer`]
5. `InitializationFinished`
*/

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use once_cell::sync::OnceCell;

use crate::core::algorithms::{Algorithm, CipherAlgorithm, KdfParams, MacAlgorithm, RandomLevel};
use crate::core::config::InitConfig;
use crate::core::constants::MIN_VERSION;
use crate::core::error::{Error, ErrorCode, Result, init_check, library_check};
use crate::core::library::{Control, CryptoLibrary};
use crate::core::ops::{Cipher, Mac, MessageDigest};
use crate::core::threading::{ThreadCallbacks, thread_callback_table};

/// Process-wide initialization state of a library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LibraryInitState {
    Uninitialized = 0,
    Initializing = 1,
    Initialized = 2,
    Failed = 3,
}

impl LibraryInitState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LibraryInitState::Initializing,
            2 => LibraryInitState::Initialized,
            3 => LibraryInitState::Failed,
            _ => LibraryInitState::Uninitialized,
        }
    }
}

/// Failure kept for callers arriving after the registration body has run
#[derive(Debug, Clone)]
enum Failure {
    Status(ErrorCode),
    Version(String),
}

impl Failure {
    fn from_error(err: &Error) -> Self {
        match err {
            Error::VersionMismatch { required } => Failure::Version(required.clone()),
            other => Failure::Status(
                other
                    .status()
                    .unwrap_or_else(|| ErrorCode::from_code(ErrorCode::GENERAL)),
            ),
        }
    }

    fn to_error(&self) -> Error {
        match self {
            Failure::Status(code) => Error::InitializationFailed { code: *code },
            Failure::Version(required) => Error::VersionMismatch {
                required: required.clone(),
            },
        }
    }
}

/// Configuration access handed to the closure passed to `Registrar::init`
pub struct Initializer<'a> {
    library: &'a dyn CryptoLibrary,
}

impl Initializer<'_> {
    /// Whether the library satisfies `version`
    #[inline]
    pub fn check_version(&mut self, version: &str) -> bool {
        self.library.check_version(Some(version)).is_some()
    }

    #[inline]
    pub fn enable_quick_random(&mut self) -> &mut Self {
        self.best_effort(Control::EnableQuickRandom);
        self
    }

    #[inline]
    pub fn enable_secure_rndpool(&mut self) -> &mut Self {
        self.best_effort(Control::UseSecureRndpool);
        self
    }

    #[inline]
    pub fn disable_secmem(&mut self) -> &mut Self {
        self.best_effort(Control::DisableSecmem);
        self
    }

    #[inline]
    pub fn enable_secmem(&mut self, amt: usize) -> Result<&mut Self> {
        init_check(self.library.control(Control::InitSecmem(amt)))?;
        Ok(self)
    }

    #[inline]
    pub fn enable_auto_expand_secmem(&mut self, amt: usize) -> Result<&mut Self> {
        init_check(self.library.control(Control::AutoExpandSecmem(amt)))?;
        Ok(self)
    }

    #[inline]
    pub fn run_self_tests(&mut self) -> Result<&mut Self> {
        init_check(self.library.control(Control::SelfTest))?;
        Ok(self)
    }

    fn best_effort(&self, cmd: Control) {
        let status = self.library.control(cmd);
        if !status.is_success() {
            log::warn!("{} control {} ignored: {}", self.library.name(), cmd.command(), status);
        }
    }
}

impl fmt::Debug for Initializer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Initializer")
            .field("library", &self.library.name())
            .finish()
    }
}

/// Performs the thread callback handshake and library initialization once
pub struct Registrar<L: CryptoLibrary> {
    library: L,
    table: &'static ThreadCallbacks,
    outcome: OnceCell<std::result::Result<(), Failure>>,
    state: AtomicU8,
    registrations: AtomicUsize,
    control_lock: Mutex<()>,
}

impl<L: CryptoLibrary> Registrar<L> {
    /// Registrar that will hand the process pthread table to `library`
    pub fn new(library: L) -> Self {
        Self::with_table(library, thread_callback_table())
    }

    /// Registrar using a specific callback table
    pub fn with_table(library: L, table: &'static ThreadCallbacks) -> Self {
        Registrar {
            library,
            table,
            outcome: OnceCell::new(),
            state: AtomicU8::new(LibraryInitState::Uninitialized as u8),
            registrations: AtomicUsize::new(0),
            control_lock: Mutex::new(()),
        }
    }

    /// The wrapped library.
    ///
    /// Calling into it directly bypasses the initialization guard.
    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn table(&self) -> &'static ThreadCallbacks {
        self.table
    }

    pub fn state(&self) -> LibraryInitState {
        LibraryInitState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.state() == LibraryInitState::Initialized
    }

    /// Number of times the registration body has run (0 or 1)
    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::Acquire)
    }

    /// Enable the library's memory guard. Only possible before any
    /// initialization; returns whether it was enabled.
    pub fn enable_memory_guard(&self) -> bool {
        let _lock = self.control_lock.lock().unwrap_or_else(|e| e.into_inner());
        if self.outcome.get().is_some() || self.library.is_any_initialization_started() {
            return false;
        }
        self.library.control(Control::EnableMemoryGuard).is_success()
    }

    #[inline]
    pub fn init(&self, f: impl FnOnce(&mut Initializer<'_>) -> Result<()>) -> Result<Crypto<'_, L>> {
        self.init_internal(false, f)
    }

    #[inline]
    pub fn init_fips_mode(
        &self,
        f: impl FnOnce(&mut Initializer<'_>) -> Result<()>,
    ) -> Result<Crypto<'_, L>> {
        self.init_internal(true, f)
    }

    pub fn init_with_config(&self, config: &InitConfig) -> Result<Crypto<'_, L>> {
        self.init_internal(config.fips, |init| config.apply(init))
    }

    /// Initialize with secure memory disabled and a secure random pool
    #[inline]
    pub fn init_default(&self) -> Result<Crypto<'_, L>> {
        self.init_with_config(&InitConfig::default())
    }

    /// Handle to an initialized library
    pub fn handle(&self) -> Result<Crypto<'_, L>> {
        match self.outcome.get() {
            Some(outcome) => self.resolve(outcome),
            None => Err(Error::NotInitialized),
        }
    }

    /// Handle to the library, initializing it with defaults first if needed
    pub fn handle_or_init(&self) -> Result<Crypto<'_, L>> {
        match self.outcome.get() {
            Some(outcome) => self.resolve(outcome),
            None => self.init_default(),
        }
    }

    fn resolve(&self, outcome: &std::result::Result<(), Failure>) -> Result<Crypto<'_, L>> {
        match outcome {
            Ok(()) => Ok(Crypto { registrar: self }),
            Err(failure) => Err(failure.to_error()),
        }
    }

    fn init_internal(
        &self,
        fips: bool,
        f: impl FnOnce(&mut Initializer<'_>) -> Result<()>,
    ) -> Result<Crypto<'_, L>> {
        if let Some(outcome) = self.outcome.get() {
            return self.resolve(outcome);
        }

        let mut first_error = None;
        let mut panic_payload: Option<Box<dyn Any + Send>> = None;
        let outcome = self.outcome.get_or_init(|| {
            self.state
                .store(LibraryInitState::Initializing as u8, Ordering::Release);
            self.registrations.fetch_add(1, Ordering::AcqRel);

            let result =
                panic::catch_unwind(AssertUnwindSafe(|| self.register_and_initialize(fips, f)));
            match result {
                Ok(Ok(())) => {
                    self.state
                        .store(LibraryInitState::Initialized as u8, Ordering::Release);
                    log::info!("{} initialized", self.library.name());
                    Ok(())
                }
                Ok(Err(err)) => {
                    self.state
                        .store(LibraryInitState::Failed as u8, Ordering::Release);
                    log::error!("{} initialization failed: {}", self.library.name(), err);
                    let failure = Failure::from_error(&err);
                    first_error = Some(err);
                    Err(failure)
                }
                Err(payload) => {
                    self.state
                        .store(LibraryInitState::Failed as u8, Ordering::Release);
                    log::error!("{} initialization panicked", self.library.name());
                    panic_payload = Some(payload);
                    Err(Failure::Status(ErrorCode::from_code(ErrorCode::GENERAL)))
                }
            }
        });

        if let Some(payload) = panic_payload {
            panic::resume_unwind(payload);
        }

        // The thread that ran the body gets the original error
        if let Some(err) = first_error {
            return Err(err);
        }
        self.resolve(outcome)
    }

    fn register_and_initialize(
        &self,
        fips: bool,
        f: impl FnOnce(&mut Initializer<'_>) -> Result<()>,
    ) -> Result<()> {
        let _lock = self.control_lock.lock().unwrap_or_else(|e| e.into_inner());
        let library = &self.library;

        if library.is_initialization_finished() {
            log::debug!("{} was already initialized", library.name());
            return Ok(());
        }

        if library.is_any_initialization_started() {
            log::warn!(
                "{} initialization started before thread callbacks were registered",
                library.name()
            );
        } else {
            log::debug!("registering {:?} with {}", self.table, library.name());
            init_check(library.control(Control::SetThreadCallbacks(self.table)))?;
            if fips {
                init_check(library.control(Control::ForceFipsMode))?;
            }
        }

        if library.check_version(Some(MIN_VERSION)).is_none() {
            return Err(Error::VersionMismatch {
                required: MIN_VERSION.to_string(),
            });
        }

        f(&mut Initializer { library })?;

        init_check(library.control(Control::InitializationFinished))
    }
}

impl<L: CryptoLibrary> fmt::Debug for Registrar<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registrar")
            .field("library", &self.library.name())
            .field("table", &self.table)
            .field("state", &self.state())
            .finish()
    }
}

/// Proof that the library behind a registrar is initialized
pub struct Crypto<'r, L: CryptoLibrary> {
    registrar: &'r Registrar<L>,
}

impl<L: CryptoLibrary> Clone for Crypto<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L: CryptoLibrary> Copy for Crypto<'_, L> {}

impl<L: CryptoLibrary> fmt::Debug for Crypto<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crypto")
            .field("library", &self.registrar.library.name())
            .finish()
    }
}

impl<'r, L: CryptoLibrary> Crypto<'r, L> {
    pub fn library(&self) -> &'r L {
        &self.registrar.library
    }

    #[inline]
    pub fn version(&self) -> &'static str {
        self.library().check_version(None).unwrap_or("unknown")
    }

    #[inline]
    pub fn check_version(&self, version: &str) -> bool {
        self.library().check_version(Some(version)).is_some()
    }

    #[inline]
    pub fn is_fips_mode_active(&self) -> bool {
        self.library().is_fips_mode_active()
    }

    #[inline]
    pub fn run_self_tests(&self) -> Result<()> {
        library_check(self.library().control(Control::SelfTest))
    }

    #[inline]
    pub fn destroy_secmem(&self) {
        self.library().control(Control::TermSecmem);
    }

    /// One-shot digest
    pub fn hash(&self, algo: Algorithm, data: &[u8]) -> Result<Vec<u8>> {
        let mut digest = self.digest(algo)?;
        digest.update(data)?;
        digest.finish()
    }

    /// Streaming digest
    pub fn digest(&self, algo: Algorithm) -> Result<MessageDigest> {
        self.library()
            .open_digest(algo)
            .map(MessageDigest::from_context)
            .map_err(|code| unsupported_or_library(code, algo.name()))
    }

    /// Streaming MAC keyed with `key`
    pub fn mac(&self, algo: MacAlgorithm, key: &[u8]) -> Result<Mac> {
        self.library()
            .open_mac(algo, key)
            .map(Mac::from_context)
            .map_err(|code| unsupported_or_library(code, algo.name()))
    }

    /// Authenticated cipher keyed with `key`
    pub fn cipher(&self, algo: CipherAlgorithm, key: &[u8]) -> Result<Cipher> {
        self.library()
            .open_cipher(algo, key)
            .map(Cipher::from_context)
            .map_err(|code| unsupported_or_library(code, algo.name()))
    }

    /// Derive `out.len()` bytes of key material from `passphrase`
    pub fn derive(&self, params: &KdfParams<'_>, passphrase: &[u8], out: &mut [u8]) -> Result<()> {
        self.library()
            .derive(params, passphrase, out)
            .map_err(|code| unsupported_or_library(code, params.algorithm.name()))
    }

    /// Derive a key of `len` bytes with PBKDF2 over HMAC with `digest`
    pub fn pbkdf2(
        &self,
        digest: Algorithm,
        passphrase: &[u8],
        salt: &[u8],
        iterations: u32,
        len: usize,
    ) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.derive(&KdfParams::pbkdf2(digest, iterations, salt), passphrase, &mut out)?;
        Ok(out)
    }

    /// Fill `buf` with random bytes of the given quality
    pub fn randomize(&self, buf: &mut [u8], level: RandomLevel) -> Result<()> {
        self.library().randomize(buf, level).map_err(Error::Library)
    }

    pub fn random_bytes(&self, len: usize, level: RandomLevel) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.randomize(&mut buf, level)?;
        Ok(buf)
    }
}

fn unsupported_or_library(code: ErrorCode, name: &str) -> Error {
    match code.code() {
        ErrorCode::DIGEST_ALGO
        | ErrorCode::MAC_ALGO
        | ErrorCode::CIPHER_ALGO
        | ErrorCode::NOT_SUPPORTED => {
            Error::UnsupportedAlgorithm(name.to_string())
        }
        _ => Error::Library(code),
    }
}

/*!
In-process cryptographic library.

`SoftwareLibrary` follows the same control protocol as a native library:
thread callbacks are accepted only before any initialization has started,
thread-sensitive state (the random pool and operation statistics) is
allocated lazily on first use, and that state is guarded by a mutex created
through the registered callback table. Primitives come from the RustCrypto
`sha2`, `hmac`, `hkdf` and `chacha20poly1305` crates and from `rand`.

Using the library without registering callbacks first is a misuse. A native
library would race on its internal locks; this one falls back to a
process-local lock and logs a warning so the mistake is visible.
*/

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};

use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use once_cell::sync::OnceCell;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use sha2::digest::{FixedOutputReset, Reset};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use super::{
    CipherContext, Control, CryptoLibrary, DigestContext, MacContext, version_at_least,
};
use crate::core::algorithms::{
    Algorithm, CipherAlgorithm, KdfAlgorithm, KdfParams, MacAlgorithm, RandomLevel,
};
use crate::core::constants::{SOFTWARE_VERSION, thread_option};
use crate::core::error::ErrorCode;
use crate::core::threading::{NativeMutex, ThreadCallbacks, ThreadingModel};

/// SHA-256("abc")
const SHA256_ABC: [u8; 32] = [
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
];

/// HMAC-SHA256, RFC 4231 test case 2
const HMAC_SHA256_JEFE: [u8; 32] = [
    0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95, 0x75, 0xc7,
    0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9, 0x64, 0xec, 0x38, 0x43,
];

/// Configuration recorded through control commands
#[derive(Debug, Default, Clone, Copy)]
struct Options {
    secmem_disabled: bool,
    secmem_size: usize,
    secmem_auto_expand: usize,
    quick_random: bool,
    secure_rndpool: bool,
    memory_guard: bool,
}

struct RandomPool {
    rng: StdRng,
    bytes_served: u64,
    operations: u64,
}

enum PoolLock {
    Callbacks(NativeMutex),
    Fallback(Mutex<()>),
}

/// Thread-sensitive state, allocated once on first use
struct Core {
    lock: PoolLock,
    pool: UnsafeCell<RandomPool>,
}

// `pool` is only touched while `lock` is held.
unsafe impl Sync for Core {}

impl Core {
    fn with_pool<R>(
        &self,
        counter: &AtomicU64,
        f: impl FnOnce(&mut RandomPool) -> R,
    ) -> Result<R, ErrorCode> {
        match &self.lock {
            PoolLock::Callbacks(mutex) => {
                let _guard = mutex.lock()?;
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(f(unsafe { &mut *self.pool.get() }))
            }
            PoolLock::Fallback(mutex) => {
                let _guard = mutex.lock().unwrap_or_else(|e| e.into_inner());
                Ok(f(unsafe { &mut *self.pool.get() }))
            }
        }
    }
}

/// Snapshot of the library's internal counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub operations: u64,
    pub random_bytes: u64,
}

pub struct SoftwareLibrary {
    callbacks: AtomicPtr<ThreadCallbacks>,
    any_init: AtomicBool,
    finished: AtomicBool,
    fips: AtomicBool,
    options: Mutex<Options>,
    core: OnceCell<Core>,
    self_inits: AtomicUsize,
    callback_locks: AtomicU64,
}

impl SoftwareLibrary {
    pub fn new() -> Self {
        SoftwareLibrary {
            callbacks: AtomicPtr::new(ptr::null_mut()),
            any_init: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            fips: AtomicBool::new(false),
            options: Mutex::new(Options::default()),
            core: OnceCell::new(),
            self_inits: AtomicUsize::new(0),
            callback_locks: AtomicU64::new(0),
        }
    }

    /// Table registered through `Control::SetThreadCallbacks`, if any
    pub fn registered_callbacks(&self) -> Option<&'static ThreadCallbacks> {
        let table = self.callbacks.load(Ordering::Acquire);
        // Only `&'static` tables are ever stored.
        unsafe { table.cast_const().as_ref() }
    }

    /// Whether internal state is guarded by mutexes from the registered table
    pub fn uses_callback_locks(&self) -> bool {
        matches!(self.core.get().map(|c| &c.lock), Some(PoolLock::Callbacks(_)))
    }

    /// Times internal state was allocated; never more than one
    pub fn self_initializations(&self) -> usize {
        self.self_inits.load(Ordering::Acquire)
    }

    /// Lock acquisitions performed through the callback table
    pub fn callback_lock_acquisitions(&self) -> u64 {
        self.callback_locks.load(Ordering::Relaxed)
    }

    pub fn secmem_size(&self) -> usize {
        self.options().secmem_size
    }

    pub fn is_secmem_disabled(&self) -> bool {
        self.options().secmem_disabled
    }

    pub fn is_quick_random(&self) -> bool {
        self.options().quick_random
    }

    pub fn is_secure_rndpool(&self) -> bool {
        self.options().secure_rndpool
    }

    pub fn is_memory_guard_enabled(&self) -> bool {
        self.options().memory_guard
    }

    /// Counters kept under the internal lock
    pub fn stats(&self) -> Result<PoolStats, ErrorCode> {
        self.core().with_pool(&self.callback_locks, |pool| PoolStats {
            operations: pool.operations,
            random_bytes: pool.bytes_served,
        })
    }

    fn options(&self) -> Options {
        *self.options.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_options(&self, f: impl FnOnce(&mut Options)) {
        let mut options = self.options.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut options);
    }

    /// Lazy self-initialization; allocates thread-sensitive state once
    fn core(&self) -> &Core {
        self.core.get_or_init(|| {
            self.any_init.store(true, Ordering::Release);
            self.self_inits.fetch_add(1, Ordering::AcqRel);

            let lock = match self.registered_callbacks() {
                Some(table) => {
                    let rc = table.call_init();
                    if rc != 0 {
                        log::warn!("thread callback init hook returned {}", rc);
                    }
                    match NativeMutex::new(table) {
                        Ok(mutex) => {
                            log::debug!("software library using registered thread callbacks");
                            PoolLock::Callbacks(mutex)
                        }
                        Err(code) => {
                            log::error!("thread callback mutex_init failed: {}", code);
                            PoolLock::Fallback(Mutex::new(()))
                        }
                    }
                }
                None => {
                    log::warn!(
                        "software library initialized before thread callbacks were registered"
                    );
                    PoolLock::Fallback(Mutex::new(()))
                }
            };

            Core {
                lock,
                pool: UnsafeCell::new(RandomPool {
                    rng: StdRng::from_os_rng(),
                    bytes_served: 0,
                    operations: 0,
                }),
            }
        })
    }

    fn count_operation(&self) -> Result<(), ErrorCode> {
        self.core()
            .with_pool(&self.callback_locks, |pool| pool.operations += 1)
    }

    fn set_thread_callbacks(&self, table: &'static ThreadCallbacks) -> ErrorCode {
        if self.any_init.load(Ordering::Acquire) {
            log::error!("thread callbacks registered after library initialization started");
            return ErrorCode::from_code(ErrorCode::INV_STATE);
        }
        match table.threading_model() {
            ThreadingModel::Pthread | ThreadingModel::User => {}
            other => {
                log::error!("unsupported threading model {:?}", other);
                return ErrorCode::from_code(ErrorCode::NOT_SUPPORTED);
            }
        }
        if table.version() != thread_option::VERSION {
            return ErrorCode::from_code(ErrorCode::NOT_SUPPORTED);
        }
        if !table.is_complete() {
            return ErrorCode::from_code(ErrorCode::INV_ARG);
        }
        self.callbacks
            .store(table.as_ptr().cast_mut(), Ordering::Release);
        ErrorCode::SUCCESS
    }

    /// Option changes are refused once initialization has finished
    fn configure(&self, f: impl FnOnce(&mut Options)) -> ErrorCode {
        self.try_configure(|options| {
            f(options);
            ErrorCode::SUCCESS
        })
    }

    /// Like `configure`, but `f` may reject the change after the state check
    fn try_configure(&self, f: impl FnOnce(&mut Options) -> ErrorCode) -> ErrorCode {
        self.core();
        if self.finished.load(Ordering::Acquire) {
            return ErrorCode::from_code(ErrorCode::INV_STATE);
        }
        let mut options = self.options.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut options)
    }

    fn self_test(&self) -> ErrorCode {
        let digest = match self.hash(Algorithm::Sha256, b"abc") {
            Ok(digest) => digest,
            Err(code) => return code,
        };
        if digest != SHA256_ABC {
            log::error!("SHA256 self test failed");
            return ErrorCode::from_code(ErrorCode::SELFTEST_FAILED);
        }

        let mut mac = match self.open_mac(MacAlgorithm::HmacSha256, b"Jefe") {
            Ok(mac) => mac,
            Err(code) => return code,
        };
        let tag = match mac.update(b"what do ya want for nothing?").and_then(|()| mac.finish()) {
            Ok(tag) => tag,
            Err(code) => return code,
        };
        if tag != HMAC_SHA256_JEFE {
            log::error!("HMAC_SHA256 self test failed");
            return ErrorCode::from_code(ErrorCode::SELFTEST_FAILED);
        }

        log::debug!("software library self tests passed");
        ErrorCode::SUCCESS
    }
}

impl Default for SoftwareLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SoftwareLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftwareLibrary")
            .field("callbacks", &self.registered_callbacks())
            .field("any_init", &self.any_init.load(Ordering::Relaxed))
            .field("finished", &self.finished.load(Ordering::Relaxed))
            .field("fips", &self.fips.load(Ordering::Relaxed))
            .finish()
    }
}

impl CryptoLibrary for SoftwareLibrary {
    fn name(&self) -> &'static str {
        "software"
    }

    fn control(&self, cmd: Control) -> ErrorCode {
        match cmd {
            Control::SetThreadCallbacks(table) => self.set_thread_callbacks(table),
            Control::EnableMemoryGuard => {
                if self.any_init.load(Ordering::Acquire) {
                    return ErrorCode::from_code(ErrorCode::INV_STATE);
                }
                self.update_options(|o| o.memory_guard = true);
                ErrorCode::SUCCESS
            }
            Control::ForceFipsMode => {
                if self.any_init.load(Ordering::Acquire) {
                    return ErrorCode::from_code(ErrorCode::INV_STATE);
                }
                self.fips.store(true, Ordering::Release);
                ErrorCode::SUCCESS
            }
            Control::AnyInitializationP => {
                ErrorCode::new(self.any_init.load(Ordering::Acquire) as u32)
            }
            Control::InitializationFinishedP => {
                ErrorCode::new(self.finished.load(Ordering::Acquire) as u32)
            }
            Control::FipsModeP => ErrorCode::new(self.fips.load(Ordering::Acquire) as u32),
            Control::DisableSecmem => self.configure(|o| {
                o.secmem_disabled = true;
                o.secmem_size = 0;
            }),
            Control::InitSecmem(size) => self.try_configure(|o| {
                if o.secmem_disabled {
                    return ErrorCode::from_code(ErrorCode::NOT_SUPPORTED);
                }
                o.secmem_size = size;
                ErrorCode::SUCCESS
            }),
            Control::AutoExpandSecmem(size) => self.configure(|o| o.secmem_auto_expand = size),
            Control::EnableQuickRandom => self.configure(|o| o.quick_random = true),
            Control::UseSecureRndpool => self.configure(|o| o.secure_rndpool = true),
            Control::SelfTest => self.self_test(),
            Control::TermSecmem => {
                self.update_options(|o| o.secmem_size = 0);
                ErrorCode::SUCCESS
            }
            Control::InitializationFinished => {
                self.core();
                self.finished.store(true, Ordering::Release);
                ErrorCode::SUCCESS
            }
        }
    }

    fn check_version(&self, required: Option<&str>) -> Option<&'static str> {
        self.core();
        match required {
            Some(required) if !version_at_least(SOFTWARE_VERSION, required) => None,
            _ => Some(SOFTWARE_VERSION),
        }
    }

    fn open_digest(&self, algo: Algorithm) -> Result<Box<dyn DigestContext>, ErrorCode> {
        self.count_operation()?;
        let ctx: Box<dyn DigestContext> = match algo {
            Algorithm::Sha224 => Box::new(Sha2Context::new(algo, Sha224::default())),
            Algorithm::Sha256 => Box::new(Sha2Context::new(algo, Sha256::default())),
            Algorithm::Sha384 => Box::new(Sha2Context::new(algo, Sha384::default())),
            Algorithm::Sha512 => Box::new(Sha2Context::new(algo, Sha512::default())),
            _ => return Err(ErrorCode::from_code(ErrorCode::DIGEST_ALGO)),
        };
        Ok(ctx)
    }

    fn open_mac(&self, algo: MacAlgorithm, key: &[u8]) -> Result<Box<dyn MacContext>, ErrorCode> {
        self.count_operation()?;
        if key.is_empty() {
            return Err(ErrorCode::from_code(ErrorCode::MISSING_KEY));
        }
        let invalid = |_| ErrorCode::from_code(ErrorCode::INV_ARG);
        let ctx: Box<dyn MacContext> = match algo {
            MacAlgorithm::HmacSha224 => {
                Box::new(HmacContext::new(algo, <Hmac<Sha224> as Mac>::new_from_slice(key).map_err(invalid)?))
            }
            MacAlgorithm::HmacSha256 => {
                Box::new(HmacContext::new(algo, <Hmac<Sha256> as Mac>::new_from_slice(key).map_err(invalid)?))
            }
            MacAlgorithm::HmacSha384 => {
                Box::new(HmacContext::new(algo, <Hmac<Sha384> as Mac>::new_from_slice(key).map_err(invalid)?))
            }
            MacAlgorithm::HmacSha512 => {
                Box::new(HmacContext::new(algo, <Hmac<Sha512> as Mac>::new_from_slice(key).map_err(invalid)?))
            }
            MacAlgorithm::HmacSha1 => return Err(ErrorCode::from_code(ErrorCode::MAC_ALGO)),
        };
        Ok(ctx)
    }

    fn open_cipher(
        &self,
        algo: CipherAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn CipherContext>, ErrorCode> {
        self.count_operation()?;
        match algo {
            CipherAlgorithm::ChaCha20Poly1305 => {
                let inner = <ChaCha20Poly1305 as KeyInit>::new_from_slice(key)
                    .map_err(|_| ErrorCode::from_code(ErrorCode::INV_KEYLEN))?;
                Ok(Box::new(ChaChaContext { inner }))
            }
            CipherAlgorithm::Aes128Gcm | CipherAlgorithm::Aes256Gcm => {
                Err(ErrorCode::from_code(ErrorCode::CIPHER_ALGO))
            }
        }
    }

    fn derive(
        &self,
        params: &KdfParams<'_>,
        passphrase: &[u8],
        out: &mut [u8],
    ) -> Result<(), ErrorCode> {
        self.count_operation()?;
        if out.is_empty() {
            return Err(ErrorCode::from_code(ErrorCode::INV_VALUE));
        }
        if !matches!(params.algorithm, KdfAlgorithm::Pbkdf2 | KdfAlgorithm::Hkdf) {
            log::debug!("{} is not available in the software library", params.algorithm);
            return Err(ErrorCode::from_code(ErrorCode::NOT_SUPPORTED));
        }
        let digest = params
            .digest()
            .ok_or_else(|| ErrorCode::from_code(ErrorCode::DIGEST_ALGO))?;

        match params.algorithm {
            KdfAlgorithm::Pbkdf2 => {
                let salt = params
                    .salt
                    .ok_or_else(|| ErrorCode::from_code(ErrorCode::INV_VALUE))?;
                if params.iterations == 0 {
                    return Err(ErrorCode::from_code(ErrorCode::INV_VALUE));
                }
                match digest {
                    Algorithm::Sha224 => pbkdf2::<Hmac<Sha224>>(passphrase, salt, params.iterations, out),
                    Algorithm::Sha256 => pbkdf2::<Hmac<Sha256>>(passphrase, salt, params.iterations, out),
                    Algorithm::Sha384 => pbkdf2::<Hmac<Sha384>>(passphrase, salt, params.iterations, out),
                    Algorithm::Sha512 => pbkdf2::<Hmac<Sha512>>(passphrase, salt, params.iterations, out),
                    _ => Err(ErrorCode::from_code(ErrorCode::DIGEST_ALGO)),
                }
            }
            KdfAlgorithm::Hkdf => {
                let too_long = |_| ErrorCode::from_code(ErrorCode::INV_LENGTH);
                match digest {
                    Algorithm::Sha224 => Hkdf::<Sha224>::new(params.salt, passphrase).expand(&[], out).map_err(too_long),
                    Algorithm::Sha256 => Hkdf::<Sha256>::new(params.salt, passphrase).expand(&[], out).map_err(too_long),
                    Algorithm::Sha384 => Hkdf::<Sha384>::new(params.salt, passphrase).expand(&[], out).map_err(too_long),
                    Algorithm::Sha512 => Hkdf::<Sha512>::new(params.salt, passphrase).expand(&[], out).map_err(too_long),
                    _ => Err(ErrorCode::from_code(ErrorCode::DIGEST_ALGO)),
                }
            }
            _ => Err(ErrorCode::from_code(ErrorCode::NOT_SUPPORTED)),
        }
    }

    fn randomize(&self, buf: &mut [u8], _level: RandomLevel) -> Result<(), ErrorCode> {
        self.core().with_pool(&self.callback_locks, |pool| {
            pool.rng.fill_bytes(buf);
            pool.bytes_served += buf.len() as u64;
            pool.operations += 1;
        })
    }
}

struct Sha2Context<D> {
    algo: Algorithm,
    inner: D,
}

impl<D> Sha2Context<D> {
    fn new(algo: Algorithm, inner: D) -> Self {
        Sha2Context { algo, inner }
    }
}

impl<D> DigestContext for Sha2Context<D>
where
    D: Digest + FixedOutputReset + Reset + Send,
{
    fn algorithm(&self) -> Algorithm {
        self.algo
    }

    fn update(&mut self, data: &[u8]) -> Result<(), ErrorCode> {
        Digest::update(&mut self.inner, data);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, ErrorCode> {
        Ok(Digest::finalize_reset(&mut self.inner).to_vec())
    }

    fn reset(&mut self) {
        Digest::reset(&mut self.inner);
    }
}

struct HmacContext<M> {
    algo: MacAlgorithm,
    inner: M,
}

impl<M> HmacContext<M> {
    fn new(algo: MacAlgorithm, inner: M) -> Self {
        HmacContext { algo, inner }
    }
}

impl<M> MacContext for HmacContext<M>
where
    M: Mac + FixedOutputReset + Reset + Send,
{
    fn algorithm(&self) -> MacAlgorithm {
        self.algo
    }

    fn update(&mut self, data: &[u8]) -> Result<(), ErrorCode> {
        Mac::update(&mut self.inner, data);
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, ErrorCode> {
        Ok(Mac::finalize_reset(&mut self.inner).into_bytes().to_vec())
    }

    fn reset(&mut self) {
        Mac::reset(&mut self.inner);
    }
}

struct ChaChaContext {
    inner: ChaCha20Poly1305,
}

impl ChaChaContext {
    fn nonce(nonce: &[u8]) -> Result<&chacha20poly1305::Nonce, ErrorCode> {
        if nonce.len() != CipherAlgorithm::ChaCha20Poly1305.nonce_len() {
            return Err(ErrorCode::from_code(ErrorCode::INV_LENGTH));
        }
        Ok(chacha20poly1305::Nonce::from_slice(nonce))
    }
}

impl CipherContext for ChaChaContext {
    fn algorithm(&self) -> CipherAlgorithm {
        CipherAlgorithm::ChaCha20Poly1305
    }

    fn encrypt(
        &mut self,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ErrorCode> {
        let nonce = Self::nonce(nonce)?;
        Aead::encrypt(&self.inner, nonce, Payload { msg: plaintext, aad })
            .map_err(|_| ErrorCode::from_code(ErrorCode::GENERAL))
    }

    fn decrypt(&mut self, nonce: &[u8], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>, ErrorCode> {
        let nonce = Self::nonce(nonce)?;
        Aead::decrypt(&self.inner, nonce, Payload { msg: sealed, aad })
            .map_err(|_| ErrorCode::from_code(ErrorCode::CHECKSUM))
    }
}

/// PBKDF2 (RFC 8018) over an HMAC pseudo-random function
fn pbkdf2<M>(passphrase: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) -> Result<(), ErrorCode>
where
    M: Mac + KeyInit + Clone,
{
    let prf = <M as Mac>::new_from_slice(passphrase)
        .map_err(|_| ErrorCode::from_code(ErrorCode::INV_KEYLEN))?;

    let mut filled = 0;
    let mut block_index: u32 = 1;
    while filled < out.len() {
        let mut u = prf.clone();
        Mac::update(&mut u, salt);
        Mac::update(&mut u, &block_index.to_be_bytes());
        let mut block = u.finalize().into_bytes();
        let mut t = block.clone();

        for _ in 1..iterations {
            let mut u = prf.clone();
            Mac::update(&mut u, &block);
            block = u.finalize().into_bytes();
            for (acc, byte) in t.iter_mut().zip(block.iter()) {
                *acc ^= byte;
            }
        }

        let n = (out.len() - filled).min(t.len());
        out[filled..filled + n].copy_from_slice(&t[..n]);
        filled += n;
        block_index += 1;
    }
    Ok(())
}

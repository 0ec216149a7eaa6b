/*!
libgcrypt binding.

libgcrypt keeps its state in process globals, so [`GcryptLibrary`] cannot be
constructed directly: the only instance lives behind [`registrar`], which
performs the thread callback handshake once per process.
*/

use std::ffi::{CStr, CString};
use std::ptr;

use libc::{c_char, c_int, c_uint, c_ulong, c_void, size_t};
use once_cell::sync::Lazy;

use super::{CipherContext, Control, CryptoLibrary, DigestContext, MacContext};
use crate::core::algorithms::{
    Algorithm, CipherAlgorithm, KdfAlgorithm, KdfParams, MacAlgorithm, RandomLevel,
};
use crate::core::error::ErrorCode;
use crate::core::init::Registrar;

type GcryError = c_uint;
type Handle = *mut c_void;

#[link(name = "gcrypt")]
unsafe extern "C" {
    fn gcry_check_version(req_version: *const c_char) -> *const c_char;
    fn gcry_control(cmd: c_uint, ...) -> GcryError;

    fn gcry_md_open(handle: *mut Handle, algo: c_int, flags: c_uint) -> GcryError;
    fn gcry_md_close(handle: Handle);
    fn gcry_md_reset(handle: Handle);
    fn gcry_md_write(handle: Handle, buffer: *const c_void, length: size_t);
    fn gcry_md_read(handle: Handle, algo: c_int) -> *mut u8;

    fn gcry_mac_open(handle: *mut Handle, algo: c_int, flags: c_uint, ctx: *mut c_void) -> GcryError;
    fn gcry_mac_close(handle: Handle);
    fn gcry_mac_setkey(handle: Handle, key: *const c_void, keylen: size_t) -> GcryError;
    fn gcry_mac_write(handle: Handle, buffer: *const c_void, length: size_t) -> GcryError;
    fn gcry_mac_read(handle: Handle, buffer: *mut c_void, buflen: *mut size_t) -> GcryError;
    fn gcry_mac_ctl(handle: Handle, cmd: c_int, buffer: *mut c_void, buflen: size_t) -> GcryError;

    fn gcry_cipher_open(handle: *mut Handle, algo: c_int, mode: c_int, flags: c_uint) -> GcryError;
    fn gcry_cipher_close(handle: Handle);
    fn gcry_cipher_setkey(handle: Handle, key: *const c_void, keylen: size_t) -> GcryError;
    fn gcry_cipher_setiv(handle: Handle, iv: *const c_void, ivlen: size_t) -> GcryError;
    fn gcry_cipher_authenticate(handle: Handle, abuf: *const c_void, abuflen: size_t) -> GcryError;
    fn gcry_cipher_gettag(handle: Handle, outtag: *mut c_void, taglen: size_t) -> GcryError;
    fn gcry_cipher_checktag(handle: Handle, intag: *const c_void, taglen: size_t) -> GcryError;
    fn gcry_cipher_encrypt(
        handle: Handle,
        out: *mut c_void,
        outsize: size_t,
        input: *const c_void,
        inlen: size_t,
    ) -> GcryError;
    fn gcry_cipher_decrypt(
        handle: Handle,
        out: *mut c_void,
        outsize: size_t,
        input: *const c_void,
        inlen: size_t,
    ) -> GcryError;
    fn gcry_cipher_ctl(handle: Handle, cmd: c_int, buffer: *mut c_void, buflen: size_t) -> GcryError;

    fn gcry_kdf_derive(
        passphrase: *const c_void,
        passphraselen: size_t,
        algo: c_int,
        subalgo: c_int,
        salt: *const c_void,
        saltlen: size_t,
        iterations: c_ulong,
        keysize: size_t,
        keybuffer: *mut c_void,
    ) -> GcryError;

    fn gcry_randomize(buffer: *mut c_void, length: size_t, level: c_uint);
}

fn check(rc: GcryError) -> Result<(), ErrorCode> {
    ErrorCode::new(rc).into_result()
}

/// `GCRYCTL_RESET`, used by the gcry_mac_reset and gcry_cipher_reset macros
const CTL_RESET: c_int = 4;

static REGISTRAR: Lazy<Registrar<GcryptLibrary>> =
    Lazy::new(|| Registrar::new(GcryptLibrary { _private: () }));

/// Process-wide registrar for libgcrypt
pub fn registrar() -> &'static Registrar<GcryptLibrary> {
    &REGISTRAR
}

#[derive(Debug)]
pub struct GcryptLibrary {
    _private: (),
}

impl CryptoLibrary for GcryptLibrary {
    fn name(&self) -> &'static str {
        "libgcrypt"
    }

    fn control(&self, cmd: Control) -> ErrorCode {
        let command = cmd.command();
        let raw = unsafe {
            match cmd {
                Control::SetThreadCallbacks(table) => gcry_control(command, table.as_ptr()),
                Control::InitSecmem(size) | Control::AutoExpandSecmem(size) => {
                    gcry_control(command, size as c_uint)
                }
                _ => gcry_control(command, 0 as c_int),
            }
        };
        ErrorCode::new(raw)
    }

    fn check_version(&self, required: Option<&str>) -> Option<&'static str> {
        let required = match required {
            Some(v) => Some(CString::new(v).ok()?),
            None => None,
        };
        let ptr = unsafe {
            gcry_check_version(required.as_ref().map_or(ptr::null(), |v| v.as_ptr()))
        };
        if ptr.is_null() {
            return None;
        }
        unsafe { CStr::from_ptr(ptr) }.to_str().ok()
    }

    fn open_digest(&self, algo: Algorithm) -> Result<Box<dyn DigestContext>, ErrorCode> {
        let mut handle: Handle = ptr::null_mut();
        check(unsafe { gcry_md_open(&mut handle, algo.raw() as c_int, 0) })?;
        Ok(Box::new(GcryDigest { handle, algo }))
    }

    fn open_mac(&self, algo: MacAlgorithm, key: &[u8]) -> Result<Box<dyn MacContext>, ErrorCode> {
        let mut handle: Handle = ptr::null_mut();
        check(unsafe { gcry_mac_open(&mut handle, algo.raw() as c_int, 0, ptr::null_mut()) })?;
        let mac = GcryMac { handle, algo };
        check(unsafe { gcry_mac_setkey(mac.handle, key.as_ptr().cast(), key.len()) })?;
        Ok(Box::new(mac))
    }

    fn open_cipher(
        &self,
        algo: CipherAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn CipherContext>, ErrorCode> {
        let mut handle: Handle = ptr::null_mut();
        check(unsafe {
            gcry_cipher_open(&mut handle, algo.raw() as c_int, algo.raw_mode() as c_int, 0)
        })?;
        let cipher = GcryCipher { handle, algo };
        check(unsafe { gcry_cipher_setkey(cipher.handle, key.as_ptr().cast(), key.len()) })?;
        Ok(Box::new(cipher))
    }

    fn derive(
        &self,
        params: &KdfParams<'_>,
        passphrase: &[u8],
        out: &mut [u8],
    ) -> Result<(), ErrorCode> {
        if params.algorithm == KdfAlgorithm::Hkdf {
            return Err(ErrorCode::from_code(ErrorCode::NOT_SUPPORTED));
        }
        let (salt, salt_len) = params
            .salt
            .map_or((ptr::null(), 0), |s| (s.as_ptr(), s.len()));
        check(unsafe {
            gcry_kdf_derive(
                passphrase.as_ptr().cast(),
                passphrase.len(),
                params.algorithm.raw() as c_int,
                params.subalgo as c_int,
                salt.cast(),
                salt_len,
                params.iterations as c_ulong,
                out.len(),
                out.as_mut_ptr().cast(),
            )
        })
    }

    fn randomize(&self, buf: &mut [u8], level: RandomLevel) -> Result<(), ErrorCode> {
        unsafe { gcry_randomize(buf.as_mut_ptr().cast(), buf.len(), level.raw()) };
        Ok(())
    }
}

struct GcryDigest {
    handle: Handle,
    algo: Algorithm,
}

// A digest handle is only used by its owner.
unsafe impl Send for GcryDigest {}

impl Drop for GcryDigest {
    fn drop(&mut self) {
        unsafe { gcry_md_close(self.handle) };
    }
}

impl DigestContext for GcryDigest {
    fn algorithm(&self) -> Algorithm {
        self.algo
    }

    fn update(&mut self, data: &[u8]) -> Result<(), ErrorCode> {
        unsafe { gcry_md_write(self.handle, data.as_ptr().cast(), data.len()) };
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, ErrorCode> {
        let digest = unsafe { gcry_md_read(self.handle, self.algo.raw() as c_int) };
        if digest.is_null() {
            return Err(ErrorCode::from_code(ErrorCode::DIGEST_ALGO));
        }
        let out = unsafe { std::slice::from_raw_parts(digest, self.algo.digest_len()) }.to_vec();
        self.reset();
        Ok(out)
    }

    fn reset(&mut self) {
        unsafe { gcry_md_reset(self.handle) };
    }
}

struct GcryMac {
    handle: Handle,
    algo: MacAlgorithm,
}

unsafe impl Send for GcryMac {}

impl Drop for GcryMac {
    fn drop(&mut self) {
        unsafe { gcry_mac_close(self.handle) };
    }
}

impl MacContext for GcryMac {
    fn algorithm(&self) -> MacAlgorithm {
        self.algo
    }

    fn update(&mut self, data: &[u8]) -> Result<(), ErrorCode> {
        check(unsafe { gcry_mac_write(self.handle, data.as_ptr().cast(), data.len()) })
    }

    fn finish(&mut self) -> Result<Vec<u8>, ErrorCode> {
        let mut out = vec![0u8; self.algo.mac_len()];
        let mut len: size_t = out.len();
        check(unsafe { gcry_mac_read(self.handle, out.as_mut_ptr().cast(), &mut len) })?;
        out.truncate(len);
        self.reset();
        Ok(out)
    }

    fn reset(&mut self) {
        unsafe { gcry_mac_ctl(self.handle, CTL_RESET, ptr::null_mut(), 0) };
    }
}

struct GcryCipher {
    handle: Handle,
    algo: CipherAlgorithm,
}

unsafe impl Send for GcryCipher {}

impl GcryCipher {
    /// Reset, then load the nonce and associated data
    fn start(&mut self, nonce: &[u8], aad: &[u8]) -> Result<(), ErrorCode> {
        unsafe {
            check(gcry_cipher_ctl(self.handle, CTL_RESET, ptr::null_mut(), 0))?;
            check(gcry_cipher_setiv(self.handle, nonce.as_ptr().cast(), nonce.len()))?;
            check(gcry_cipher_authenticate(self.handle, aad.as_ptr().cast(), aad.len()))
        }
    }
}

impl Drop for GcryCipher {
    fn drop(&mut self) {
        unsafe { gcry_cipher_close(self.handle) };
    }
}

impl CipherContext for GcryCipher {
    fn algorithm(&self) -> CipherAlgorithm {
        self.algo
    }

    fn encrypt(
        &mut self,
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ErrorCode> {
        self.start(nonce, aad)?;
        let tag_len = self.algo.tag_len();
        let mut out = vec![0u8; plaintext.len() + tag_len];
        let (body, tag) = out.split_at_mut(plaintext.len());
        unsafe {
            check(gcry_cipher_encrypt(
                self.handle,
                body.as_mut_ptr().cast(),
                body.len(),
                plaintext.as_ptr().cast(),
                plaintext.len(),
            ))?;
            check(gcry_cipher_gettag(self.handle, tag.as_mut_ptr().cast(), tag.len()))?;
        }
        Ok(out)
    }

    fn decrypt(&mut self, nonce: &[u8], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>, ErrorCode> {
        let tag_len = self.algo.tag_len();
        if sealed.len() < tag_len {
            return Err(ErrorCode::from_code(ErrorCode::INV_LENGTH));
        }
        self.start(nonce, aad)?;
        let (body, tag) = sealed.split_at(sealed.len() - tag_len);
        let mut out = vec![0u8; body.len()];
        unsafe {
            check(gcry_cipher_decrypt(
                self.handle,
                out.as_mut_ptr().cast(),
                out.len(),
                body.as_ptr().cast(),
                body.len(),
            ))?;
            check(gcry_cipher_checktag(self.handle, tag.as_ptr().cast(), tag.len()))?;
        }
        Ok(out)
    }
}

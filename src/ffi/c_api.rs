/*!
C API.

`crypto_threads_pthread_shim` is the accessor a C binding calls to obtain the
callback table before handing it to its library's "set thread callbacks"
control command. The remaining functions drive the process-wide default
library.
*/

use std::{
    os::raw::{c_int, c_uint},
    ptr, slice,
};

use crate::{
    core::error::{Error, Result},
    Algorithm, ThreadCallbacks,
};

// Error codes for the C API
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorCode {
    Success = 0,
    InvalidArgument = -1,
    InitializationFailed = -2,
    NotInitialized = -3,
    UnsupportedAlgorithm = -4,
    LibraryError = -5,
    VersionMismatch = -6,
    InternalError = -7,
}

// Helper function to convert Result to C error code
fn to_error_code<T>(result: Result<T>) -> (CryptoErrorCode, Option<T>) {
    match result {
        Ok(value) => (CryptoErrorCode::Success, Some(value)),
        Err(err) => {
            let code = match err {
                Error::InitializationFailed { .. } => CryptoErrorCode::InitializationFailed,
                Error::VersionMismatch { .. } => CryptoErrorCode::VersionMismatch,
                Error::NotInitialized => CryptoErrorCode::NotInitialized,
                Error::UnsupportedAlgorithm(_) => CryptoErrorCode::UnsupportedAlgorithm,
                Error::Library(_) => CryptoErrorCode::LibraryError,
                Error::Io(_) => CryptoErrorCode::InternalError,
            };
            (code, None)
        }
    }
}

/// Pointer to the process-wide pthread callback table
///
/// @return Never NULL; the table lives for the whole process
#[unsafe(no_mangle)]
pub extern "C" fn crypto_threads_pthread_shim() -> *const ThreadCallbacks {
    crate::thread_callback_table().as_ptr()
}

/// Initialize the default library with the default configuration
///
/// @param out_status Optional pointer receiving the raw library status on failure
/// @return 0 on success, negative error code on failure
#[unsafe(no_mangle)]
pub unsafe extern "C" fn crypto_init(out_status: *mut c_uint) -> c_int {
    let result = crate::init_default();
    let status = match &result {
        Err(err) => err.status().map(|code| code.raw()).unwrap_or(0),
        Ok(_) => 0,
    };
    if !out_status.is_null() {
        unsafe { *out_status = status };
    }
    to_error_code(result).0 as c_int
}

/// @return 1 if the default library is initialized, 0 otherwise
#[unsafe(no_mangle)]
pub extern "C" fn crypto_is_initialized() -> c_int {
    crate::is_initialized() as c_int
}

/// Hash a buffer with the default library
///
/// @param algo Digest algorithm identifier
/// @param data Input buffer (may be NULL when data_len is 0)
/// @param data_len Length of the input buffer
/// @param out Output buffer
/// @param out_len In: capacity of out. Out: digest length written
/// @return 0 on success, negative error code on failure
#[unsafe(no_mangle)]
pub unsafe extern "C" fn crypto_hash(
    algo: c_uint,
    data: *const u8,
    data_len: usize,
    out: *mut u8,
    out_len: *mut usize,
) -> c_int {
    // Validate arguments
    if out.is_null() || out_len.is_null() || (data.is_null() && data_len != 0) {
        return CryptoErrorCode::InvalidArgument as c_int;
    }
    let algo = match Algorithm::from_raw(algo) {
        Some(algo) => algo,
        None => return CryptoErrorCode::UnsupportedAlgorithm as c_int,
    };
    let capacity = unsafe { *out_len };
    if capacity < algo.digest_len() {
        return CryptoErrorCode::InvalidArgument as c_int;
    }

    let input = if data_len == 0 {
        &[][..]
    } else {
        unsafe { slice::from_raw_parts(data, data_len) }
    };

    match to_error_code(crate::hash(algo, input)) {
        (CryptoErrorCode::Success, Some(digest)) => {
            unsafe {
                ptr::copy_nonoverlapping(digest.as_ptr(), out, digest.len());
                *out_len = digest.len();
            }
            CryptoErrorCode::Success as c_int
        }
        (code, _) => code as c_int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shim_returns_static_table() {
        let first = crypto_threads_pthread_shim();
        assert!(!first.is_null());
        assert_eq!(first, crypto_threads_pthread_shim());
        assert_eq!(first, crate::thread_callback_table().as_ptr());
    }

    #[test]
    fn test_hash_via_c_api() {
        let mut out = [0u8; 64];
        let mut out_len = out.len();
        let rc = unsafe {
            crypto_hash(8, b"abc".as_ptr(), 3, out.as_mut_ptr(), &mut out_len)
        };
        assert_eq!(rc, 0);
        assert_eq!(out_len, 32);
        assert_eq!(out[..4], [0xba, 0x78, 0x16, 0xbf]);
        assert_eq!(crypto_is_initialized(), 1);
    }

    #[test]
    fn test_hash_rejects_small_buffer() {
        let mut out = [0u8; 16];
        let mut out_len = out.len();
        let rc = unsafe { crypto_hash(8, ptr::null(), 0, out.as_mut_ptr(), &mut out_len) };
        assert_eq!(rc, CryptoErrorCode::InvalidArgument as c_int);
    }
}

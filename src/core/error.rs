/*!
Error handling for native cryptographic library initialization.

Status values reported by the library are carried as [`ErrorCode`] and are
never rewritten on their way to the caller.
*/

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for library initialization and operations
pub type Result<T> = std::result::Result<T, Error>;

/// Raw status value returned by the library's control interface.
///
/// Layout follows the gpg-error convention: the error source lives in bits
/// 24..31 and the error code in the low 16 bits. Zero means success.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ErrorCode(u32);

impl ErrorCode {
    /// Success status
    pub const SUCCESS: ErrorCode = ErrorCode(0);

    pub const GENERAL: u32 = 1;
    pub const DIGEST_ALGO: u32 = 5;
    pub const CHECKSUM: u32 = 10;
    pub const CIPHER_ALGO: u32 = 12;
    pub const INV_KEYLEN: u32 = 44;
    pub const INV_ARG: u32 = 45;
    pub const SELFTEST_FAILED: u32 = 50;
    pub const INV_VALUE: u32 = 55;
    pub const NOT_SUPPORTED: u32 = 60;
    pub const INV_LENGTH: u32 = 139;
    pub const INV_STATE: u32 = 156;
    pub const MAC_ALGO: u32 = 197;
    pub const MISSING_KEY: u32 = 181;

    /// Flag marking a code that wraps a system errno value
    pub const SYSTEM_ERROR: u32 = 1 << 15;

    /// Source tag used for statuses produced inside this crate
    pub const SOURCE_USER_1: u32 = 32;

    const SOURCE_SHIFT: u32 = 24;
    const SOURCE_MASK: u32 = 0x7F;
    const CODE_MASK: u32 = 0xFFFF;

    /// Wrap a raw status exactly as the library returned it
    #[inline]
    pub const fn new(raw: u32) -> Self {
        ErrorCode(raw)
    }

    /// Build a status from a source tag and an error code
    #[inline]
    pub const fn from_source(source: u32, code: u32) -> Self {
        if code == 0 {
            return ErrorCode(0);
        }
        ErrorCode(((source & Self::SOURCE_MASK) << Self::SOURCE_SHIFT) | (code & Self::CODE_MASK))
    }

    /// Build a status attributed to this crate
    #[inline]
    pub const fn from_code(code: u32) -> Self {
        Self::from_source(Self::SOURCE_USER_1, code)
    }

    /// Build a status from an errno value returned by a thread callback
    #[inline]
    pub const fn from_errno(errno: i32) -> Self {
        if errno == 0 {
            return ErrorCode(0);
        }
        Self::from_code(Self::SYSTEM_ERROR | (errno as u32 & 0x7FFF))
    }

    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn code(&self) -> u32 {
        self.0 & Self::CODE_MASK
    }

    #[inline]
    pub const fn source(&self) -> u32 {
        (self.0 >> Self::SOURCE_SHIFT) & Self::SOURCE_MASK
    }

    #[inline]
    pub const fn is_success(&self) -> bool {
        self.code() == 0
    }

    /// Convert to `Ok(())` on success, or the status on failure
    #[inline]
    pub fn into_result(self) -> std::result::Result<(), ErrorCode> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }

    /// Short description of well known codes
    pub fn description(&self) -> &'static str {
        match self.code() {
            0 => "Success",
            Self::GENERAL => "General error",
            Self::DIGEST_ALGO => "Invalid digest algorithm",
            Self::CHECKSUM => "Bad checksum",
            Self::CIPHER_ALGO => "Invalid cipher algorithm",
            Self::INV_KEYLEN => "Invalid key length",
            Self::INV_ARG => "Invalid argument",
            Self::SELFTEST_FAILED => "Selftest failed",
            Self::INV_VALUE => "Invalid value",
            Self::NOT_SUPPORTED => "Not supported",
            Self::INV_LENGTH => "Invalid length",
            Self::INV_STATE => "Invalid state",
            Self::MAC_ALGO => "Invalid MAC algorithm",
            Self::MISSING_KEY => "Missing key",
            c if c & Self::SYSTEM_ERROR != 0 => "System error",
            _ => "Unknown error code",
        }
    }
}

impl From<u32> for ErrorCode {
    fn from(raw: u32) -> Self {
        ErrorCode(raw)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {}, source {})", self.description(), self.code(), self.source())
    }
}

/// Error type for library initialization and operations
#[derive(Error, Debug)]
pub enum Error {
    /// The registration handshake or a configuration step failed
    #[error("cryptographic library initialization failed: {code}")]
    InitializationFailed { code: ErrorCode },

    /// The linked library is older than required
    #[error("cryptographic library does not satisfy version {required}")]
    VersionMismatch { required: String },

    /// An operation was requested before initialization succeeded
    #[error("cryptographic library is not initialized")]
    NotInitialized,

    /// An operation failed inside the library
    #[error("cryptographic library error: {0}")]
    Library(ErrorCode),

    /// The algorithm is unknown or disabled in this library
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Raw library status behind this error, if any
    pub fn status(&self) -> Option<ErrorCode> {
        match self {
            Error::InitializationFailed { code } => Some(*code),
            Error::Library(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(io_error) => io_error,
            e @ Error::NotInitialized => io::Error::new(io::ErrorKind::NotConnected, e),
            e @ Error::UnsupportedAlgorithm(_) => io::Error::new(io::ErrorKind::Unsupported, e),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

/// Turn a raw status into `Error::InitializationFailed` when it is not success
pub fn init_check(status: ErrorCode) -> Result<()> {
    status
        .into_result()
        .map_err(|code| Error::InitializationFailed { code })
}

/// Turn a raw status into `Error::Library` when it is not success
pub fn library_check(status: ErrorCode) -> Result<()> {
    status.into_result().map_err(Error::Library)
}

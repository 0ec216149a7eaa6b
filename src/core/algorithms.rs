/*!
Algorithm identifiers understood by the library's digest, MAC, cipher, key
derivation and random interfaces.
*/

use std::fmt;

use crate::core::constants::{cipher, cipher_mode, kdf, mac, md, random};

/// Message digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    Md5,
    Sha1,
    Rmd160,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sha3_224,
    Sha3_256,
    Sha3_384,
    Sha3_512,
    Blake2b512,
}

impl Algorithm {
    pub const ALL: [Algorithm; 12] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Rmd160,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
        Algorithm::Sha3_224,
        Algorithm::Sha3_256,
        Algorithm::Sha3_384,
        Algorithm::Sha3_512,
        Algorithm::Blake2b512,
    ];

    /// Numeric identifier used by the library
    pub fn raw(&self) -> u32 {
        match self {
            Algorithm::Md5 => md::MD5,
            Algorithm::Sha1 => md::SHA1,
            Algorithm::Rmd160 => md::RMD160,
            Algorithm::Sha224 => md::SHA224,
            Algorithm::Sha256 => md::SHA256,
            Algorithm::Sha384 => md::SHA384,
            Algorithm::Sha512 => md::SHA512,
            Algorithm::Sha3_224 => md::SHA3_224,
            Algorithm::Sha3_256 => md::SHA3_256,
            Algorithm::Sha3_384 => md::SHA3_384,
            Algorithm::Sha3_512 => md::SHA3_512,
            Algorithm::Blake2b512 => md::BLAKE2B_512,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Algorithm> {
        Self::ALL.iter().copied().find(|a| a.raw() == raw)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Sha1 => "SHA1",
            Algorithm::Rmd160 => "RIPEMD160",
            Algorithm::Sha224 => "SHA224",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha384 => "SHA384",
            Algorithm::Sha512 => "SHA512",
            Algorithm::Sha3_224 => "SHA3-224",
            Algorithm::Sha3_256 => "SHA3-256",
            Algorithm::Sha3_384 => "SHA3-384",
            Algorithm::Sha3_512 => "SHA3-512",
            Algorithm::Blake2b512 => "BLAKE2B_512",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<Algorithm> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }

    /// Output length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha1 | Algorithm::Rmd160 => 20,
            Algorithm::Sha224 | Algorithm::Sha3_224 => 28,
            Algorithm::Sha256 | Algorithm::Sha3_256 => 32,
            Algorithm::Sha384 | Algorithm::Sha3_384 => 48,
            Algorithm::Sha512 | Algorithm::Sha3_512 | Algorithm::Blake2b512 => 64,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// MAC algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum MacAlgorithm {
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl MacAlgorithm {
    pub const ALL: [MacAlgorithm; 5] = [
        MacAlgorithm::HmacSha1,
        MacAlgorithm::HmacSha224,
        MacAlgorithm::HmacSha256,
        MacAlgorithm::HmacSha384,
        MacAlgorithm::HmacSha512,
    ];

    pub fn raw(&self) -> u32 {
        match self {
            MacAlgorithm::HmacSha1 => mac::HMAC_SHA1,
            MacAlgorithm::HmacSha224 => mac::HMAC_SHA224,
            MacAlgorithm::HmacSha256 => mac::HMAC_SHA256,
            MacAlgorithm::HmacSha384 => mac::HMAC_SHA384,
            MacAlgorithm::HmacSha512 => mac::HMAC_SHA512,
        }
    }

    pub fn from_raw(raw: u32) -> Option<MacAlgorithm> {
        Self::ALL.iter().copied().find(|a| a.raw() == raw)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MacAlgorithm::HmacSha1 => "HMAC_SHA1",
            MacAlgorithm::HmacSha224 => "HMAC_SHA224",
            MacAlgorithm::HmacSha256 => "HMAC_SHA256",
            MacAlgorithm::HmacSha384 => "HMAC_SHA384",
            MacAlgorithm::HmacSha512 => "HMAC_SHA512",
        }
    }

    pub fn from_name(name: &str) -> Option<MacAlgorithm> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }

    /// Underlying digest
    pub fn digest(&self) -> Algorithm {
        match self {
            MacAlgorithm::HmacSha1 => Algorithm::Sha1,
            MacAlgorithm::HmacSha224 => Algorithm::Sha224,
            MacAlgorithm::HmacSha256 => Algorithm::Sha256,
            MacAlgorithm::HmacSha384 => Algorithm::Sha384,
            MacAlgorithm::HmacSha512 => Algorithm::Sha512,
        }
    }

    pub fn mac_len(&self) -> usize {
        self.digest().digest_len()
    }
}

impl fmt::Display for MacAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Authenticated ciphers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum CipherAlgorithm {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl CipherAlgorithm {
    pub const ALL: [CipherAlgorithm; 3] = [
        CipherAlgorithm::Aes128Gcm,
        CipherAlgorithm::Aes256Gcm,
        CipherAlgorithm::ChaCha20Poly1305,
    ];

    /// Library cipher identifier
    pub fn raw(&self) -> u32 {
        match self {
            CipherAlgorithm::Aes128Gcm => cipher::AES128,
            CipherAlgorithm::Aes256Gcm => cipher::AES256,
            CipherAlgorithm::ChaCha20Poly1305 => cipher::CHACHA20,
        }
    }

    /// Library mode identifier paired with `raw`
    pub fn raw_mode(&self) -> u32 {
        match self {
            CipherAlgorithm::Aes128Gcm | CipherAlgorithm::Aes256Gcm => cipher_mode::GCM,
            CipherAlgorithm::ChaCha20Poly1305 => cipher_mode::POLY1305,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CipherAlgorithm::Aes128Gcm => "AES128-GCM",
            CipherAlgorithm::Aes256Gcm => "AES256-GCM",
            CipherAlgorithm::ChaCha20Poly1305 => "CHACHA20-POLY1305",
        }
    }

    pub fn from_name(name: &str) -> Option<CipherAlgorithm> {
        Self::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }

    pub fn key_len(&self) -> usize {
        match self {
            CipherAlgorithm::Aes128Gcm => 16,
            CipherAlgorithm::Aes256Gcm | CipherAlgorithm::ChaCha20Poly1305 => 32,
        }
    }

    #[inline]
    pub fn nonce_len(&self) -> usize {
        12
    }

    #[inline]
    pub fn tag_len(&self) -> usize {
        16
    }
}

impl fmt::Display for CipherAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Key derivation functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum KdfAlgorithm {
    SimpleS2k,
    SaltedS2k,
    IteratedSaltedS2k,
    Pbkdf1,
    Pbkdf2,
    Scrypt,
    Hkdf,
}

impl KdfAlgorithm {
    pub fn raw(&self) -> u32 {
        match self {
            KdfAlgorithm::SimpleS2k => kdf::SIMPLE_S2K,
            KdfAlgorithm::SaltedS2k => kdf::SALTED_S2K,
            KdfAlgorithm::IteratedSaltedS2k => kdf::ITERSALTED_S2K,
            KdfAlgorithm::Pbkdf1 => kdf::PBKDF1,
            KdfAlgorithm::Pbkdf2 => kdf::PBKDF2,
            KdfAlgorithm::Scrypt => kdf::SCRYPT,
            KdfAlgorithm::Hkdf => kdf::HKDF,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KdfAlgorithm::SimpleS2k => "SIMPLE_S2K",
            KdfAlgorithm::SaltedS2k => "SALTED_S2K",
            KdfAlgorithm::IteratedSaltedS2k => "ITERSALTED_S2K",
            KdfAlgorithm::Pbkdf1 => "PBKDF1",
            KdfAlgorithm::Pbkdf2 => "PBKDF2",
            KdfAlgorithm::Scrypt => "SCRYPT",
            KdfAlgorithm::Hkdf => "HKDF",
        }
    }
}

impl fmt::Display for KdfAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of a key derivation.
///
/// `subalgo` is the digest for the S2K, PBKDF and HKDF families and the cost
/// parameter N for scrypt. `iterations` is the iteration count, or the
/// parallelization parameter p for scrypt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams<'a> {
    pub algorithm: KdfAlgorithm,
    pub subalgo: u32,
    pub iterations: u32,
    pub salt: Option<&'a [u8]>,
}

impl<'a> KdfParams<'a> {
    /// OpenPGP string-to-key; the variant follows from the salt and count
    pub fn s2k(digest: Algorithm, iterations: u32, salt: Option<&'a [u8]>) -> Self {
        let algorithm = match (iterations, salt.is_some()) {
            (n, true) if n != 0 => KdfAlgorithm::IteratedSaltedS2k,
            (_, true) => KdfAlgorithm::SaltedS2k,
            _ => KdfAlgorithm::SimpleS2k,
        };
        KdfParams { algorithm, subalgo: digest.raw(), iterations, salt }
    }

    pub fn pbkdf1(digest: Algorithm, iterations: u32, salt: &'a [u8]) -> Self {
        KdfParams {
            algorithm: KdfAlgorithm::Pbkdf1,
            subalgo: digest.raw(),
            iterations,
            salt: Some(salt),
        }
    }

    pub fn pbkdf2(digest: Algorithm, iterations: u32, salt: &'a [u8]) -> Self {
        KdfParams {
            algorithm: KdfAlgorithm::Pbkdf2,
            subalgo: digest.raw(),
            iterations,
            salt: Some(salt),
        }
    }

    pub fn scrypt(n: u32, p: u32, salt: &'a [u8]) -> Self {
        KdfParams {
            algorithm: KdfAlgorithm::Scrypt,
            subalgo: n,
            iterations: p,
            salt: Some(salt),
        }
    }

    /// HKDF extract-and-expand with an empty info string
    pub fn hkdf(digest: Algorithm, salt: Option<&'a [u8]>) -> Self {
        KdfParams {
            algorithm: KdfAlgorithm::Hkdf,
            subalgo: digest.raw(),
            iterations: 1,
            salt,
        }
    }

    /// Digest named by `subalgo`, if any
    pub fn digest(&self) -> Option<Algorithm> {
        Algorithm::from_raw(self.subalgo)
    }
}

/// Quality of random bytes requested from the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RandomLevel {
    Weak,
    #[default]
    Strong,
    VeryStrong,
}

impl RandomLevel {
    pub fn raw(&self) -> u32 {
        match self {
            RandomLevel::Weak => random::WEAK,
            RandomLevel::Strong => random::STRONG,
            RandomLevel::VeryStrong => random::VERY_STRONG,
        }
    }
}

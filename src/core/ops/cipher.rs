use std::fmt;

use crate::core::algorithms::CipherAlgorithm;
use crate::core::error::{Error, Result};
use crate::core::library::CipherContext;

/// Keyed authenticated cipher obtained from an initialized library.
///
/// Sealed messages carry the ciphertext followed by the authentication tag.
/// A nonce must never be reused with the same key.
pub struct Cipher {
    ctx: Box<dyn CipherContext>,
}

impl Cipher {
    pub(crate) fn from_context(ctx: Box<dyn CipherContext>) -> Self {
        Cipher { ctx }
    }

    #[inline]
    pub fn algorithm(&self) -> CipherAlgorithm {
        self.ctx.algorithm()
    }

    /// Encrypt `plaintext` and authenticate it together with `aad`
    pub fn encrypt(&mut self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        self.ctx.encrypt(nonce, aad, plaintext).map_err(Error::Library)
    }

    /// Verify and decrypt a sealed message
    pub fn decrypt(&mut self, nonce: &[u8], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        self.ctx.decrypt(nonce, aad, sealed).map_err(Error::Library)
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorCode;
    use crate::core::init::Registrar;
    use crate::core::library::SoftwareLibrary;

    #[test]
    fn test_seal_and_open() {
        let registrar = Registrar::new(SoftwareLibrary::new());
        let crypto = registrar.init_default().unwrap();

        let mut cipher = crypto
            .cipher(CipherAlgorithm::ChaCha20Poly1305, &[0x24u8; 32])
            .unwrap();
        let nonce = [1u8; 12];
        let sealed = cipher.encrypt(&nonce, b"", b"secret message").unwrap();
        assert_ne!(&sealed[..14], b"secret message");
        assert_eq!(cipher.decrypt(&nonce, b"", &sealed).unwrap(), b"secret message");

        // A different nonce does not open the message
        match cipher.decrypt(&[2u8; 12], b"", &sealed) {
            Err(Error::Library(code)) => assert_eq!(code.code(), ErrorCode::CHECKSUM),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unavailable_cipher() {
        let registrar = Registrar::new(SoftwareLibrary::new());
        let crypto = registrar.init_default().unwrap();
        match crypto.cipher(CipherAlgorithm::Aes128Gcm, &[0u8; 16]) {
            Err(Error::UnsupportedAlgorithm(name)) => assert_eq!(name, "AES128-GCM"),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}

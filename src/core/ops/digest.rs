use std::fmt;
use std::io::{self, Write};

use crate::core::algorithms::Algorithm;
use crate::core::error::{Error, Result};
use crate::core::library::DigestContext;

/// Streaming message digest obtained from an initialized library
pub struct MessageDigest {
    ctx: Box<dyn DigestContext>,
}

impl MessageDigest {
    pub(crate) fn from_context(ctx: Box<dyn DigestContext>) -> Self {
        MessageDigest { ctx }
    }

    #[inline]
    pub fn algorithm(&self) -> Algorithm {
        self.ctx.algorithm()
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.ctx.update(data).map_err(Error::Library)?;
        Ok(self)
    }

    /// Digest of everything written since creation or the last reset.
    /// The state is reset afterwards.
    #[inline]
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        self.ctx.finish().map_err(Error::Library)
    }

    #[inline]
    pub fn reset(&mut self) {
        self.ctx.reset();
    }
}

impl Write for MessageDigest {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf)?;
        Ok(buf.len())
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Debug for MessageDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDigest")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

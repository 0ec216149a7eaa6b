use std::fmt;
use std::io::{self, Write};

use crate::core::algorithms::MacAlgorithm;
use crate::core::error::{Error, Result};
use crate::core::library::MacContext;

/// Streaming MAC obtained from an initialized library
pub struct Mac {
    ctx: Box<dyn MacContext>,
}

impl Mac {
    pub(crate) fn from_context(ctx: Box<dyn MacContext>) -> Self {
        Mac { ctx }
    }

    #[inline]
    pub fn algorithm(&self) -> MacAlgorithm {
        self.ctx.algorithm()
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.ctx.update(data).map_err(Error::Library)?;
        Ok(self)
    }

    /// Tag over everything written since creation or the last reset.
    /// The key is kept; the message state is reset.
    #[inline]
    pub fn finish(&mut self) -> Result<Vec<u8>> {
        self.ctx.finish().map_err(Error::Library)
    }

    /// Compare the computed tag with `tag` in constant time
    pub fn verify(&mut self, tag: &[u8]) -> Result<bool> {
        Ok(constant_time_eq(&self.finish()?, tag))
    }

    #[inline]
    pub fn reset(&mut self) {
        self.ctx.reset();
    }
}

impl Write for Mac {
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

impl fmt::Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mac")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

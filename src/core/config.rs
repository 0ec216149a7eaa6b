/*!
Initialization configuration.

`InitConfig` is the declarative form of the options a caller would otherwise
set through [`crate::core::init::Initializer`]. It is applied once, inside the
one-time initialization guard.
*/

use crate::core::constants::{DEFAULT_SECMEM_SIZE, MIN_VERSION};
use crate::core::error::Result;
use crate::core::init::Initializer;

/// Secure memory policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum SecureMemory {
    /// No secure memory pool
    Disabled,
    /// Fixed pool of the given size in bytes
    Fixed(usize),
    /// Pool that grows in steps of the given size
    AutoExpand(usize),
}

impl Default for SecureMemory {
    fn default() -> Self {
        SecureMemory::Disabled
    }
}

/// Library initialization options
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-support", serde(default))]
pub struct InitConfig {
    /// Force FIPS mode before the library initializes
    pub fips: bool,
    /// Secure memory policy
    pub secure_memory: SecureMemory,
    /// Use the faster, weaker random seeding (testing only)
    pub quick_random: bool,
    /// Keep the random pool in secure memory
    pub secure_rndpool: bool,
    /// Run library self tests before finishing initialization
    pub self_test: bool,
    /// Minimum accepted library version
    pub min_version: String,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            fips: false,
            secure_memory: SecureMemory::Disabled,
            quick_random: false,
            secure_rndpool: true,
            self_test: false,
            min_version: MIN_VERSION.to_string(),
        }
    }
}

impl InitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fips(mut self, fips: bool) -> Self {
        self.fips = fips;
        self
    }

    pub fn with_secure_memory(mut self, secure_memory: SecureMemory) -> Self {
        self.secure_memory = secure_memory;
        self
    }

    /// Enable a fixed secure memory pool of the default size
    pub fn with_default_secure_memory(self) -> Self {
        self.with_secure_memory(SecureMemory::Fixed(DEFAULT_SECMEM_SIZE))
    }

    pub fn with_quick_random(mut self, quick_random: bool) -> Self {
        self.quick_random = quick_random;
        self
    }

    pub fn with_secure_rndpool(mut self, secure_rndpool: bool) -> Self {
        self.secure_rndpool = secure_rndpool;
        self
    }

    pub fn with_self_test(mut self, self_test: bool) -> Self {
        self.self_test = self_test;
        self
    }

    pub fn with_min_version<S: Into<String>>(mut self, version: S) -> Self {
        self.min_version = version.into();
        self
    }

    /// Apply every option through an initializer
    pub fn apply(&self, init: &mut Initializer<'_>) -> Result<()> {
        if !init.check_version(&self.min_version) {
            return Err(crate::core::error::Error::VersionMismatch {
                required: self.min_version.clone(),
            });
        }
        match self.secure_memory {
            SecureMemory::Disabled => {
                init.disable_secmem();
            }
            SecureMemory::Fixed(size) => {
                init.enable_secmem(size)?;
            }
            SecureMemory::AutoExpand(size) => {
                init.enable_secmem(size)?.enable_auto_expand_secmem(size)?;
            }
        }
        if self.quick_random {
            init.enable_quick_random();
        }
        if self.secure_rndpool {
            init.enable_secure_rndpool();
        }
        if self.self_test {
            init.run_self_tests()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = InitConfig::default();
        assert!(!config.fips);
        assert_eq!(config.secure_memory, SecureMemory::Disabled);
        assert!(config.secure_rndpool);
        assert_eq!(config.min_version, MIN_VERSION);
    }

    #[test]
    fn test_builder() {
        let config = InitConfig::new()
            .with_fips(true)
            .with_default_secure_memory()
            .with_self_test(true)
            .with_min_version("1.8");

        assert!(config.fips);
        assert_eq!(config.secure_memory, SecureMemory::Fixed(DEFAULT_SECMEM_SIZE));
        assert!(config.self_test);
        assert_eq!(config.min_version, "1.8");
    }
}

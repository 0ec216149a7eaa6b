//! Handles for streaming operations on an initialized library.

pub mod cipher;
pub mod digest;
pub mod mac;

pub use cipher::Cipher;
pub use digest::MessageDigest;
pub use mac::Mac;

/*!
Foreign Function Interface (FFI) module.

This module exports the callback table accessor and a small initialization
and hashing API to C callers.
*/

mod c_api;

pub use c_api::*;

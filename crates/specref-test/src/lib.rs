//! Test harnesses for the specref resolver.
//!
//! Provides `DocumentServer` for serving spec documents over real HTTP,
//! plus CLI regression tests and end-to-end resolution tests.

#[cfg(test)]
mod cli;
#[cfg(test)]
mod resolve;
pub mod server;

pub use server::{fixtures, resolve_url, DocumentServer, TestError};

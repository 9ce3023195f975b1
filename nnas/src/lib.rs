#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Native library for the Nintendo Network account server client.
//!
//! Re-exports [`nnas_core`] for Rust callers and adds a flat C ABI in [`ffi`], declared
//! in `include/nnas.h`.

pub use nnas_core::*;

pub mod ffi;

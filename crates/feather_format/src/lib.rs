//! Encoding and decoding of Feather column data.
//!
//! Covers the type catalog relating logical column types to physical layouts
//! and host types, the bridge between category columns and host enums,
//! conversion of host values on write (widening) and decoded cells on read
//! (casting), and the multiplexer that lets several column writers share one
//! output sink.
pub mod bitmap;
pub mod catalog;
pub mod category;
pub mod column;
pub mod compute;
pub mod datatype;
pub mod decode;
pub mod encode;
pub mod format;
pub mod host;
pub mod io;
pub mod metadata;
pub mod physical;
pub mod scalar;

#[cfg(test)]
mod testutil;

pub use feather_error::{ErrorKind, FeatherError, Result};

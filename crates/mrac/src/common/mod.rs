//! Common infrastructure shared across the compiler

mod error;
mod hex;

pub use error::{BuildError, BuildResult};
pub use hex::{hexdump, parse_hex_stream, parse_int};

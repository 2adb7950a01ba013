//! Chunk codecs
//!
//! Stores ship samples as opaque chunks; the only encoding in use is the
//! Gorilla-style XOR encoding implemented in [`xor`].

pub mod bit_stream;
pub mod xor;

pub use xor::{XorChunk, XorIterator};

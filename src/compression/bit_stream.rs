//! Bit-level I/O primitives for the XOR chunk codec
//!
//! Bits are stored MSB-first (most significant bit first) within each byte:
//! ```text
//! Byte: [bit0 bit1 bit2 bit3 bit4 bit5 bit6 bit7]
//!        MSB                                    LSB
//! ```
//!
//! The reader owns its payload as [`Bytes`] so that a decoding iterator can
//! outlive the buffer it was created from.
//!
//! # Example
//! ```
//! use kuba_querier::compression::bit_stream::{BitReader, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bit(true);
//! writer.write_bits(0b1010, 4);
//! let buffer = writer.finish().unwrap();
//!
//! let mut reader = BitReader::new(buffer.into());
//! assert!(reader.read_bit().unwrap());
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1010);
//! ```

use crate::error::CompressionError;
use bytes::Bytes;

/// Upper bound on an encoded chunk
const MAX_BUFFER_SIZE: usize = 100_000_000; // 100MB

/// Writer for bit-level operations
///
/// Accumulates bits into bytes, MSB-first. Once the buffer limit is hit the
/// writer stops accepting bits and [`BitWriter::finish`] reports the overflow.
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    /// Fully completed bytes
    buffer: Vec<u8>,
    /// Byte currently being assembled
    current_byte: u8,
    /// Number of bits used in `current_byte` (0-7)
    bit_position: u8,
    /// Set when the buffer limit was exceeded
    overflow: bool,
}

impl BitWriter {
    /// Create an empty bit writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a single bit
    pub fn write_bit(&mut self, bit: bool) {
        if self.overflow {
            return;
        }
        if bit {
            self.current_byte |= 1 << (7 - self.bit_position);
        }
        self.bit_position += 1;

        if self.bit_position == 8 {
            if self.buffer.len() >= MAX_BUFFER_SIZE {
                self.overflow = true;
                return;
            }
            self.buffer.push(self.current_byte);
            self.current_byte = 0;
            self.bit_position = 0;
        }
    }

    /// Write the low `num_bits` bits of `value`, MSB-first
    ///
    /// `num_bits` above 64 is ignored.
    pub fn write_bits(&mut self, value: u64, num_bits: u8) {
        if num_bits > 64 {
            return;
        }
        for i in (0..num_bits).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    /// Number of bytes the finished buffer will hold
    pub fn len(&self) -> usize {
        self.buffer.len() + usize::from(self.bit_position > 0)
    }

    /// Check whether nothing has been written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes written so far, with the partial byte zero-padded
    pub fn snapshot(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        out.extend_from_slice(&self.buffer);
        if self.bit_position > 0 {
            out.push(self.current_byte);
        }
        out
    }

    /// Flush the partial byte and return the buffer
    ///
    /// # Errors
    /// `ResourceLimit` if the writer overflowed its size limit.
    pub fn finish(self) -> Result<Vec<u8>, CompressionError> {
        if self.overflow {
            return Err(CompressionError::ResourceLimit(format!(
                "bit writer exceeded maximum size of {} bytes",
                MAX_BUFFER_SIZE
            )));
        }
        Ok(self.snapshot())
    }
}

/// Reader for bit-level operations
///
/// Reads bits sequentially, MSB-first. Reading past the end of the payload
/// returns `CorruptedData`, which indicates a truncated chunk.
#[derive(Debug, Clone)]
pub struct BitReader {
    /// Source payload
    buffer: Bytes,
    /// Current byte index
    byte_position: usize,
    /// Current bit within the byte (0-7)
    bit_position: u8,
}

impl BitReader {
    /// Create a reader positioned at the first bit of `buffer`
    pub fn new(buffer: Bytes) -> Self {
        Self {
            buffer,
            byte_position: 0,
            bit_position: 0,
        }
    }

    /// Read a single bit
    pub fn read_bit(&mut self) -> Result<bool, CompressionError> {
        let byte = *self.buffer.get(self.byte_position).ok_or_else(|| {
            CompressionError::CorruptedData("unexpected end of chunk".to_string())
        })?;

        let bit = (byte >> (7 - self.bit_position)) & 1 == 1;
        self.bit_position += 1;
        if self.bit_position == 8 {
            self.byte_position += 1;
            self.bit_position = 0;
        }
        Ok(bit)
    }

    /// Read `num_bits` bits into the low bits of a u64
    ///
    /// Reading 0 bits returns 0 without advancing.
    pub fn read_bits(&mut self, num_bits: u8) -> Result<u64, CompressionError> {
        if num_bits > 64 {
            return Err(CompressionError::InvalidData(format!(
                "cannot read more than 64 bits (requested: {})",
                num_bits
            )));
        }
        let mut value: u64 = 0;
        for _ in 0..num_bits {
            value = (value << 1) | u64::from(self.read_bit()?);
        }
        Ok(value)
    }

    /// Current position as (byte index, bit within byte)
    pub fn position(&self) -> (usize, u8) {
        (self.byte_position, self.bit_position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader(writer: BitWriter) -> BitReader {
        BitReader::new(Bytes::from(writer.finish().unwrap()))
    }

    #[test]
    fn test_write_read_single_bits() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bit(false);
        writer.write_bit(true);

        let mut r = reader(writer);
        assert!(r.read_bit().unwrap());
        assert!(!r.read_bit().unwrap());
        assert!(r.read_bit().unwrap());
    }

    #[test]
    fn test_cross_byte_boundaries() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b101, 3);
        writer.write_bits(0x123456789ABCDEF0, 64);
        writer.write_bits(0b11, 2);

        let mut r = reader(writer);
        assert_eq!(r.read_bits(3).unwrap(), 0b101);
        assert_eq!(r.read_bits(64).unwrap(), 0x123456789ABCDEF0);
        assert_eq!(r.read_bits(2).unwrap(), 0b11);
        assert_eq!(r.position(), (8, 5));
    }

    #[test]
    fn test_partial_byte_is_padded() {
        let mut writer = BitWriter::new();
        writer.write_bits(0b1010, 4);
        assert_eq!(writer.len(), 1);
        assert_eq!(writer.finish().unwrap(), vec![0b1010_0000]);
    }

    #[test]
    fn test_read_past_end() {
        let mut r = BitReader::new(Bytes::from_static(&[0xFF]));
        assert_eq!(r.read_bits(8).unwrap(), 0xFF);
        assert!(matches!(
            r.read_bit(),
            Err(CompressionError::CorruptedData(_))
        ));
    }

    #[test]
    fn test_zero_bits_does_not_advance() {
        let mut r = BitReader::new(Bytes::from_static(&[0x80]));
        assert_eq!(r.read_bits(0).unwrap(), 0);
        assert_eq!(r.position(), (0, 0));
        assert!(r.read_bit().unwrap());
    }
}

//! XOR chunk encoding (Gorilla)
//!
//! Samples are encoded one after another so that a chunk can be decoded
//! lazily, sample by sample:
//!
//! ```text
//! [count: u32 BE][t0: 64][v0: 64][delta1: 64][v1: xor] ([dod_n][v_n: xor])*
//! ```
//!
//! ## Delta-of-delta timestamps
//!
//! - `0`: dod == 0
//! - `'10' + 7 bits`: dod in [-63, 63]
//! - `'110' + 9 bits`: dod in [-255, 255]
//! - `'1110' + 12 bits`: dod in [-2047, 2047]
//! - `'1111' + 64 bits`: any other dod
//!
//! ## XOR values
//!
//! - `0`: value unchanged
//! - `'10' + meaningful bits`: XOR fits in the previous leading/trailing window
//! - `'11' + 5-bit leading + 6-bit length + meaningful bits`: new window
//!
//! A 6-bit length of 0 stands for 64 meaningful bits; a changed value always
//! has at least one.
//!
//! # Example
//!
//! ```rust
//! use kuba_querier::compression::{XorChunk, XorIterator};
//!
//! let mut chunk = XorChunk::new();
//! chunk.append(1000, 1.5).unwrap();
//! chunk.append(1010, 1.5).unwrap();
//! chunk.append(1020, 2.0).unwrap();
//!
//! let mut it = XorIterator::new(chunk.bytes()).unwrap();
//! let mut got = Vec::new();
//! while let Some(s) = it.next_sample().unwrap() {
//!     got.push((s.timestamp, s.value));
//! }
//! assert_eq!(got, vec![(1000, 1.5), (1010, 1.5), (1020, 2.0)]);
//! ```

use super::bit_stream::{BitReader, BitWriter};
use crate::error::CompressionError;
use crate::types::Sample;
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the sample count header in bytes
const HEADER_SIZE: usize = 4;

/// Maximum number of samples accepted in one chunk
const MAX_SAMPLES_PER_CHUNK: u32 = 10_000_000;

/// Largest leading-zero count representable in the 5-bit field
const MAX_LEADING: u32 = 31;

/// XOR-encoded chunk under construction
#[derive(Debug, Clone, Default)]
pub struct XorChunk {
    body: BitWriter,
    count: u32,
    prev_timestamp: i64,
    prev_delta: i64,
    prev_value: u64,
    /// Leading/trailing window of the last written XOR, `None` before the first
    window: Option<(u32, u32)>,
}

impl XorChunk {
    /// Create an empty chunk
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of samples appended so far
    pub fn num_samples(&self) -> usize {
        self.count as usize
    }

    /// Append a sample
    ///
    /// # Errors
    /// `InvalidData` if `timestamp` does not strictly increase, or the chunk is full.
    pub fn append(&mut self, timestamp: i64, value: f64) -> Result<(), CompressionError> {
        if self.count >= MAX_SAMPLES_PER_CHUNK {
            return Err(CompressionError::InvalidData(format!(
                "chunk already holds the maximum of {} samples",
                MAX_SAMPLES_PER_CHUNK
            )));
        }
        if self.count > 0 && timestamp <= self.prev_timestamp {
            return Err(CompressionError::InvalidData(format!(
                "timestamps must be strictly increasing: {} <= previous {}",
                timestamp, self.prev_timestamp
            )));
        }

        let bits = value.to_bits();
        match self.count {
            0 => {
                self.body.write_bits(timestamp as u64, 64);
                self.body.write_bits(bits, 64);
            }
            1 => {
                let delta = timestamp.wrapping_sub(self.prev_timestamp);
                self.body.write_bits(delta as u64, 64);
                self.write_value(bits);
                self.prev_delta = delta;
            }
            _ => {
                let delta = timestamp.wrapping_sub(self.prev_timestamp);
                self.write_dod(delta.wrapping_sub(self.prev_delta));
                self.write_value(bits);
                self.prev_delta = delta;
            }
        }

        self.prev_timestamp = timestamp;
        self.prev_value = bits;
        self.count += 1;
        Ok(())
    }

    /// Encoded payload: count header followed by the bit stream
    pub fn bytes(&self) -> Bytes {
        let body = self.body.snapshot();
        let mut out = BytesMut::with_capacity(HEADER_SIZE + body.len());
        out.put_u32(self.count);
        out.put_slice(&body);
        out.freeze()
    }

    fn write_dod(&mut self, dod: i64) {
        if dod == 0 {
            self.body.write_bit(false);
        } else if (-63..64).contains(&dod) {
            self.body.write_bits(0b10, 2);
            self.body.write_bits(((dod + 63) as u64) & 0x7F, 7);
        } else if (-255..256).contains(&dod) {
            self.body.write_bits(0b110, 3);
            self.body.write_bits(((dod + 255) as u64) & 0x1FF, 9);
        } else if (-2047..2048).contains(&dod) {
            self.body.write_bits(0b1110, 4);
            self.body.write_bits(((dod + 2047) as u64) & 0xFFF, 12);
        } else {
            self.body.write_bits(0b1111, 4);
            self.body.write_bits(dod as u64, 64);
        }
    }

    fn write_value(&mut self, bits: u64) {
        let xor = self.prev_value ^ bits;
        if xor == 0 {
            self.body.write_bit(false);
            return;
        }
        self.body.write_bit(true);

        let leading = xor.leading_zeros().min(MAX_LEADING);
        let trailing = xor.trailing_zeros();

        match self.window {
            Some((prev_leading, prev_trailing))
                if leading >= prev_leading && trailing >= prev_trailing =>
            {
                self.body.write_bit(false);
                let meaningful = 64 - prev_leading - prev_trailing;
                self.body.write_bits(xor >> prev_trailing, meaningful as u8);
            }
            _ => {
                self.body.write_bit(true);
                let meaningful = 64 - leading - trailing;
                self.body.write_bits(u64::from(leading), 5);
                // 64 does not fit in 6 bits and is written as 0
                self.body.write_bits(u64::from(meaningful & 0x3F), 6);
                self.body.write_bits(xor >> trailing, meaningful as u8);
                self.window = Some((leading, trailing));
            }
        }
    }
}

/// Lazy decoder over an XOR chunk payload
#[derive(Debug, Clone)]
pub struct XorIterator {
    reader: BitReader,
    total: u32,
    read: u32,
    timestamp: i64,
    delta: i64,
    value: u64,
    window: Option<(u32, u32)>,
    failed: bool,
}

impl XorIterator {
    /// Prepare to decode `payload`
    ///
    /// An empty payload decodes as a chunk without samples.
    ///
    /// # Errors
    /// `CorruptedData` if the header is truncated, `InvalidData` if the
    /// declared sample count is implausible.
    pub fn new(payload: Bytes) -> Result<Self, CompressionError> {
        if payload.is_empty() {
            return Ok(Self::with_count(BitReader::new(payload), 0));
        }
        if payload.len() < HEADER_SIZE {
            return Err(CompressionError::CorruptedData(format!(
                "chunk header needs {} bytes, got {}",
                HEADER_SIZE,
                payload.len()
            )));
        }
        let total = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        if total > MAX_SAMPLES_PER_CHUNK {
            return Err(CompressionError::InvalidData(format!(
                "sample count {} exceeds maximum allowed {}",
                total, MAX_SAMPLES_PER_CHUNK
            )));
        }
        Ok(Self::with_count(
            BitReader::new(payload.slice(HEADER_SIZE..)),
            total,
        ))
    }

    fn with_count(reader: BitReader, total: u32) -> Self {
        Self {
            reader,
            total,
            read: 0,
            timestamp: 0,
            delta: 0,
            value: 0,
            window: None,
            failed: false,
        }
    }

    /// Number of samples declared by the chunk header
    pub fn len(&self) -> usize {
        self.total as usize
    }

    /// Check whether the chunk holds no samples
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Decode the next sample, `Ok(None)` once the chunk is exhausted
    ///
    /// After a decode error the iterator is exhausted.
    pub fn next_sample(&mut self) -> Result<Option<Sample>, CompressionError> {
        if self.failed || self.read >= self.total {
            return Ok(None);
        }
        let decoded = self.decode_next();
        if decoded.is_err() {
            self.failed = true;
        }
        decoded
    }

    fn decode_next(&mut self) -> Result<Option<Sample>, CompressionError> {

        match self.read {
            0 => {
                self.timestamp = self.reader.read_bits(64)? as i64;
                self.value = self.reader.read_bits(64)?;
            }
            1 => {
                self.delta = self.reader.read_bits(64)? as i64;
                self.timestamp = self.timestamp.wrapping_add(self.delta);
                self.read_value()?;
            }
            _ => {
                let dod = self.read_dod()?;
                self.delta = self.delta.wrapping_add(dod);
                self.timestamp = self.timestamp.wrapping_add(self.delta);
                self.read_value()?;
            }
        }

        self.read += 1;
        Ok(Some(Sample::new(self.timestamp, f64::from_bits(self.value))))
    }

    fn read_dod(&mut self) -> Result<i64, CompressionError> {
        if !self.reader.read_bit()? {
            return Ok(0);
        }
        if !self.reader.read_bit()? {
            return Ok(self.reader.read_bits(7)? as i64 - 63);
        }
        if !self.reader.read_bit()? {
            return Ok(self.reader.read_bits(9)? as i64 - 255);
        }
        if !self.reader.read_bit()? {
            return Ok(self.reader.read_bits(12)? as i64 - 2047);
        }
        Ok(self.reader.read_bits(64)? as i64)
    }

    fn read_value(&mut self) -> Result<(), CompressionError> {
        if !self.reader.read_bit()? {
            return Ok(());
        }

        let xor = if !self.reader.read_bit()? {
            let (leading, trailing) = self.window.ok_or_else(|| {
                CompressionError::CorruptedData(
                    "value reuses a window before one was declared".to_string(),
                )
            })?;
            let meaningful = 64 - leading - trailing;
            self.reader.read_bits(meaningful as u8)? << trailing
        } else {
            let leading = self.reader.read_bits(5)? as u32;
            let meaningful = match self.reader.read_bits(6)? as u32 {
                0 => 64,
                n => n,
            };
            if leading + meaningful > 64 {
                return Err(CompressionError::CorruptedData(format!(
                    "invalid xor window: {} leading + {} meaningful bits",
                    leading, meaningful
                )));
            }
            let trailing = 64 - leading - meaningful;
            self.window = Some((leading, trailing));
            self.reader.read_bits(meaningful as u8)? << trailing
        };

        self.value ^= xor;
        Ok(())
    }
}

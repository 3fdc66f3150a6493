// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::io::Write;

use thiserror::Error;

/// Length of the `0x000001` prefix shared by every start code.
pub const START_CODE_PREFIX_LENGTH: usize = 3;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReadBitsError {
    #[error("more than 32 ({0}) bits were requested")]
    TooManyBitsRequested(usize),
    #[error("reader ran out of bits")]
    InsufficientBits,
}

/// A MSB-first bit reader over a byte span.
///
/// MPEG-2 headers carry no emulation prevention bytes, so unlike the H.26x readers this one is a
/// plain cursor. Running out of data is reported as [`ReadBitsError::InsufficientBits`], which
/// callers use to decide whether to retry with a larger span.
#[derive(Clone, Debug)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Position of the next unread bit.
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Reads up to 32 bits from the stream.
    pub fn read_bits<U: TryFrom<u32>>(&mut self, num_bits: usize) -> Result<U, ReadBitsError> {
        if num_bits > 32 {
            return Err(ReadBitsError::TooManyBitsRequested(num_bits));
        }
        if num_bits > self.num_bits_left() {
            return Err(ReadBitsError::InsufficientBits);
        }

        let mut out = 0u64;
        let mut bits_left = num_bits;
        while bits_left > 0 {
            let byte = self.data[self.position / 8];
            let available = 8 - self.position % 8;
            let take = available.min(bits_left);
            let shift = available - take;
            let chunk = (byte >> shift) & ((1u16 << take) - 1) as u8;

            out = (out << take) | chunk as u64;
            bits_left -= take;
            self.position += take;
        }

        // Values narrower than the target type always fit, wider ones are a caller bug.
        U::try_from(out as u32).map_err(|_| ReadBitsError::TooManyBitsRequested(num_bits))
    }

    /// Reads a single bit from the stream.
    pub fn read_bit(&mut self) -> Result<bool, ReadBitsError> {
        Ok(self.read_bits::<u32>(1)? == 1)
    }

    pub fn skip_bits(&mut self, num_bits: usize) -> Result<(), ReadBitsError> {
        if num_bits > self.num_bits_left() {
            return Err(ReadBitsError::InsufficientBits);
        }
        self.position += num_bits;
        Ok(())
    }

    /// Rewinds the reader to the first bit.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Returns the position of this reader in bits.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn num_bits_left(&self) -> usize {
        self.data.len() * 8 - self.position
    }
}

/// Returns the offset of the first `0x000001` prefix at or after `from`.
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < START_CODE_PREFIX_LENGTH {
        return None;
    }

    (from..=data.len() - START_CODE_PREFIX_LENGTH).find(|&i| is_start_code(&data[i..]))
}

/// Whether `data` begins with a start code prefix.
pub fn is_start_code(data: &[u8]) -> bool {
    data.len() >= START_CODE_PREFIX_LENGTH && data[0] == 0 && data[1] == 0 && data[2] == 1
}

#[derive(Debug, Error)]
pub enum BitWriterError {
    #[error("invalid bit count")]
    InvalidBitCount,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type BitWriterResult<T> = std::result::Result<T, BitWriterError>;

/// MSB-first bit writer, the counterpart of [`BitReader`].
pub struct BitWriter<W: Write> {
    out: W,
    nth_bit: u8,
    curr_byte: u8,
}

impl<W: Write> BitWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            out: writer,
            curr_byte: 0,
            nth_bit: 0,
        }
    }

    /// Writes fixed bit size integer (up to 32 bit)
    pub fn write_f<T: Into<u32>>(&mut self, bits: usize, value: T) -> BitWriterResult<usize> {
        let value = value.into();

        if bits > 32 {
            return Err(BitWriterError::InvalidBitCount);
        }

        for bit in (0..bits).rev() {
            self.write_bit((value >> bit) & 1 == 1)?;
        }

        Ok(bits)
    }

    pub fn write_bit(&mut self, bit: bool) -> BitWriterResult<()> {
        self.curr_byte |= (bit as u8) << (7u8 - self.nth_bit);
        self.nth_bit += 1;

        if self.nth_bit == 8 {
            self.out.write_all(&[self.curr_byte])?;
            self.nth_bit = 0;
            self.curr_byte = 0;
        }

        Ok(())
    }

    /// Writes a start code, padding the current byte with zeroes first.
    pub fn write_start_code(&mut self, code: u8) -> BitWriterResult<()> {
        self.flush()?;
        self.out.write_all(&[0x00, 0x00, 0x01, code])?;
        Ok(())
    }

    /// Writes raw bytes after padding the current byte with zeroes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> BitWriterResult<()> {
        self.flush()?;
        self.out.write_all(bytes)?;
        Ok(())
    }

    /// Immediately outputs any cached bits to [`std::io::Write`]
    pub fn flush(&mut self) -> BitWriterResult<()> {
        if self.nth_bit != 0 {
            self.out.write_all(&[self.curr_byte])?;
            self.nth_bit = 0;
            self.curr_byte = 0;
        }

        self.out.flush()?;
        Ok(())
    }

    /// Returns `true` if ['Self`] hold data that wasn't written to [`std::io::Write`]
    pub fn has_data_pending(&self) -> bool {
        self.nth_bit != 0
    }
}

impl<W: Write> Drop for BitWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::error!("Unable to flush bits {e:?}");
        }
    }
}

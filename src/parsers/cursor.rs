//! Bounds-checked reads over an immutable byte buffer.
//!
//! EDF headers are fixed-width ASCII fields padded with spaces, and data
//! records are little-endian 16-bit integers. Every read here checks the
//! buffer length first and reports the offset on failure.

use std::str::FromStr;

use super::types::{DecodeError, Result};

/// Read-only view over a recording buffer
#[derive(Clone, Copy, Debug)]
pub struct BinaryCursor<'a> {
    data: &'a [u8],
}

impl<'a> BinaryCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(DecodeError::Truncated {
            offset,
            needed: len,
            available: 0,
        })?;
        self.data.get(offset..end).ok_or(DecodeError::Truncated {
            offset,
            needed: len,
            available: self.data.len().saturating_sub(offset),
        })
    }

    /// Read a fixed-width ASCII field, trimmed of spaces and NUL padding.
    /// Bytes outside printable ASCII are replaced rather than rejected.
    pub fn read_ascii(&self, offset: usize, width: usize) -> Result<String> {
        let bytes = self.slice(offset, width)?;
        let text: String = bytes
            .iter()
            .map(|&b| {
                if b.is_ascii() && !b.is_ascii_control() {
                    b as char
                } else if b == 0 {
                    ' '
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })
            .collect();
        Ok(text.trim().to_string())
    }

    /// Read a fixed-width ASCII field and parse it strictly.
    ///
    /// An empty or non-numeric field is a [`DecodeError::Field`] naming
    /// `field` and the field offset; it never silently becomes zero.
    pub fn read_number<T: FromStr>(
        &self,
        offset: usize,
        width: usize,
        field: &'static str,
    ) -> Result<T> {
        let text = self.read_ascii(offset, width)?;
        // EDF writers commonly emit "+100" for positive values
        let digits = text.strip_prefix('+').unwrap_or(&text);
        digits.parse::<T>().map_err(|_| DecodeError::Field {
            field,
            offset,
            value: text.clone(),
        })
    }

    /// Read a little-endian signed 16-bit sample
    #[inline]
    pub fn read_i16_le(&self, offset: usize) -> Result<i16> {
        let bytes = self.slice(offset, 2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

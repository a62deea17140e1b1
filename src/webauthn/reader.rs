//! Cursor over a borrowed byte slice
//!
//! Every read either returns the requested bytes and advances, or fails
//! without moving the cursor.

/// Not enough bytes remained for a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insufficient {
    pub needed: usize,
    pub remaining: usize,
}

/// Forward-only reader over authenticator data
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read exactly `len` bytes
    ///
    /// # Errors
    /// Returns `Insufficient` if fewer than `len` bytes remain.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], Insufficient> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(Insufficient {
                needed: len,
                remaining,
            });
        }
        let slice = &self.data[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Read a fixed-size array
    ///
    /// # Errors
    /// Returns `Insufficient` if fewer than `N` bytes remain.
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N], Insufficient> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// # Errors
    /// Returns `Insufficient` if no byte remains.
    pub fn read_u8(&mut self) -> Result<u8, Insufficient> {
        Ok(self.take_array::<1>()?[0])
    }

    /// # Errors
    /// Returns `Insufficient` if fewer than 2 bytes remain.
    pub fn read_u16_be(&mut self) -> Result<u16, Insufficient> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    /// # Errors
    /// Returns `Insufficient` if fewer than 4 bytes remain.
    pub fn read_u32_be(&mut self) -> Result<u32, Insufficient> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// Bytes not yet consumed, without advancing
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    /// Skip `len` bytes that were consumed by an external decoder
    ///
    /// # Errors
    /// Returns `Insufficient` if fewer than `len` bytes remain.
    pub fn advance(&mut self, len: usize) -> Result<(), Insufficient> {
        self.take(len).map(|_| ())
    }
}

use bitvec::prelude::*;

/// A run of allocation bits living in place inside the image.
///
/// Bit `i` is bit `i % 8` (least significant first) of byte `i / 8`,
/// a set bit marks the unit as in use.
#[derive(Debug)]
pub struct Bitmap<'a> {
    bytes: &'a mut [u8],
    len: usize,
}

impl<'a> Bitmap<'a> {
    /// wrap `bytes` as a bitmap of `len` bits
    pub fn new(bytes: &'a mut [u8], len: usize) -> Self {
        assert!(bytes.len() * 8 >= len, "bitmap of {len} bits needs more bytes");
        Self { bytes, len }
    }

    /// number of units tracked
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// check if unit `i` is in use
    pub fn is_set(&self, i: usize) -> bool {
        i < self.len && self.bytes.view_bits::<Lsb0>()[i]
    }

    /// calculate the number of free units
    pub fn count_free(&self) -> usize {
        self.bytes.view_bits::<Lsb0>()[..self.len].count_zeros()
    }

    /// reserve the lowest free unit
    /// # Return
    /// the index of the reserved unit, `None` if every unit is in use
    pub fn reserve(&mut self) -> Option<u32> {
        let index = self
            .bytes
            .iter()
            .enumerate()
            // skip full bytes whole
            .find(|(_, byte)| **byte != u8::MAX)
            .and_then(|(i, byte)| Some(i * 8 + byte.view_bits::<Lsb0>().first_zero()?))
            // the first clear bit may lie past the end of the bitmap
            .filter(|index| *index < self.len)?;
        self.bytes.view_bits_mut::<Lsb0>().set(index, true);
        Some(index as u32)
    }

    /// release unit `i`
    /// # Panics
    /// if the unit is not in use, releasing it twice is a logic error
    pub fn release(&mut self, i: u32) {
        let index = i as usize;
        assert!(
            self.is_set(index),
            "releasing unit {i} which is not reserved"
        );
        self.bytes.view_bits_mut::<Lsb0>().set(index, false);
    }
}

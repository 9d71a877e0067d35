use feather_error::{FeatherError, Result};

/// An LSB ordered bitmap.
///
/// Used both for null bitmasks (set bit means the value is valid) and for
/// bit-packed boolean values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bitmap {
    len: usize,
    data: Vec<u8>,
}

impl Bitmap {
    pub fn from_bool_iter(iter: impl IntoIterator<Item = bool>) -> Self {
        let mut bitmap = Bitmap::default();
        for (idx, bit) in iter.into_iter().enumerate() {
            if idx % 8 == 0 {
                bitmap.data.push(0);
            }
            if bit {
                bitmap.data[idx / 8] |= 1 << (idx % 8);
            }
            bitmap.len += 1;
        }
        bitmap
    }

    /// Wrap `len` bits read from a file.
    ///
    /// Trailing bytes past the last bit are ignored.
    pub fn try_from_bytes(bytes: &[u8], len: usize) -> Result<Self> {
        let needed = len.div_ceil(8);
        if bytes.len() < needed {
            return Err(FeatherError::new(format!(
                "Bitmap of {len} bits needs {needed} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Bitmap {
            len,
            data: bytes[..needed].to_vec(),
        })
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get the value at index.
    ///
    /// Panics if index is out of bounds.
    pub fn value(&self, idx: usize) -> bool {
        assert!(idx < self.len);
        bit_is_set(&self.data, idx)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Check a bit in an LSB ordered byte slice.
///
/// Panics if the slice is too short.
pub fn bit_is_set(bytes: &[u8], idx: usize) -> bool {
    bytes[idx / 8] & (1 << (idx % 8)) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lsb_order_across_bytes() {
        let bits = [
            true, false, false, false, false, false, false, true, //
            false, true, true,
        ];
        let bm = Bitmap::from_bool_iter(bits);

        assert_eq!(11, bm.len());
        assert_eq!(&[0b1000_0001, 0b0000_0110], bm.as_bytes());
        for (idx, bit) in bits.into_iter().enumerate() {
            assert_eq!(bit, bm.value(idx), "idx: {idx}");
        }
    }

    #[test]
    fn empty() {
        let bm = Bitmap::from_bool_iter([]);
        assert!(bm.is_empty());
        assert!(bm.as_bytes().is_empty());
    }

    #[test]
    fn from_padded_bytes() {
        let bm = Bitmap::try_from_bytes(&[0b0000_0101, 0, 0, 0], 3).unwrap();
        assert_eq!(&[0b0000_0101], bm.as_bytes());
        assert!(bm.value(0));
        assert!(!bm.value(1));
        assert!(bm.value(2));

        assert!(Bitmap::try_from_bytes(&[0xFF], 9).is_err());
    }
}

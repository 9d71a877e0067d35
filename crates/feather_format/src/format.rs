//! Binary format constants.

/// Magic bytes at the start and end of every file.
pub const MAGIC: &[u8; 4] = b"FEA1";

/// Format version written into file metadata.
pub const FORMAT_VERSION: i32 = 2;

/// Alignment of every data region.
pub const VALUE_ALIGNMENT: usize = 8;

/// Alignment of every null bitmask region.
pub const NULL_BITMASK_ALIGNMENT: usize = 8;

/// Zeros used for padding regions up to their alignment.
pub(crate) const PADDING: &[u8; 8] = &[0; 8];

/// Round `len` up to the next multiple of `align`.
pub const fn padded_len(len: usize, align: usize) -> usize {
    len.div_ceil(align) * align
}

/// Number of padding bytes needed after `len` bytes.
pub const fn padding_needed(len: usize, align: usize) -> usize {
    padded_len(len, align) - len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_is_ascii() {
        assert_eq!(&[0x46, 0x45, 0x41, 0x31], MAGIC);
    }

    #[test]
    fn padding() {
        assert_eq!(0, padded_len(0, 8));
        assert_eq!(8, padded_len(1, 8));
        assert_eq!(8, padded_len(8, 8));
        assert_eq!(16, padded_len(9, 8));
        assert_eq!(7, padding_needed(9, 8));
        assert_eq!(0, padding_needed(16, 8));
    }
}

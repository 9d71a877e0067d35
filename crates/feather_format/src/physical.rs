use std::array::TryFromSliceError;
use std::fmt::Debug;

use crate::datatype::PrimitiveKind;

/// A primitive stored on disk as fixed width little endian bytes.
pub trait FixedWidthType: Debug + Send + Sync + Copy + 'static {
    const PRIMITIVE_KIND: PrimitiveKind;
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8], Error = TryFromSliceError>;

    /// Convert self to little endian bytes.
    fn to_le_bytes(&self) -> Self::Bytes;

    /// Convert little endian bytes to self.
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Width in bytes.
    fn width() -> usize {
        std::mem::size_of::<Self::Bytes>()
    }
}

macro_rules! impl_fixed_width {
    ($($t:ty => $kind:ident, $n:literal),+ $(,)?) => {
        $(
            impl FixedWidthType for $t {
                const PRIMITIVE_KIND: PrimitiveKind = PrimitiveKind::$kind;
                type Bytes = [u8; $n];

                fn to_le_bytes(&self) -> Self::Bytes {
                    <$t>::to_le_bytes(*self)
                }

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$t>::from_le_bytes(bytes)
                }
            }
        )+
    };
}

impl_fixed_width! {
    i8 => Int8, 1,
    u8 => UInt8, 1,
    i16 => Int16, 2,
    u16 => UInt16, 2,
    i32 => Int32, 4,
    u32 => UInt32, 4,
    i64 => Int64, 8,
    u64 => UInt64, 8,
    f32 => Float, 4,
    f64 => Double, 8,
}

/// Append the little endian encoding of every value to `buf`.
pub fn extend_le<T: FixedWidthType>(buf: &mut Vec<u8>, values: impl IntoIterator<Item = T>) {
    for value in values {
        buf.extend_from_slice(value.to_le_bytes().as_ref());
    }
}

/// Decode little endian values. Trailing bytes not filling a value are
/// ignored.
pub fn decode_le<T: FixedWidthType>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(T::width())
        .filter_map(|chunk| T::Bytes::try_from(chunk).ok())
        .map(T::from_le_bytes)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widths_match_kinds() {
        assert_eq!(Some(i16::width()), i16::PRIMITIVE_KIND.fixed_width());
        assert_eq!(Some(u64::width()), u64::PRIMITIVE_KIND.fixed_width());
        assert_eq!(Some(f32::width()), f32::PRIMITIVE_KIND.fixed_width());
    }

    #[test]
    fn little_endian() {
        let mut buf = Vec::new();
        extend_le(&mut buf, [1_i32, -2]);
        assert_eq!(&[1, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF], buf.as_slice());
        assert_eq!(vec![1, -2], decode_le::<i32>(&buf));

        buf.push(7);
        assert_eq!(2, decode_le::<i32>(&buf).len());
    }
}

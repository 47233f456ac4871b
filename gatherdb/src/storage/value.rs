//! Binary encodings for header fields and column values.
//!
//! Header fields (`u8` depths, `u32` lengths, `u64` ids) implement
//! [`FixedWidth`]. Values stored in a column implement [`StoredValue`],
//! which adds an ordering so the same encoding can back a search tree.
//!
//! All integers are little-endian. Floats compare by IEEE total order so
//! that `NaN` has a stable place in the tree.

use std::cmp::Ordering;

use crate::storage::block::BlockError;

/// A scalar with a fixed little-endian encoding.
pub trait FixedWidth: Copy + Default {
    /// Encoded size in bytes.
    const WIDTH: usize;

    /// Write the encoding into `out`, which is exactly `WIDTH` bytes.
    fn write_le(self, out: &mut [u8]);

    /// Decode from exactly `WIDTH` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! fixed_width_int {
    ($($ty:ty),*) => {$(
        impl FixedWidth for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn write_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                buf.copy_from_slice(&bytes[..Self::WIDTH]);
                Self::from_le_bytes(buf)
            }
        }
    )*};
}

fixed_width_int!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl FixedWidth for bool {
    const WIDTH: usize = 1;

    fn write_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// A value that can be stored in a column and ordered inside a tree.
pub trait StoredValue: Clone + Send + 'static {
    /// Encoded size for fixed-width values, `None` for variable-length ones.
    const FIXED_WIDTH: Option<usize>;

    /// Encode into a fresh buffer.
    fn encode(&self) -> Vec<u8>;

    /// Decode from the payload bytes previously produced by `encode`.
    fn decode(bytes: &[u8]) -> Result<Self, BlockError>;

    /// Total order used by range queries.
    fn compare(&self, other: &Self) -> Ordering;
}

macro_rules! stored_fixed {
    ($($ty:ty => $cmp:ident),*) => {$(
        impl StoredValue for $ty {
            const FIXED_WIDTH: Option<usize> = Some(<$ty as FixedWidth>::WIDTH);

            fn encode(&self) -> Vec<u8> {
                let mut out = vec![0u8; <$ty as FixedWidth>::WIDTH];
                self.write_le(&mut out);
                out
            }

            fn decode(bytes: &[u8]) -> Result<Self, BlockError> {
                if bytes.len() < <$ty as FixedWidth>::WIDTH {
                    return Err(BlockError::Decode(format!(
                        "expected {} bytes for {}, found {}",
                        <$ty as FixedWidth>::WIDTH,
                        stringify!($ty),
                        bytes.len()
                    )));
                }
                Ok(<$ty as FixedWidth>::read_le(bytes))
            }

            fn compare(&self, other: &Self) -> Ordering {
                self.$cmp(other)
            }
        }
    )*};
}

stored_fixed!(
    bool => cmp,
    u8 => cmp,
    i8 => cmp,
    u16 => cmp,
    i16 => cmp,
    u32 => cmp,
    i32 => cmp,
    u64 => cmp,
    i64 => cmp,
    f32 => total_cmp,
    f64 => total_cmp
);

impl StoredValue for String {
    const FIXED_WIDTH: Option<usize> = None;

    fn encode(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }

    fn decode(bytes: &[u8]) -> Result<Self, BlockError> {
        Self::from_utf8(bytes.to_vec()).map_err(|e| BlockError::Decode(e.to_string()))
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_width_little_endian() {
        let mut out = [0u8; 4];
        0x0102_0304u32.write_le(&mut out);
        assert_eq!(out, [4, 3, 2, 1]);
        assert_eq!(u32::read_le(&out), 0x0102_0304);
    }

    #[test]
    fn test_float_total_order() {
        assert_eq!((-0.0f64).compare(&0.0), Ordering::Less);
        assert_eq!(f64::NAN.compare(&f64::INFINITY), Ordering::Greater);
        assert_eq!(1.5f32.compare(&1.5), Ordering::Equal);
    }

    #[test]
    fn test_decode_short_buffer_fails() {
        let result = i64::decode(&[1, 2, 3]);
        assert!(matches!(result, Err(BlockError::Decode(_))));
    }

    #[test]
    fn test_string_rejects_invalid_utf8() {
        assert!(String::decode(&[0xff, 0xfe]).is_err());
        assert_eq!(String::decode(b"abc").expect("decode"), "abc");
    }
}

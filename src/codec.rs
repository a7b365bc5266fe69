//! Field codec
//!
//! Pure functions converting between typed values and their little-endian binary
//! representation inside a record buffer. Nothing here owns or allocates a buffer, so every
//! function is safe to call concurrently on read-only data.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::error::{DecodeError, FieldError, Result};

/// Binary representation of a single value inside a record buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float,
    Double,
    /// Fixed-width, null-padded text. The width is record specific.
    String,
}
impl ValueType {
    /// Maps a numeric array element code (`c C s S i I f`) to its value type
    pub fn from_array_subtype(code: u8) -> Result<Self> {
        match code {
            b'c' => Ok(Self::Int8),
            b'C' => Ok(Self::UInt8),
            b's' => Ok(Self::Int16),
            b'S' => Ok(Self::UInt16),
            b'i' => Ok(Self::Int32),
            b'I' => Ok(Self::UInt32),
            b'f' => Ok(Self::Float),
            _ => Err(DecodeError::InvalidArraySubtype(code as char).into()),
        }
    }

    /// The wire code of this type when used as a numeric array element
    ///
    /// Doubles and strings cannot be array elements and return `None`.
    pub fn array_subtype(self) -> Option<u8> {
        match self {
            Self::Int8 => Some(b'c'),
            Self::UInt8 => Some(b'C'),
            Self::Int16 => Some(b's'),
            Self::UInt16 => Some(b'S'),
            Self::Int32 => Some(b'i'),
            Self::UInt32 => Some(b'I'),
            Self::Float => Some(b'f'),
            Self::Double | Self::String => None,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::UInt8 | Self::Int16 | Self::UInt16 | Self::Int32 | Self::UInt32
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Inclusive range of the values an integer type can hold, `None` for non-integer types
    pub fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            Self::Int8 => Some((i64::from(i8::MIN), i64::from(i8::MAX))),
            Self::UInt8 => Some((0, i64::from(u8::MAX))),
            Self::Int16 => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            Self::UInt16 => Some((0, i64::from(u16::MAX))),
            Self::Int32 => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            Self::UInt32 => Some((0, i64::from(u32::MAX))),
            Self::Float | Self::Double | Self::String => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
        }
    }
}

/// Returns the byte width of a fixed-width type
///
/// String values have no intrinsic width: it is supplied by the record that stores them,
/// so `None` is returned for [`ValueType::String`].
pub fn size_for_type(ty: ValueType) -> Option<usize> {
    match ty {
        ValueType::Int8 | ValueType::UInt8 => Some(1),
        ValueType::Int16 | ValueType::UInt16 => Some(2),
        ValueType::Int32 | ValueType::UInt32 | ValueType::Float => Some(4),
        ValueType::Double => Some(8),
        ValueType::String => None,
    }
}

/// Returns the byte range of element `index` after checking it fits in the buffer
fn element_range(
    buffer: &[u8],
    index: usize,
    element_width: usize,
) -> Result<std::ops::Range<usize>> {
    let start = index * element_width;
    let end = start + element_width;
    if end > buffer.len() {
        return Err(DecodeError::UnexpectedEndOfRecord {
            needed: end,
            available: buffer.len(),
        }
        .into());
    }
    Ok(start..end)
}

/// Decodes element `index` of a buffer as an integer
///
/// Floating point values are truncated towards zero.
///
/// # Arguments
///
/// * `buffer` - The bytes holding the values
/// * `index` - The element to decode
/// * `element_width` - The byte width of one element
/// * `ty` - The stored representation
///
/// # Errors
///
/// Returns [`FieldError::TypeMismatch`] if the stored type is a string, and
/// [`DecodeError::UnexpectedEndOfRecord`] if the element lies past the end of the buffer.
#[allow(clippy::cast_possible_wrap)]
pub fn decode_integer(
    buffer: &[u8],
    index: usize,
    element_width: usize,
    ty: ValueType,
) -> Result<i64> {
    let bytes = &buffer[element_range(buffer, index, element_width)?];
    let value = match ty {
        ValueType::Int8 => i64::from(bytes[0] as i8),
        ValueType::UInt8 => i64::from(bytes[0]),
        ValueType::Int16 => i64::from(LittleEndian::read_i16(bytes)),
        ValueType::UInt16 => i64::from(LittleEndian::read_u16(bytes)),
        ValueType::Int32 => i64::from(LittleEndian::read_i32(bytes)),
        ValueType::UInt32 => i64::from(LittleEndian::read_u32(bytes)),
        ValueType::Float => LittleEndian::read_f32(bytes) as i64,
        ValueType::Double => LittleEndian::read_f64(bytes) as i64,
        ValueType::String => {
            return Err(FieldError::TypeMismatch {
                requested: "integer",
                found: ty.name(),
            }
            .into())
        }
    };
    Ok(value)
}

/// Decodes element `index` of a buffer as a floating point value
///
/// Integer values are widened.
///
/// # Errors
///
/// Returns [`FieldError::TypeMismatch`] if the stored type is a string, and
/// [`DecodeError::UnexpectedEndOfRecord`] if the element lies past the end of the buffer.
#[allow(clippy::cast_precision_loss)]
pub fn decode_float(
    buffer: &[u8],
    index: usize,
    element_width: usize,
    ty: ValueType,
) -> Result<f64> {
    match ty {
        ValueType::String => Err(FieldError::TypeMismatch {
            requested: "float",
            found: ty.name(),
        }
        .into()),
        ValueType::Float => {
            let bytes = &buffer[element_range(buffer, index, element_width)?];
            Ok(f64::from(LittleEndian::read_f32(bytes)))
        }
        ValueType::Double => {
            let bytes = &buffer[element_range(buffer, index, element_width)?];
            Ok(LittleEndian::read_f64(bytes))
        }
        _ => decode_integer(buffer, index, element_width, ty).map(|v| v as f64),
    }
}

/// Decodes element `index` of a buffer as a string
///
/// Each element occupies `element_width` bytes and is null padded; the returned slice stops at
/// the first null byte.
///
/// # Errors
///
/// Returns [`FieldError::TypeMismatch`] if the stored type is numeric.
pub fn decode_string(
    buffer: &[u8],
    index: usize,
    element_width: usize,
    ty: ValueType,
) -> Result<&str> {
    if ty != ValueType::String {
        return Err(FieldError::TypeMismatch {
            requested: "string",
            found: ty.name(),
        }
        .into());
    }
    let bytes = &buffer[element_range(buffer, index, element_width)?];
    let end = memchr::memchr(0, bytes).unwrap_or(bytes.len());
    Ok(std::str::from_utf8(&bytes[..end])?)
}

/// Appends an integer to `out` using the representation of `ty`
///
/// Values are truncated to the target width; callers pick a width that fits.
#[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub(crate) fn encode_integer(out: &mut Vec<u8>, value: i64, ty: ValueType) {
    // writes into a Vec never fail
    let _ = match ty {
        ValueType::Int8 => out.write_i8(value as i8),
        ValueType::UInt8 => out.write_u8(value as u8),
        ValueType::Int16 => out.write_i16::<LittleEndian>(value as i16),
        ValueType::UInt16 => out.write_u16::<LittleEndian>(value as u16),
        ValueType::Int32 => out.write_i32::<LittleEndian>(value as i32),
        ValueType::UInt32 => out.write_u32::<LittleEndian>(value as u32),
        ValueType::Float => out.write_f32::<LittleEndian>(value as f32),
        ValueType::Double => out.write_f64::<LittleEndian>(value as f64),
        ValueType::String => Ok(()),
    };
}

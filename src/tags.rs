//! Aux tag table
//!
//! Aux tags are stored after the qualities of an alignment record as a contiguous stream of
//! `(2-byte name, 1-byte type code, value)` entries. [`TagTable`] walks such a stream and
//! indexes the entries by name, while [`TagSet`] holds typed tag values and serializes them
//! back into the same layout.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;

use crate::{
    codec::{self, size_for_type, ValueType},
    error::{DecodeError, FieldError, Result, ValidationError},
};

/// Byte width of an aux tag name
pub const TAG_NAME_LENGTH: usize = 2;

/// Wire type of an aux tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamTagType {
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float,
    Double,
    String,
    ByteArray,
    NumericArray,
}
impl SamTagType {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            b'A' => Ok(Self::Char),
            b'c' => Ok(Self::Int8),
            b'C' => Ok(Self::UInt8),
            b's' => Ok(Self::Int16),
            b'S' => Ok(Self::UInt16),
            b'i' => Ok(Self::Int32),
            b'I' => Ok(Self::UInt32),
            b'f' => Ok(Self::Float),
            b'd' => Ok(Self::Double),
            b'Z' => Ok(Self::String),
            b'H' => Ok(Self::ByteArray),
            b'B' => Ok(Self::NumericArray),
            _ => Err(DecodeError::UnsupportedTagType(code as char).into()),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Char => b'A',
            Self::Int8 => b'c',
            Self::UInt8 => b'C',
            Self::Int16 => b's',
            Self::UInt16 => b'S',
            Self::Int32 => b'i',
            Self::UInt32 => b'I',
            Self::Float => b'f',
            Self::Double => b'd',
            Self::String => b'Z',
            Self::ByteArray => b'H',
            Self::NumericArray => b'B',
        }
    }

    /// The scalar representation of fixed-width tags
    fn value_type(self) -> Option<ValueType> {
        match self {
            Self::Int8 => Some(ValueType::Int8),
            Self::Char | Self::UInt8 => Some(ValueType::UInt8),
            Self::Int16 => Some(ValueType::Int16),
            Self::UInt16 => Some(ValueType::UInt16),
            Self::Int32 => Some(ValueType::Int32),
            Self::UInt32 => Some(ValueType::UInt32),
            Self::Float => Some(ValueType::Float),
            Self::Double => Some(ValueType::Double),
            Self::String | Self::ByteArray | Self::NumericArray => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self.value_type().is_some_and(ValueType::is_integer)
    }

    fn name(self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::Int8 | Self::UInt8 | Self::Int16 | Self::UInt16 | Self::Int32 | Self::UInt32 => {
                "integer"
            }
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::ByteArray => "byte array",
            Self::NumericArray => "numeric array",
        }
    }
}

/// A named tag value
///
/// Lookups return `Option<SamTag<T>>`: a present tag holding `0` is distinct from an absent tag.
#[derive(Debug, Clone, PartialEq)]
pub struct SamTag<T> {
    name: String,
    value: T,
}
impl<T> SamTag<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn value(&self) -> &T {
        &self.value
    }
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Values of a numeric array tag
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArrayValues {
    Integer(Vec<i64>),
    Float(Vec<f32>),
}

/// A numeric array tag (`B`) together with its element type
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArrayTag {
    element_type: ValueType,
    values: NumericArrayValues,
}
impl NumericArrayTag {
    /// Creates an integer array stored with the given integer element type
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::TypeMismatch`] for a non-integer element type and
    /// [`ValidationError::ArrayValueRange`] for the first value the element type cannot hold.
    pub fn integers(element_type: ValueType, values: Vec<i64>) -> Result<Self> {
        let Some((min, max)) = element_type.integer_range() else {
            return Err(FieldError::TypeMismatch {
                requested: "integer array",
                found: "non-integer element type",
            }
            .into());
        };
        if let Some(&value) = values.iter().find(|v| !(min..=max).contains(*v)) {
            return Err(ValidationError::ArrayValueRange {
                value,
                element_type: element_type.name(),
            }
            .into());
        }
        Ok(Self {
            element_type,
            values: NumericArrayValues::Integer(values),
        })
    }

    pub fn floats(values: Vec<f32>) -> Self {
        Self {
            element_type: ValueType::Float,
            values: NumericArrayValues::Float(values),
        }
    }

    pub fn element_type(&self) -> ValueType {
        self.element_type
    }

    pub fn values(&self) -> &NumericArrayValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        match &self.values {
            NumericArrayValues::Integer(v) => v.len(),
            NumericArrayValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn integer_values(&self) -> Option<&[i64]> {
        match &self.values {
            NumericArrayValues::Integer(v) => Some(v),
            NumericArrayValues::Float(_) => None,
        }
    }

    pub fn float_values(&self) -> Option<&[f32]> {
        match &self.values {
            NumericArrayValues::Float(v) => Some(v),
            NumericArrayValues::Integer(_) => None,
        }
    }
}

/// Location of one tag value inside an aux stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagEntry {
    pub tag_type: SamTagType,
    /// Offset of the first value byte (for arrays, the first element)
    pub offset: usize,
    /// Number of value bytes, excluding the null terminator of strings
    pub len: usize,
    /// Element type and count of numeric arrays
    pub array: Option<(ValueType, usize)>,
}

fn check_available(aux: &[u8], needed: usize) -> Result<()> {
    if needed > aux.len() {
        return Err(DecodeError::UnexpectedEndOfRecord {
            needed,
            available: aux.len(),
        }
        .into());
    }
    Ok(())
}

/// Name-keyed index over an encoded aux stream
#[derive(Debug, Clone, Default)]
pub struct TagTable {
    entries: BTreeMap<[u8; TAG_NAME_LENGTH], TagEntry>,
}
impl TagTable {
    /// Walks the aux stream and records the location of every tag
    ///
    /// Duplicate names are not rejected: the last occurrence wins.
    ///
    /// # Errors
    ///
    /// * [`DecodeError::UnsupportedTagType`] if a type code is not recognized, since the
    ///   stream cannot be skipped without knowing the value width
    /// * [`DecodeError::InvalidArraySubtype`] for an unknown numeric array element type
    /// * [`DecodeError::UnexpectedEndOfRecord`] or [`DecodeError::MissingNullTerminator`] for
    ///   a truncated stream
    pub fn parse(aux: &[u8]) -> Result<Self> {
        let mut entries = BTreeMap::new();
        let mut pos = 0;
        while pos < aux.len() {
            check_available(aux, pos + TAG_NAME_LENGTH + 1)?;
            let name = [aux[pos], aux[pos + 1]];
            let tag_type = SamTagType::from_code(aux[pos + 2])?;
            let offset = pos + TAG_NAME_LENGTH + 1;
            let entry = match tag_type {
                SamTagType::String | SamTagType::ByteArray => {
                    let len = memchr::memchr(0, &aux[offset..])
                        .ok_or(DecodeError::MissingNullTerminator(offset))?;
                    pos = offset + len + 1;
                    TagEntry {
                        tag_type,
                        offset,
                        len,
                        array: None,
                    }
                }
                SamTagType::NumericArray => {
                    check_available(aux, offset + 5)?;
                    let element_type = ValueType::from_array_subtype(aux[offset])?;
                    let count = LittleEndian::read_u32(&aux[offset + 1..offset + 5]) as usize;
                    let width = size_for_type(element_type).unwrap_or(0);
                    let len = count * width;
                    check_available(aux, offset + 5 + len)?;
                    pos = offset + 5 + len;
                    TagEntry {
                        tag_type,
                        offset: offset + 5,
                        len,
                        array: Some((element_type, count)),
                    }
                }
                _ => {
                    let len = tag_type
                        .value_type()
                        .and_then(size_for_type)
                        .unwrap_or(0);
                    check_available(aux, offset + len)?;
                    pos = offset + len;
                    TagEntry {
                        tag_type,
                        offset,
                        len,
                        array: None,
                    }
                }
            };
            entries.insert(name, entry);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, name: &str) -> Option<&TagEntry> {
        let key: [u8; TAG_NAME_LENGTH] = name.as_bytes().try_into().ok()?;
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names and types of every tag, in name order
    pub fn tag_types(&self) -> BTreeMap<String, SamTagType> {
        self.entries
            .iter()
            .map(|(name, entry)| (String::from_utf8_lossy(name).into_owned(), entry.tag_type))
            .collect()
    }

    /// Looks up `name` and checks that its type satisfies `accept`
    fn typed_entry(
        &self,
        name: &str,
        requested: &'static str,
        accept: impl Fn(SamTagType) -> bool,
    ) -> Result<Option<&TagEntry>> {
        match self.get(name) {
            None => Ok(None),
            Some(entry) if accept(entry.tag_type) => Ok(Some(entry)),
            Some(entry) => Err(FieldError::TypeMismatch {
                requested,
                found: entry.tag_type.name(),
            }
            .into()),
        }
    }

    pub fn char_value(&self, aux: &[u8], name: &str) -> Result<Option<u8>> {
        Ok(self
            .typed_entry(name, "char", |t| t == SamTagType::Char)?
            .map(|e| aux[e.offset]))
    }

    pub fn integer_value(&self, aux: &[u8], name: &str) -> Result<Option<i64>> {
        let Some(entry) = self.typed_entry(name, "integer", SamTagType::is_integer)? else {
            return Ok(None);
        };
        let ty = entry.tag_type.value_type().unwrap_or(ValueType::Int32);
        let value = codec::decode_integer(&aux[entry.offset..], 0, entry.len, ty)?;
        Ok(Some(value))
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn float_value(&self, aux: &[u8], name: &str) -> Result<Option<f32>> {
        let Some(entry) = self.typed_entry(name, "float", |t| t == SamTagType::Float)? else {
            return Ok(None);
        };
        let value = codec::decode_float(&aux[entry.offset..], 0, entry.len, ValueType::Float)?;
        Ok(Some(value as f32))
    }

    pub fn double_value(&self, aux: &[u8], name: &str) -> Result<Option<f64>> {
        let Some(entry) = self.typed_entry(name, "double", |t| t == SamTagType::Double)? else {
            return Ok(None);
        };
        let value = codec::decode_float(&aux[entry.offset..], 0, entry.len, ValueType::Double)?;
        Ok(Some(value))
    }

    pub fn string_value(&self, aux: &[u8], name: &str) -> Result<Option<String>> {
        self.text_value(aux, name, "string", SamTagType::String)
    }

    pub fn byte_array_value(&self, aux: &[u8], name: &str) -> Result<Option<String>> {
        self.text_value(aux, name, "byte array", SamTagType::ByteArray)
    }

    fn text_value(
        &self,
        aux: &[u8],
        name: &str,
        requested: &'static str,
        expected: SamTagType,
    ) -> Result<Option<String>> {
        let Some(entry) = self.typed_entry(name, requested, |t| t == expected)? else {
            return Ok(None);
        };
        let bytes = &aux[entry.offset..entry.offset + entry.len];
        let text = codec::decode_string(bytes, 0, entry.len, ValueType::String)?;
        Ok(Some(text.to_string()))
    }

    pub fn numeric_array_value(&self, aux: &[u8], name: &str) -> Result<Option<NumericArrayTag>> {
        let Some(entry) =
            self.typed_entry(name, "numeric array", |t| t == SamTagType::NumericArray)?
        else {
            return Ok(None);
        };
        let Some((element_type, count)) = entry.array else {
            return Ok(None);
        };
        let values = &aux[entry.offset..entry.offset + entry.len];
        let width = size_for_type(element_type).unwrap_or(1);
        let tag = if element_type == ValueType::Float {
            let floats = (0..count)
                .map(|idx| codec::decode_float(values, idx, width, element_type))
                .map(|v| v.map(|f| f as f32))
                .collect::<Result<Vec<_>>>()?;
            NumericArrayTag::floats(floats)
        } else {
            let integers = (0..count)
                .map(|idx| codec::decode_integer(values, idx, width, element_type))
                .collect::<Result<Vec<_>>>()?;
            NumericArrayTag::integers(element_type, integers)?
        };
        Ok(Some(tag))
    }
}

/// Chooses the narrowest integer representation able to hold `value`
pub(crate) fn integer_tag_type(name: &str, value: i64) -> Result<SamTagType> {
    let tag_type = if value >= 0 {
        if value <= i64::from(u8::MAX) {
            SamTagType::UInt8
        } else if value <= i64::from(u16::MAX) {
            SamTagType::UInt16
        } else if value <= i64::from(u32::MAX) {
            SamTagType::UInt32
        } else {
            return Err(ValidationError::IntegerTagRange {
                name: name.to_string(),
                value,
            }
            .into());
        }
    } else if value >= i64::from(i8::MIN) {
        SamTagType::Int8
    } else if value >= i64::from(i16::MIN) {
        SamTagType::Int16
    } else if value >= i64::from(i32::MIN) {
        SamTagType::Int32
    } else {
        return Err(ValidationError::IntegerTagRange {
            name: name.to_string(),
            value,
        }
        .into());
    };
    Ok(tag_type)
}

/// Checks that a string (`Z`) or hex (`H`) value survives null termination
fn check_text_value(name: &str, value: &str, hex: bool) -> Result<()> {
    let reason = if memchr::memchr(0, value.as_bytes()).is_some() {
        "contains a null byte"
    } else if hex && value.len() % 2 != 0 {
        "hex value has an odd number of digits"
    } else if hex && !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        "hex value contains a non-hex digit"
    } else {
        return Ok(());
    };
    Err(ValidationError::InvalidTagValue {
        name: name.to_string(),
        reason,
    }
    .into())
}

/// A set of typed aux tags, one map per type group
///
/// Names are unique across the whole set: adding a tag replaces any previous tag of the same
/// name, whatever its type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagSet {
    chars: BTreeMap<String, u8>,
    integers: BTreeMap<String, i64>,
    floats: BTreeMap<String, f32>,
    doubles: BTreeMap<String, f64>,
    strings: BTreeMap<String, String>,
    byte_arrays: BTreeMap<String, String>,
    numeric_arrays: BTreeMap<String, NumericArrayTag>,
}
impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.integers.clear();
        self.floats.clear();
        self.doubles.clear();
        self.strings.clear();
        self.byte_arrays.clear();
        self.numeric_arrays.clear();
    }

    pub fn len(&self) -> usize {
        self.chars.len()
            + self.integers.len()
            + self.floats.len()
            + self.doubles.len()
            + self.strings.len()
            + self.byte_arrays.len()
            + self.numeric_arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&mut self, name: &str) {
        self.chars.remove(name);
        self.integers.remove(name);
        self.floats.remove(name);
        self.doubles.remove(name);
        self.strings.remove(name);
        self.byte_arrays.remove(name);
        self.numeric_arrays.remove(name);
    }

    pub fn add_char(&mut self, name: &str, value: u8) {
        self.remove(name);
        self.chars.insert(name.to_string(), value);
    }

    pub fn add_integer(&mut self, name: &str, value: i64) {
        self.remove(name);
        self.integers.insert(name.to_string(), value);
    }

    pub fn add_float(&mut self, name: &str, value: f32) {
        self.remove(name);
        self.floats.insert(name.to_string(), value);
    }

    pub fn add_double(&mut self, name: &str, value: f64) {
        self.remove(name);
        self.doubles.insert(name.to_string(), value);
    }

    pub fn add_string(&mut self, name: &str, value: &str) {
        self.remove(name);
        self.strings.insert(name.to_string(), value.to_string());
    }

    pub fn add_byte_array(&mut self, name: &str, value: &str) {
        self.remove(name);
        self.byte_arrays.insert(name.to_string(), value.to_string());
    }

    pub fn add_numeric_array(&mut self, name: &str, value: NumericArrayTag) {
        self.remove(name);
        self.numeric_arrays.insert(name.to_string(), value);
    }

    /// Iterates over every tag name in serialization order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chars
            .keys()
            .chain(self.integers.keys())
            .chain(self.floats.keys())
            .chain(self.doubles.keys())
            .chain(self.strings.keys())
            .chain(self.byte_arrays.keys())
            .chain(self.numeric_arrays.keys())
            .map(String::as_str)
    }

    /// Checks that every tag can be encoded: names must be exactly two bytes, integers must
    /// fit in 32 bits, and text values must not hold null bytes (hex values must also be
    /// an even number of hex digits)
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = self.names().find(|n| n.len() != TAG_NAME_LENGTH) {
            return Err(ValidationError::InvalidTagName(name.to_string()).into());
        }
        for (name, value) in &self.integers {
            integer_tag_type(name, *value)?;
        }
        for (name, value) in &self.strings {
            check_text_value(name, value, false)?;
        }
        for (name, value) in &self.byte_arrays {
            check_text_value(name, value, true)?;
        }
        Ok(())
    }

    /// Imports every tag of an encoded aux stream
    pub fn import(&mut self, aux: &[u8]) -> Result<()> {
        let table = TagTable::parse(aux)?;
        for (key, entry) in &table.entries {
            let name = std::str::from_utf8(key)?;
            match entry.tag_type {
                SamTagType::Char => self.add_char(name, aux[entry.offset]),
                SamTagType::Float => {
                    if let Some(v) = table.float_value(aux, name)? {
                        self.add_float(name, v);
                    }
                }
                SamTagType::Double => {
                    if let Some(v) = table.double_value(aux, name)? {
                        self.add_double(name, v);
                    }
                }
                SamTagType::String => {
                    if let Some(v) = table.string_value(aux, name)? {
                        self.add_string(name, &v);
                    }
                }
                SamTagType::ByteArray => {
                    if let Some(v) = table.byte_array_value(aux, name)? {
                        self.add_byte_array(name, &v);
                    }
                }
                SamTagType::NumericArray => {
                    if let Some(v) = table.numeric_array_value(aux, name)? {
                        self.add_numeric_array(name, v);
                    }
                }
                _ => {
                    if let Some(v) = table.integer_value(aux, name)? {
                        self.add_integer(name, v);
                    }
                }
            }
        }
        Ok(())
    }

    /// Encodes the set as an aux stream
    ///
    /// Tags are grouped by type (char, integer, float, double, string, byte array, numeric
    /// array) and sorted by name within each group, so the output depends only on the
    /// contents of the set and never on insertion order.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidTagName`], [`ValidationError::IntegerTagRange`] or
    /// [`ValidationError::InvalidTagValue`] when a tag cannot be encoded.
    #[allow(clippy::cast_possible_wrap)]
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let header = |out: &mut Vec<u8>, name: &str, tag_type: SamTagType| -> Result<()> {
            if name.len() != TAG_NAME_LENGTH {
                return Err(ValidationError::InvalidTagName(name.to_string()).into());
            }
            out.extend_from_slice(name.as_bytes());
            out.push(tag_type.code());
            Ok(())
        };

        for (name, value) in &self.chars {
            header(&mut out, name, SamTagType::Char)?;
            out.push(*value);
        }
        for (name, value) in &self.integers {
            let tag_type = integer_tag_type(name, *value)?;
            header(&mut out, name, tag_type)?;
            codec::encode_integer(
                &mut out,
                *value,
                tag_type.value_type().unwrap_or(ValueType::Int32),
            );
        }
        for (name, value) in &self.floats {
            header(&mut out, name, SamTagType::Float)?;
            out.write_f32::<LittleEndian>(*value)?;
        }
        for (name, value) in &self.doubles {
            header(&mut out, name, SamTagType::Double)?;
            out.write_f64::<LittleEndian>(*value)?;
        }
        for (name, value) in &self.strings {
            check_text_value(name, value, false)?;
            header(&mut out, name, SamTagType::String)?;
            out.extend_from_slice(value.as_bytes());
            out.push(0);
        }
        for (name, value) in &self.byte_arrays {
            check_text_value(name, value, true)?;
            header(&mut out, name, SamTagType::ByteArray)?;
            out.extend_from_slice(value.as_bytes());
            out.push(0);
        }
        for (name, value) in &self.numeric_arrays {
            header(&mut out, name, SamTagType::NumericArray)?;
            let subtype = value
                .element_type()
                .array_subtype()
                .ok_or(DecodeError::InvalidArraySubtype('?'))?;
            out.push(subtype);
            out.write_u32::<LittleEndian>(value.len() as u32)?;
            match value.values() {
                NumericArrayValues::Integer(values) => {
                    for v in values {
                        codec::encode_integer(&mut out, *v, value.element_type());
                    }
                }
                NumericArrayValues::Float(values) => {
                    for v in values {
                        out.write_f32::<LittleEndian>(*v)?;
                    }
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;
    use anyhow::Result;

    #[test]
    fn test_tag_order_is_deterministic() -> Result<()> {
        let mut first = TagSet::new();
        first.add_integer("XY", 1);
        first.add_integer("AB", 2);

        let mut second = TagSet::new();
        second.add_integer("AB", 2);
        second.add_integer("XY", 1);

        let encoded = first.serialize()?;
        assert_eq!(encoded, second.serialize()?);
        assert_eq!(&encoded[..3], b"ABC");
        Ok(())
    }

    #[test]
    fn test_type_group_order() -> Result<()> {
        let mut tags = TagSet::new();
        tags.add_string("AA", "hello");
        tags.add_integer("ZZ", 5);
        tags.add_char("MM", b'x');
        let encoded = tags.serialize()?;
        let table = TagTable::parse(&encoded)?;
        assert_eq!(table.len(), 3);
        // char, then integer, then string
        assert_eq!(&encoded[..3], b"MMA");
        assert_eq!(&encoded[4..7], b"ZZC");
        assert_eq!(&encoded[8..11], b"AAZ");
        Ok(())
    }

    #[test]
    fn test_integer_width_selection() -> Result<()> {
        assert_eq!(integer_tag_type("XX", 0)?, SamTagType::UInt8);
        assert_eq!(integer_tag_type("XX", 255)?, SamTagType::UInt8);
        assert_eq!(integer_tag_type("XX", 256)?, SamTagType::UInt16);
        assert_eq!(integer_tag_type("XX", 70_000)?, SamTagType::UInt32);
        assert_eq!(integer_tag_type("XX", -1)?, SamTagType::Int8);
        assert_eq!(integer_tag_type("XX", -129)?, SamTagType::Int16);
        assert_eq!(integer_tag_type("XX", -40_000)?, SamTagType::Int32);
        assert!(matches!(
            integer_tag_type("XX", i64::from(u32::MAX) + 1),
            Err(Error::ValidationError(ValidationError::IntegerTagRange { .. }))
        ));
        assert!(matches!(
            integer_tag_type("XX", i64::from(i32::MIN) - 1),
            Err(Error::ValidationError(ValidationError::IntegerTagRange { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_zero_is_not_missing() -> Result<()> {
        let mut tags = TagSet::new();
        tags.add_integer("NM", 0);
        let encoded = tags.serialize()?;
        let table = TagTable::parse(&encoded)?;
        assert_eq!(table.integer_value(&encoded, "NM")?, Some(0));
        assert_eq!(table.integer_value(&encoded, "XS")?, None);
        Ok(())
    }

    #[test]
    fn test_import_round_trip() -> Result<()> {
        let mut tags = TagSet::new();
        tags.add_char("XA", b'z');
        tags.add_integer("NM", -300);
        tags.add_float("XF", 1.5);
        tags.add_double("XD", 2.25);
        tags.add_string("RG", "group1");
        tags.add_byte_array("XH", "1AE301");
        tags.add_numeric_array("XB", NumericArrayTag::integers(ValueType::Int16, vec![-2, 7])?);
        tags.add_numeric_array("XC", NumericArrayTag::floats(vec![0.5, 4.0]));
        let encoded = tags.serialize()?;

        let mut imported = TagSet::new();
        imported.import(&encoded)?;
        assert_eq!(imported, tags);
        assert_eq!(imported.serialize()?, encoded);
        Ok(())
    }

    #[test]
    fn test_unsupported_type_code() {
        let aux = b"XXQ\x01";
        assert!(matches!(
            TagTable::parse(aux),
            Err(Error::DecodeError(DecodeError::UnsupportedTagType('Q')))
        ));
    }

    #[test]
    fn test_truncated_stream() {
        // a 32-bit integer tag with only two value bytes
        assert!(TagTable::parse(b"NMi\x01\x00").is_err());
        // a string without its terminator
        assert!(matches!(
            TagTable::parse(b"RGZabc"),
            Err(Error::DecodeError(DecodeError::MissingNullTerminator(3)))
        ));
    }

    #[test]
    fn test_duplicate_name_last_wins() -> Result<()> {
        let aux = b"NMC\x01NMC\x02";
        let table = TagTable::parse(aux)?;
        assert_eq!(table.len(), 1);
        assert_eq!(table.integer_value(aux, "NM")?, Some(2));
        Ok(())
    }

    #[test]
    fn test_type_mismatch_lookup() -> Result<()> {
        let aux = b"RGZabc\0";
        let table = TagTable::parse(aux)?;
        assert!(matches!(
            table.integer_value(aux, "RG"),
            Err(Error::FieldError(FieldError::TypeMismatch { .. }))
        ));
        Ok(())
    }

    #[test]
    fn test_same_name_replaces_other_type() -> Result<()> {
        let mut tags = TagSet::new();
        tags.add_integer("XX", 5);
        tags.add_string("XX", "five");
        assert_eq!(tags.len(), 1);
        let encoded = tags.serialize()?;
        assert_eq!(encoded, b"XXZfive\0");
        Ok(())
    }

    #[test]
    fn test_integer_array_values_must_fit() -> Result<()> {
        assert!(matches!(
            NumericArrayTag::integers(ValueType::Int8, vec![1000, -300]),
            Err(Error::ValidationError(ValidationError::ArrayValueRange {
                value: 1000,
                element_type: "int8"
            }))
        ));
        assert!(NumericArrayTag::integers(ValueType::UInt16, vec![-1]).is_err());
        assert!(NumericArrayTag::integers(ValueType::Float, vec![1]).is_err());

        let bounds = NumericArrayTag::integers(ValueType::Int8, vec![-128, 127])?;
        let mut tags = TagSet::new();
        tags.add_numeric_array("XB", bounds);
        let encoded = tags.serialize()?;
        let table = TagTable::parse(&encoded)?;
        let decoded = table.numeric_array_value(&encoded, "XB")?;
        assert_eq!(
            decoded.as_ref().and_then(NumericArrayTag::integer_values),
            Some(&[-128, 127][..])
        );
        Ok(())
    }

    #[test]
    fn test_text_values_with_null_bytes() {
        let mut tags = TagSet::new();
        tags.add_string("XA", "a\0b");
        tags.add_integer("NM", 3);
        assert!(matches!(
            tags.validate(),
            Err(Error::ValidationError(ValidationError::InvalidTagValue { .. }))
        ));
        assert!(tags.serialize().is_err());
    }

    #[test]
    fn test_malformed_hex_values() {
        for bad in ["ABC", "ZZ", "1A\0B"] {
            let mut tags = TagSet::new();
            tags.add_byte_array("XH", bad);
            assert!(tags.validate().is_err(), "{bad:?} should be rejected");
            assert!(tags.serialize().is_err());
        }
        let mut tags = TagSet::new();
        tags.add_byte_array("XH", "1ae3");
        assert!(tags.validate().is_ok());
    }

    #[test]
    fn test_invalid_tag_name() {
        let mut tags = TagSet::new();
        tags.add_integer("TOOLONG", 5);
        assert!(matches!(
            tags.validate(),
            Err(Error::ValidationError(ValidationError::InvalidTagName(_)))
        ));
        assert!(tags.serialize().is_err());
    }
}

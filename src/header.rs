//! Header module for alignment record streams
//!
//! The header precedes the records of a stream and carries the free-form header text
//! together with the list of reference sequences that record chromosome indices point into.
//! The layout follows the uncompressed BAM header: magic, text, then the reference list.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

use crate::error::{DecodeError, HeaderError, Result};

/// Magic bytes opening every record stream
///
/// This is used to identify record streams and verify file integrity.
pub const MAGIC: [u8; 4] = *b"BAM\x01";

/// Upper bound on the reference list capacity reserved before any reference is read
const MAX_PREALLOCATED_REFERENCES: usize = 1024;

/// A reference sequence declared in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Name of the sequence
    pub name: String,

    /// Length of the sequence in bases
    pub length: u32,
}
impl Reference {
    pub fn new(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// Header of an alignment record stream
///
/// The `SamHeader` is shared between every record read from or built for one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamHeader {
    /// Plain header text (`@HD`, `@SQ`, `@RG` ... lines)
    ///
    /// `l_text` (4 bytes) + text
    pub text: String,

    /// Reference sequences, indexed by chromosome id
    ///
    /// `n_ref` (4 bytes) + per reference: `l_name` (4 bytes), name + `\0`, `l_ref` (4 bytes)
    pub references: Vec<Reference>,
}
impl SamHeader {
    /// Creates a new header with the given text and reference sequences
    ///
    /// # Arguments
    ///
    /// * `text` - The plain header text
    /// * `references` - The reference sequences, in chromosome index order
    ///
    /// # Returns
    ///
    /// A new `SamHeader` instance
    pub fn new(text: impl Into<String>, references: Vec<Reference>) -> Self {
        Self {
            text: text.into(),
            references,
        }
    }

    /// Returns the number of reference sequences
    pub fn n_references(&self) -> usize {
        self.references.len()
    }

    /// Returns the name of the reference sequence with the given chromosome index
    ///
    /// Negative indices (unplaced records) and indices past the end return `None`.
    pub fn reference_name(&self, tid: i32) -> Option<&str> {
        let idx = usize::try_from(tid).ok()?;
        self.references.get(idx).map(|r| r.name.as_str())
    }

    /// Returns the chromosome index of the reference sequence with the given name
    pub fn reference_index(&self, name: &str) -> Option<usize> {
        self.references.iter().position(|r| r.name == name)
    }

    /// Parses a header from the start of a buffer
    ///
    /// # Arguments
    ///
    /// * `buffer` - A byte slice starting with the header
    ///
    /// # Returns
    ///
    /// * `Ok((SamHeader, usize))` - The header and the number of bytes it occupied
    /// * `Err(Error)` - If the buffer is too small or contains invalid header data
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * The magic number is incorrect
    /// * The buffer ends before the header does
    /// * Header text or reference names are not valid UTF-8
    pub fn from_bytes(buffer: &[u8]) -> Result<(Self, usize)> {
        let mut cursor = buffer;
        let header = Self::from_reader(&mut cursor).map_err(|e| match e {
            crate::Error::IoError(_) => HeaderError::InvalidSize(buffer.len(), 0).into(),
            other => other,
        })?;
        Ok((header, buffer.len() - cursor.len()))
    }

    /// Writes the header to a writer
    ///
    /// # Arguments
    ///
    /// * `writer` - Any type that implements the `Write` trait
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the writer fails (typically an I/O error).
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_u32::<LittleEndian>(self.text.len() as u32)?;
        writer.write_all(self.text.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.references.len() as u32)?;
        for reference in &self.references {
            writer.write_u32::<LittleEndian>(reference.name.len() as u32 + 1)?;
            writer.write_all(reference.name.as_bytes())?;
            writer.write_u8(0)?;
            writer.write_u32::<LittleEndian>(reference.length)?;
        }
        Ok(())
    }

    /// Reads a header from a reader
    ///
    /// # Arguments
    ///
    /// * `reader` - Any type that implements the `Read` trait
    ///
    /// # Returns
    ///
    /// * `Ok(SamHeader)` - A valid header read from the reader
    /// * `Err(Error)` - If reading from the reader failed or the header data is invalid
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * Reading from the reader fails (typically an I/O error)
    /// * The magic number is incorrect
    /// * The reader ends before a declared text or name length is satisfied
    /// * Header text or reference names are not valid UTF-8
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(HeaderError::InvalidMagicNumber(magic).into());
        }

        let l_text = reader.read_u32::<LittleEndian>()?;
        let text = read_block(reader, l_text)?;
        // some writers pad the text with nulls
        let text_end = memchr::memchr(0, &text).unwrap_or(text.len());
        let text = std::str::from_utf8(&text[..text_end])?.to_string();

        let n_ref = reader.read_u32::<LittleEndian>()? as usize;
        let mut references = Vec::with_capacity(n_ref.min(MAX_PREALLOCATED_REFERENCES));
        for _ in 0..n_ref {
            let l_name = reader.read_u32::<LittleEndian>()?;
            let name = read_block(reader, l_name)?;
            let name_end =
                memchr::memchr(0, &name).ok_or(DecodeError::MissingNullTerminator(0))?;
            let name = std::str::from_utf8(&name[..name_end])?.to_string();
            let length = reader.read_u32::<LittleEndian>()?;
            references.push(Reference { name, length });
        }

        Ok(Self { text, references })
    }
}

/// Reads exactly `len` bytes, growing the buffer only as bytes arrive
///
/// # Errors
///
/// Returns [`HeaderError::InvalidSize`] if the reader ends first.
fn read_block<R: Read>(reader: &mut R, len: u32) -> Result<Vec<u8>> {
    let mut block = Vec::new();
    let n_read = reader.by_ref().take(u64::from(len)).read_to_end(&mut block)?;
    if n_read != len as usize {
        return Err(HeaderError::InvalidSize(n_read, len as usize).into());
    }
    Ok(block)
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;
    use anyhow::Result;

    fn example_header() -> SamHeader {
        SamHeader::new(
            "@HD\tVN:1.6\tSO:coordinate\n",
            vec![Reference::new("chr1", 248_956_422), Reference::new("chr2", 242_193_529)],
        )
    }

    #[test]
    fn test_header_round_trip() -> Result<()> {
        let header = example_header();
        let mut buffer = Vec::new();
        header.write_bytes(&mut buffer)?;

        let parsed = SamHeader::from_reader(&mut buffer.as_slice())?;
        assert_eq!(parsed, header);

        let (parsed, consumed) = SamHeader::from_bytes(&buffer)?;
        assert_eq!(parsed, header);
        assert_eq!(consumed, buffer.len());
        Ok(())
    }

    #[test]
    fn test_invalid_magic() {
        let buffer = b"BSEQ\0\0\0\0\0\0\0\0";
        assert!(matches!(
            SamHeader::from_reader(&mut buffer.as_slice()),
            Err(Error::HeaderError(HeaderError::InvalidMagicNumber(_)))
        ));
    }

    #[test]
    fn test_truncated_header() -> Result<()> {
        let mut buffer = Vec::new();
        example_header().write_bytes(&mut buffer)?;
        buffer.truncate(buffer.len() - 3);
        assert!(matches!(
            SamHeader::from_bytes(&buffer),
            Err(Error::HeaderError(HeaderError::InvalidSize(..)))
        ));
        Ok(())
    }

    fn header_prefix(l_text: u32, n_ref: u32) -> Vec<u8> {
        let mut buffer = MAGIC.to_vec();
        buffer.extend_from_slice(&l_text.to_le_bytes());
        buffer.extend_from_slice(&n_ref.to_le_bytes());
        buffer
    }

    #[test]
    fn test_oversized_reference_count() {
        let buffer = header_prefix(0, u32::MAX);
        assert!(matches!(
            SamHeader::from_bytes(&buffer),
            Err(Error::HeaderError(HeaderError::InvalidSize(..)))
        ));
    }

    #[test]
    fn test_oversized_text_length() {
        let mut buffer = MAGIC.to_vec();
        buffer.extend_from_slice(&u32::MAX.to_le_bytes());
        buffer.extend_from_slice(b"@HD\tVN:1.6\n");
        assert!(matches!(
            SamHeader::from_reader(&mut buffer.as_slice()),
            Err(Error::HeaderError(HeaderError::InvalidSize(11, 4294967295)))
        ));
    }

    #[test]
    fn test_oversized_name_length() {
        let mut buffer = header_prefix(0, 1);
        buffer.extend_from_slice(&u32::MAX.to_le_bytes());
        buffer.extend_from_slice(b"chr1\0");
        assert!(matches!(
            SamHeader::from_reader(&mut buffer.as_slice()),
            Err(Error::HeaderError(HeaderError::InvalidSize(5, _)))
        ));
    }

    #[test]
    fn test_reference_lookup() {
        let header = example_header();
        assert_eq!(header.reference_name(1), Some("chr2"));
        assert_eq!(header.reference_name(-1), None);
        assert_eq!(header.reference_name(2), None);
        assert_eq!(header.reference_index("chr1"), Some(0));
        assert_eq!(header.reference_index("chrM"), None);
    }
}

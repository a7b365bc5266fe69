use std::fmt;

use super::RecordHandle;
use crate::error::{FieldError, ParseError, Result};

/// Nucleotide codes as stored in a 4-bit packed sequence
///
/// The codes are bit flags rather than sequential integers so that ambiguity codes can be
/// expressed as unions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Base {
    A = 1,
    C = 2,
    G = 4,
    T = 8,
    N = 15,
}
impl Base {
    /// Maps a 4-bit code to a base; codes outside of `{1, 2, 4, 8}` decode as `N`
    pub fn from_code(code: u8) -> Self {
        match code & 0xf {
            1 => Self::A,
            2 => Self::C,
            4 => Self::G,
            8 => Self::T,
            _ => Self::N,
        }
    }

    pub fn from_char(c: u8) -> Result<Self> {
        match c {
            b'A' | b'a' => Ok(Self::A),
            b'C' | b'c' => Ok(Self::C),
            b'G' | b'g' => Ok(Self::G),
            b'T' | b't' => Ok(Self::T),
            b'N' | b'n' => Ok(Self::N),
            _ => Err(ParseError::InvalidBase(c as char).into()),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::A => 'A',
            Self::C => 'C',
            Self::G => 'G',
            Self::T => 'T',
            Self::N => 'N',
        }
    }
}

/// Maps an element index to its byte offset and the shift selecting its nibble
///
/// Even indices live in the high nibble.
#[inline]
fn nibble_position(index: usize) -> (usize, u32) {
    (index >> 1, ((!index & 1) << 2) as u32)
}

/// Packs bases two per byte, high nibble first
pub(crate) fn pack_bases(bases: &[Base]) -> Vec<u8> {
    let mut packed = vec![0u8; bases.len().div_ceil(2)];
    for (idx, base) in bases.iter().enumerate() {
        let (byte, shift) = nibble_position(idx);
        packed[byte] |= (*base as u8) << shift;
    }
    packed
}

/// View of the 4-bit packed bases stored in a record
///
/// Reads and writes go through the shared record buffer; cloning the view deep-copies the
/// whole record.
#[derive(Debug, Clone)]
pub struct ReadBases {
    record: RecordHandle,
    offset: usize,
    num_bases: usize,
}
impl ReadBases {
    pub(crate) fn new(record: RecordHandle) -> Self {
        let (offset, num_bases) = record.with(|r| (r.bases_offset(), r.core.l_seq as usize));
        Self {
            record,
            offset,
            num_bases,
        }
    }

    /// Parses a base string into codes
    pub fn parse_string(bases: &str) -> Result<Vec<Base>> {
        bases.bytes().map(Base::from_char).collect()
    }

    pub fn len(&self) -> usize {
        self.num_bases
    }

    pub fn is_empty(&self) -> bool {
        self.num_bases == 0
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.num_bases {
            return Err(FieldError::IndexOutOfRange {
                index,
                size: self.num_bases,
            }
            .into());
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<Base> {
        self.check_index(index)?;
        let (byte, shift) = nibble_position(index);
        Ok(self
            .record
            .with(|r| Base::from_code(r.data[self.offset + byte] >> shift)))
    }

    /// Replaces a single base, leaving its neighbour in the same byte untouched
    pub fn set(&mut self, index: usize, base: Base) -> Result<()> {
        self.check_index(index)?;
        let (byte, shift) = nibble_position(index);
        let pos = self.offset + byte;
        self.record.with_mut(|r| {
            r.data[pos] = (r.data[pos] & !(0xf << shift)) | ((base as u8) << shift);
        });
        Ok(())
    }

    /// Decodes all bases
    pub fn bases(&self) -> Vec<Base> {
        self.record.with(|r| {
            (0..self.num_bases)
                .map(|idx| {
                    let (byte, shift) = nibble_position(idx);
                    Base::from_code(r.data[self.offset + byte] >> shift)
                })
                .collect()
        })
    }
}
impl PartialEq for ReadBases {
    fn eq(&self, other: &Self) -> bool {
        self.bases() == other.bases()
    }
}
impl fmt::Display for ReadBases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let decoded: String = self.bases().into_iter().map(Base::as_char).collect();
        f.write_str(&decoded)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::record::{RawRecord, SamCore};
    use anyhow::Result;

    fn bases_record(seq: &str) -> Result<ReadBases> {
        let bases = ReadBases::parse_string(seq)?;
        let core = SamCore {
            l_read_name: 1,
            l_seq: bases.len() as u32,
            ..SamCore::default()
        };
        let mut data = vec![0u8];
        data.extend(pack_bases(&bases));
        data.resize(data.len() + bases.len(), 30);
        Ok(ReadBases::new(RecordHandle::new(RawRecord::new(core, data))))
    }

    #[test]
    fn test_pack_nibble_order() {
        let packed = pack_bases(&[Base::A, Base::C, Base::G]);
        assert_eq!(packed, vec![0x12, 0x40]);
    }

    #[test]
    fn test_bases_odd_length() -> Result<()> {
        let view = bases_record("ACGTN")?;
        assert_eq!(view.len(), 5);
        assert_eq!(view.get(4)?, Base::N);
        assert_eq!(view.to_string(), "ACGTN");
        Ok(())
    }

    #[test]
    fn test_bases_set_keeps_neighbour() -> Result<()> {
        let mut view = bases_record("ACGT")?;
        view.set(1, Base::T)?;
        view.set(2, Base::A)?;
        assert_eq!(view.to_string(), "ATAT");
        Ok(())
    }

    #[test]
    fn test_bases_out_of_range() -> Result<()> {
        let view = bases_record("ACG")?;
        assert!(view.get(3).is_err());
        Ok(())
    }

    #[test]
    fn test_ambiguity_codes_decode_as_n() {
        // R = A|G
        assert_eq!(Base::from_code(5), Base::N);
        assert_eq!(Base::from_code(8), Base::T);
    }

    #[test]
    fn test_invalid_base() {
        assert!(ReadBases::parse_string("ACXT").is_err());
    }
}

use std::fmt;

use super::RecordHandle;
use crate::error::{DecodeError, FieldError, ParseError, Result};

/// A packed cigar element: the operator code in the low 4 bits, the run length above them
pub type CigarElement = u32;

const CIGAR_OP_SHIFT: u32 = 4;
const CIGAR_OP_MASK: u32 = 0xf;

/// Longest run a packed element can hold in the 28 bits above the operator
pub const MAX_CIGAR_OPLEN: u32 = (1 << (32 - CIGAR_OP_SHIFT)) - 1;

/// Operator letters indexed by their wire code
const CIGAR_OP_CHARS: &[u8; 10] = b"MIDNSHP=XB";

/// Alignment operators in wire order
///
/// The discriminants are the on-wire operator codes and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CigarOperator {
    M = 0,
    I = 1,
    D = 2,
    N = 3,
    S = 4,
    H = 5,
    P = 6,
    Eq = 7,
    X = 8,
    B = 9,
}
impl CigarOperator {
    const ALL: [Self; 10] = [
        Self::M,
        Self::I,
        Self::D,
        Self::N,
        Self::S,
        Self::H,
        Self::P,
        Self::Eq,
        Self::X,
        Self::B,
    ];

    pub fn from_code(code: u32) -> Result<Self> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or_else(|| DecodeError::InvalidCigarOperatorCode(code).into())
    }

    pub fn from_char(c: u8) -> Result<Self> {
        CIGAR_OP_CHARS
            .iter()
            .position(|&x| x == c)
            .map(|idx| Self::ALL[idx])
            .ok_or_else(|| ParseError::InvalidCigarOperator(c as char).into())
    }

    pub fn as_char(self) -> char {
        CIGAR_OP_CHARS[self as usize] as char
    }

    /// True for operators that advance along the reference (`M D N = X`)
    pub fn consumes_reference_bases(self) -> bool {
        matches!(self, Self::M | Self::D | Self::N | Self::Eq | Self::X)
    }

    /// True for operators that advance along the read (`M I S = X`)
    pub fn consumes_read_bases(self) -> bool {
        matches!(self, Self::M | Self::I | Self::S | Self::Eq | Self::X)
    }

    pub fn is_clipping(self) -> bool {
        matches!(self, Self::S | Self::H)
    }
}

/// Packs a run length and an operator into one element
///
/// `oplen` must not exceed [`MAX_CIGAR_OPLEN`]; higher bits are lost.
pub fn make_cigar_element(oplen: u32, op: CigarOperator) -> CigarElement {
    (oplen << CIGAR_OP_SHIFT) | op as u32
}

pub fn cigar_op(element: CigarElement) -> Result<CigarOperator> {
    CigarOperator::from_code(element & CIGAR_OP_MASK)
}

pub fn cigar_oplen(element: CigarElement) -> u32 {
    element >> CIGAR_OP_SHIFT
}

/// Writes elements in their canonical run-length form, e.g. `5M15I56M`
///
/// Operator codes without a letter are written as `?`.
pub fn cigar_to_string(elements: &[CigarElement]) -> String {
    let mut out = String::with_capacity(elements.len() * 4);
    let mut itoa_buf = itoa::Buffer::new();
    for &element in elements {
        out.push_str(itoa_buf.format(cigar_oplen(element)));
        out.push(
            CIGAR_OP_CHARS
                .get((element & CIGAR_OP_MASK) as usize)
                .map_or('?', |&c| c as char),
        );
    }
    out
}

/// Sums the run lengths of the elements whose operator satisfies `pred`
fn consumed_length(
    elements: impl IntoIterator<Item = CigarElement>,
    pred: impl Fn(CigarOperator) -> bool,
) -> usize {
    elements
        .into_iter()
        .filter(|&e| cigar_op(e).is_ok_and(&pred))
        .map(|e| cigar_oplen(e) as usize)
        .sum()
}

/// Number of read bases consumed by the elements
pub(crate) fn query_length(elements: &[CigarElement]) -> usize {
    consumed_length(elements.iter().copied(), CigarOperator::consumes_read_bases)
}

/// Number of reference bases consumed by the elements
pub(crate) fn reference_length(elements: &[CigarElement]) -> usize {
    consumed_length(elements.iter().copied(), CigarOperator::consumes_reference_bases)
}

/// View of the cigar stored in a record
///
/// The view aliases the record buffer: [`Cigar::set`] is visible to every other view of the
/// same record. Cloning the view deep-copies the whole record.
#[derive(Debug, Clone)]
pub struct Cigar {
    record: RecordHandle,
    offset: usize,
    num_elements: usize,
}
impl Cigar {
    pub(crate) fn new(record: RecordHandle) -> Self {
        let (offset, num_elements) =
            record.with(|r| (r.cigar_offset(), r.core.n_cigar as usize));
        Self {
            record,
            offset,
            num_elements,
        }
    }

    /// Parses a cigar string into packed elements
    ///
    /// This is the slowest way to obtain a cigar and should be avoided in hot loops.
    ///
    /// # Errors
    ///
    /// * [`ParseError::EmptyCigar`] if the string contains no operator
    /// * [`ParseError::InvalidCigarLength`] if an operator is not preceded by a run length, or
    ///   the run length exceeds [`MAX_CIGAR_OPLEN`]
    /// * [`ParseError::InvalidCigarOperator`] if an operator letter is not recognized
    pub fn parse_string(cigar: &str) -> Result<Vec<CigarElement>> {
        let bytes = cigar.as_bytes();
        let mut elements = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
            if digits == 0 || pos + digits == bytes.len() {
                // an operator letter without a length, or a trailing length without a letter
                if digits == 0 && !bytes[pos].is_ascii_alphabetic() && bytes[pos] != b'=' {
                    return Err(ParseError::InvalidCigarOperator(bytes[pos] as char).into());
                }
                return Err(ParseError::InvalidCigarLength(cigar.to_string()).into());
            }
            let oplen = cigar[pos..pos + digits]
                .parse::<u32>()
                .ok()
                .filter(|&len| len <= MAX_CIGAR_OPLEN)
                .ok_or_else(|| ParseError::InvalidCigarLength(cigar.to_string()))?;
            let op = CigarOperator::from_char(bytes[pos + digits])?;
            elements.push(make_cigar_element(oplen, op));
            pos += digits + 1;
        }
        if elements.is_empty() {
            return Err(ParseError::EmptyCigar(cigar.to_string()).into());
        }
        Ok(elements)
    }

    pub fn len(&self) -> usize {
        self.num_elements
    }

    pub fn is_empty(&self) -> bool {
        self.num_elements == 0
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.num_elements {
            return Err(FieldError::IndexOutOfRange {
                index,
                size: self.num_elements,
            }
            .into());
        }
        Ok(())
    }

    pub fn get(&self, index: usize) -> Result<CigarElement> {
        self.check_index(index)?;
        let start = self.offset + 4 * index;
        Ok(self.record.with(|r| {
            u32::from_le_bytes([
                r.data[start],
                r.data[start + 1],
                r.data[start + 2],
                r.data[start + 3],
            ])
        }))
    }

    /// Overwrites a single element in place
    pub fn set(&mut self, index: usize, element: CigarElement) -> Result<()> {
        self.check_index(index)?;
        let start = self.offset + 4 * index;
        self.record
            .with_mut(|r| r.data[start..start + 4].copy_from_slice(&element.to_le_bytes()));
        Ok(())
    }

    /// Copies all elements out of the record
    pub fn elements(&self) -> Vec<CigarElement> {
        self.record.with(|r| {
            r.data[self.offset..self.offset + 4 * self.num_elements]
                .chunks_exact(4)
                .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
                .collect()
        })
    }

    /// Number of read bases consumed by this cigar
    pub fn query_length(&self) -> usize {
        query_length(&self.elements())
    }

    /// Number of reference bases consumed by this cigar
    pub fn reference_length(&self) -> usize {
        reference_length(&self.elements())
    }
}
impl PartialEq for Cigar {
    fn eq(&self, other: &Self) -> bool {
        self.elements() == other.elements()
    }
}
impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&cigar_to_string(&self.elements()))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;
    use anyhow::Result;

    #[test]
    fn test_operator_order() -> Result<()> {
        for (code, c) in "MIDNSHP=XB".bytes().enumerate() {
            let op = CigarOperator::from_char(c)?;
            assert_eq!(op as u32, code as u32);
            assert_eq!(CigarOperator::from_code(code as u32)?, op);
        }
        assert!(CigarOperator::from_code(10).is_err());
        Ok(())
    }

    #[test]
    fn test_parse_string() -> Result<()> {
        let elements = Cigar::parse_string("5M15I56M")?;
        assert_eq!(
            elements,
            vec![
                make_cigar_element(5, CigarOperator::M),
                make_cigar_element(15, CigarOperator::I),
                make_cigar_element(56, CigarOperator::M),
            ]
        );
        assert_eq!(cigar_to_string(&elements), "5M15I56M");
        Ok(())
    }

    #[test]
    fn test_parse_round_trip() -> Result<()> {
        for s in ["1M", "5M15I56M", "3S10M2D4M1I6M7H", "10=2X3N1P"] {
            let parsed = Cigar::parse_string(s)?;
            assert_eq!(Cigar::parse_string(&cigar_to_string(&parsed))?, parsed);
        }
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Cigar::parse_string(""),
            Err(Error::ParseError(ParseError::EmptyCigar(_)))
        ));
        assert!(matches!(
            Cigar::parse_string("5M3Q"),
            Err(Error::ParseError(ParseError::InvalidCigarOperator('Q')))
        ));
        assert!(matches!(
            Cigar::parse_string("M"),
            Err(Error::ParseError(ParseError::InvalidCigarLength(_)))
        ));
        assert!(matches!(
            Cigar::parse_string("5M10"),
            Err(Error::ParseError(ParseError::InvalidCigarLength(_)))
        ));
    }

    #[test]
    fn test_run_length_limit() -> Result<()> {
        let longest = Cigar::parse_string("268435455M")?;
        assert_eq!(cigar_oplen(longest[0]), MAX_CIGAR_OPLEN);
        assert_eq!(cigar_to_string(&longest), "268435455M");
        for text in ["268435456M", "5M99999999999I"] {
            assert!(matches!(
                Cigar::parse_string(text),
                Err(Error::ParseError(ParseError::InvalidCigarLength(_)))
            ));
        }
        Ok(())
    }

    #[test]
    fn test_consumed_lengths() -> Result<()> {
        let elements = Cigar::parse_string("3S10M2D4M1I6M7H")?;
        assert_eq!(query_length(&elements), 3 + 10 + 4 + 1 + 6);
        assert_eq!(reference_length(&elements), 10 + 2 + 4 + 6);
        Ok(())
    }
}

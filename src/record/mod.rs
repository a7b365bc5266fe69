mod bases;
mod cigar;
mod core;
mod quals;
mod sam;

pub use bases::{Base, ReadBases};
pub use cigar::{
    cigar_op, cigar_oplen, cigar_to_string, make_cigar_element, Cigar, CigarElement,
    CigarOperator, MAX_CIGAR_OPLEN,
};
pub use core::{
    reg2bin, SamCore, SamFlags, FLAG_DUPLICATE, FLAG_FAIL, FLAG_FIRST, FLAG_LAST,
    FLAG_MATE_REVERSE, FLAG_MATE_UNMAPPED, FLAG_PAIRED, FLAG_PROPER_PAIR, FLAG_REVERSE,
    FLAG_SECONDARY, FLAG_SUPPLEMENTARY, FLAG_UNMAPPED, SIZE_CORE,
};
pub use quals::BaseQuals;
pub use sam::{Sam, MATE_CIGAR_TAG};

pub(crate) use bases::pack_bases;
pub(crate) use core::{one_based_position, zero_based_position};
pub(crate) use cigar::{query_length, reference_length};

use std::{cell::RefCell, rc::Rc};

use crate::error::{DecodeError, Result};

/// A complete alignment record: the fixed core followed by its variable-length data
///
/// The data block holds, in order: the null-terminated read name, the packed cigar, the
/// 4-bit packed bases, one quality byte per base, and finally the aux tag stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub core: SamCore,
    pub data: Vec<u8>,
}
impl RawRecord {
    pub fn new(core: SamCore, data: Vec<u8>) -> Self {
        Self { core, data }
    }

    /// Parses a record from its core and data bytes (without the leading block size)
    pub fn from_bytes(block: &[u8]) -> Result<Self> {
        let core = SamCore::from_bytes(block)?;
        let record = Self {
            core,
            data: block[SIZE_CORE..].to_vec(),
        };
        if record.aux_offset() > record.data.len() {
            return Err(DecodeError::UnexpectedEndOfRecord {
                needed: record.aux_offset(),
                available: record.data.len(),
            }
            .into());
        }
        Ok(record)
    }

    /// Byte length of the core plus data
    pub fn block_size(&self) -> usize {
        SIZE_CORE + self.data.len()
    }

    pub fn cigar_offset(&self) -> usize {
        self.core.l_read_name as usize
    }

    pub fn bases_offset(&self) -> usize {
        self.cigar_offset() + 4 * self.core.n_cigar as usize
    }

    pub fn quals_offset(&self) -> usize {
        self.bases_offset() + (self.core.l_seq as usize).div_ceil(2)
    }

    pub fn aux_offset(&self) -> usize {
        self.quals_offset() + self.core.l_seq as usize
    }

    /// The read name without its null terminator
    pub fn name_bytes(&self) -> &[u8] {
        let raw = &self.data[..self.cigar_offset().min(self.data.len())];
        let end = memchr::memchr(0, raw).unwrap_or(raw.len());
        &raw[..end]
    }

    pub fn aux_bytes(&self) -> &[u8] {
        &self.data[self.aux_offset().min(self.data.len())..]
    }
}

/// Reference-counted handle on a [`RawRecord`]
///
/// Several field views may alias one record through [`RecordHandle::share`]; mutations made
/// through any of them are visible to all. [`Clone`] on the other hand performs a deep copy of
/// the record bytes, which is expensive for large records.
///
/// The count is not atomic: a record and its views must stay on one thread.
#[derive(Debug, Default)]
pub struct RecordHandle(Rc<RefCell<RawRecord>>);
impl RecordHandle {
    pub fn new(record: RawRecord) -> Self {
        Self(Rc::new(RefCell::new(record)))
    }

    /// Returns a cheap alias of this handle
    pub fn share(&self) -> Self {
        Self(Rc::clone(&self.0))
    }

    /// Returns true if both handles alias the same record
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Applies `f` to the record
    pub fn with<T>(&self, f: impl FnOnce(&RawRecord) -> T) -> T {
        f(&self.0.borrow())
    }

    /// Applies `f` to the record with mutable access
    pub fn with_mut<T>(&self, f: impl FnOnce(&mut RawRecord) -> T) -> T {
        f(&mut self.0.borrow_mut())
    }

    pub fn core(&self) -> SamCore {
        self.0.borrow().core
    }

    /// Copies the record out of the handle
    pub fn to_raw(&self) -> RawRecord {
        self.0.borrow().clone()
    }
}
impl Clone for RecordHandle {
    fn clone(&self) -> Self {
        Self::new(self.to_raw())
    }
}

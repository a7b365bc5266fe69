//! # Record builder
//!
//! [`SamBuilder`] assembles a complete alignment record from individually set components.
//! Every variable-length component lives in its own [`DataField`] until [`SamBuilder::build`]
//! concatenates them, in record order, behind a freshly computed core.
//!
//! ## Example
//!
//! ```rust
//! use std::rc::Rc;
//! use htsrecord::{SamBuilder, SamHeader};
//!
//! # fn main() -> htsrecord::Result<()> {
//! let header = Rc::new(SamHeader::default());
//! let mut builder = SamBuilder::new(header, true);
//! builder
//!     .set_name("read1")?
//!     .set_cigar_str("4M")?
//!     .set_bases_str("ACGT")?
//!     .set_base_quals_slice(&[30, 30, 30, 30])?
//!     .add_integer_tag("NM", 0)?;
//! let record = builder.build()?;
//! assert_eq!(record.cigar().to_string(), "4M");
//! # Ok(())
//! # }
//! ```

mod data_field;

pub use data_field::DataField;

use std::rc::Rc;

use crate::{
    codec::ValueType,
    error::{BuilderError, Result, ValidationError},
    header::SamHeader,
    record::{
        pack_bases, query_length, reg2bin, zero_based_position, Base, BaseQuals, Cigar,
        CigarElement, RawRecord, ReadBases, Sam, SamCore, SamFlags, FLAG_DUPLICATE, FLAG_FAIL,
        FLAG_FIRST, FLAG_LAST, FLAG_MATE_REVERSE, FLAG_MATE_UNMAPPED, FLAG_PAIRED,
        FLAG_PROPER_PAIR, FLAG_REVERSE, FLAG_SECONDARY, FLAG_SUPPLEMENTARY, FLAG_UNMAPPED,
    },
    tags::{NumericArrayTag, TagSet},
};

/// Longest read name the one-byte name length can describe, terminator excluded
const MAX_NAME_LENGTH: usize = u8::MAX as usize - 1;

/// Bin computation parameters for alignment records
const BIN_MIN_SHIFT: u32 = 14;
const BIN_DEPTH: u32 = 5;

macro_rules! flag_setters {
    ($($set:ident, $unset:ident => $mask:expr;)*) => {
        $(
            pub fn $set(&mut self) -> Result<&mut Self> {
                self.toggle_core_flag($mask, true)
            }
            pub fn $unset(&mut self) -> Result<&mut Self> {
                self.toggle_core_flag($mask, false)
            }
        )*
    };
}

/// Builds alignment records from individually set components
///
/// Setters copy the data they are given, so the builder never aliases a record it was created
/// from. [`SamBuilder::build`] can be called any number of times; [`SamBuilder::build_once`]
/// moves the builder's buffers into the record and leaves the builder consumed, after which
/// every call fails with [`BuilderError::UseAfterConsume`].
#[derive(Debug, Clone)]
pub struct SamBuilder {
    header: Rc<SamHeader>,
    core: SamCore,
    name: DataField,
    cigar: DataField,
    bases: DataField,
    quals: DataField,
    tags: TagSet,
    validate_on_build: bool,
    consumed: bool,
}
impl SamBuilder {
    /// Creates a builder with empty components
    ///
    /// # Arguments
    ///
    /// * `header` - The header shared by every record the builder produces
    /// * `validate_on_build` - Whether [`SamBuilder::build`] checks the record for consistency
    pub fn new(header: Rc<SamHeader>, validate_on_build: bool) -> Self {
        Self {
            header,
            core: SamCore::default(),
            name: DataField::new(),
            cigar: DataField::new(),
            bases: DataField::new(),
            quals: DataField::new(),
            tags: TagSet::new(),
            validate_on_build,
            consumed: false,
        }
    }

    /// Creates a builder holding a copy of every component of `record`
    ///
    /// # Errors
    ///
    /// Returns a decode error if the aux tags of `record` cannot be parsed.
    pub fn from_record(record: &Sam, validate_on_build: bool) -> Result<Self> {
        Self::from_record_with_header(record.header(), record, validate_on_build)
    }

    /// Creates a builder holding a copy of every component of `record`, producing records
    /// under `header` instead of the header of `record`
    ///
    /// # Errors
    ///
    /// Returns a decode error if the aux tags of `record` cannot be parsed.
    pub fn from_record_with_header(
        header: Rc<SamHeader>,
        record: &Sam,
        validate_on_build: bool,
    ) -> Result<Self> {
        let mut builder = Self::new(header, validate_on_build);
        record.handle().with(|r| -> Result<()> {
            let name = r.name_bytes();
            let mut name_bytes = Vec::with_capacity(name.len() + 1);
            name_bytes.extend_from_slice(name);
            name_bytes.push(0);
            builder.name.update_owned(name_bytes, name.len());

            let n_cigar = r.core.n_cigar as usize;
            let l_seq = r.core.l_seq as usize;
            builder
                .cigar
                .update(&r.data[r.cigar_offset()..r.bases_offset()], n_cigar);
            builder
                .bases
                .update(&r.data[r.bases_offset()..r.quals_offset()], l_seq);
            builder
                .quals
                .update(&r.data[r.quals_offset()..r.aux_offset()], l_seq);
            builder.tags.import(r.aux_bytes())?;
            builder.core = r.core;
            Ok(())
        })?;
        Ok(builder)
    }

    fn ensure_live(&self) -> Result<()> {
        if self.consumed {
            return Err(BuilderError::UseAfterConsume.into());
        }
        Ok(())
    }

    fn toggle_core_flag(&mut self, mask: u16, on: bool) -> Result<&mut Self> {
        self.ensure_live()?;
        self.core.toggle_flag(mask, on);
        Ok(self)
    }

    pub fn header(&self) -> Rc<SamHeader> {
        Rc::clone(&self.header)
    }

    pub fn set_name(&mut self, name: &str) -> Result<&mut Self> {
        self.ensure_live()?;
        let mut bytes = Vec::with_capacity(name.len() + 1);
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0);
        self.name.update_owned(bytes, name.len());
        Ok(self)
    }

    /// Copies the cigar out of another record's view
    pub fn set_cigar(&mut self, cigar: &Cigar) -> Result<&mut Self> {
        self.set_cigar_elements(&cigar.elements())
    }

    pub fn set_cigar_elements(&mut self, elements: &[CigarElement]) -> Result<&mut Self> {
        self.ensure_live()?;
        let bytes = elements.iter().flat_map(|e| e.to_le_bytes()).collect();
        self.cigar.update_owned(bytes, elements.len());
        Ok(self)
    }

    /// Parses and sets a cigar string such as `5M15I56M`
    ///
    /// This is the slowest way to set a cigar.
    pub fn set_cigar_str(&mut self, cigar: &str) -> Result<&mut Self> {
        self.ensure_live()?;
        let elements = Cigar::parse_string(cigar)?;
        self.set_cigar_elements(&elements)
    }

    /// Copies the bases out of another record's view
    pub fn set_bases(&mut self, bases: &ReadBases) -> Result<&mut Self> {
        self.set_bases_slice(&bases.bases())
    }

    pub fn set_bases_slice(&mut self, bases: &[Base]) -> Result<&mut Self> {
        self.ensure_live()?;
        self.bases.update_owned(pack_bases(bases), bases.len());
        Ok(self)
    }

    /// Parses and sets a base string such as `ACGTN`
    pub fn set_bases_str(&mut self, bases: &str) -> Result<&mut Self> {
        self.ensure_live()?;
        let parsed = ReadBases::parse_string(bases)?;
        self.set_bases_slice(&parsed)
    }

    /// Copies the qualities out of another record's view
    pub fn set_base_quals(&mut self, quals: &BaseQuals) -> Result<&mut Self> {
        self.ensure_live()?;
        let quals = quals.to_vec();
        let len = quals.len();
        self.quals.update_owned(quals, len);
        Ok(self)
    }

    pub fn set_base_quals_slice(&mut self, quals: &[u8]) -> Result<&mut Self> {
        self.ensure_live()?;
        self.quals.update(quals, quals.len());
        Ok(self)
    }

    pub fn set_chromosome(&mut self, tid: i32) -> Result<&mut Self> {
        self.ensure_live()?;
        self.core.tid = tid;
        Ok(self)
    }

    /// Sets the 1-based alignment start
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::PositionOutOfRange`] if `start` exceeds `i32::MAX`.
    pub fn set_alignment_start(&mut self, start: u32) -> Result<&mut Self> {
        self.ensure_live()?;
        self.core.pos = zero_based_position(start)?;
        Ok(self)
    }

    pub fn set_mapping_qual(&mut self, mapq: u8) -> Result<&mut Self> {
        self.ensure_live()?;
        self.core.mapq = mapq;
        Ok(self)
    }

    pub fn set_insert_size(&mut self, insert_size: i32) -> Result<&mut Self> {
        self.ensure_live()?;
        self.core.insert_size = insert_size;
        Ok(self)
    }

    pub fn set_mate_chromosome(&mut self, tid: i32) -> Result<&mut Self> {
        self.ensure_live()?;
        self.core.mate_tid = tid;
        Ok(self)
    }

    /// Sets the 1-based alignment start of the mate
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::PositionOutOfRange`] if `start` exceeds `i32::MAX`.
    pub fn set_mate_alignment_start(&mut self, start: u32) -> Result<&mut Self> {
        self.ensure_live()?;
        self.core.mate_pos = zero_based_position(start)?;
        Ok(self)
    }

    flag_setters! {
        set_paired, set_not_paired => FLAG_PAIRED;
        set_properly_paired, set_not_properly_paired => FLAG_PROPER_PAIR;
        set_unmapped, set_not_unmapped => FLAG_UNMAPPED;
        set_mate_unmapped, set_not_mate_unmapped => FLAG_MATE_UNMAPPED;
        set_reverse, set_not_reverse => FLAG_REVERSE;
        set_mate_reverse, set_not_mate_reverse => FLAG_MATE_REVERSE;
        set_first, set_not_first => FLAG_FIRST;
        set_last, set_not_last => FLAG_LAST;
        set_secondary, set_not_secondary => FLAG_SECONDARY;
        set_fail, set_not_fail => FLAG_FAIL;
        set_duplicate, set_not_duplicate => FLAG_DUPLICATE;
        set_supplementary, set_not_supplementary => FLAG_SUPPLEMENTARY;
    }

    /// Removes every aux tag
    pub fn clear_tags(&mut self) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.clear();
        Ok(self)
    }

    /// Adds every tag of an encoded aux stream
    pub fn add_sam_tags(&mut self, aux: &[u8]) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.import(aux)?;
        Ok(self)
    }

    pub fn add_char_tag(&mut self, name: &str, value: u8) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.add_char(name, value);
        Ok(self)
    }

    /// Adds an integer tag, encoded in the narrowest width that holds `value`
    pub fn add_integer_tag(&mut self, name: &str, value: i64) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.add_integer(name, value);
        Ok(self)
    }

    pub fn add_float_tag(&mut self, name: &str, value: f32) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.add_float(name, value);
        Ok(self)
    }

    pub fn add_double_tag(&mut self, name: &str, value: f64) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.add_double(name, value);
        Ok(self)
    }

    pub fn add_string_tag(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.add_string(name, value);
        Ok(self)
    }

    /// Adds a byte array tag given as hex text
    pub fn add_byte_array_tag(&mut self, name: &str, value: &str) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.add_byte_array(name, value);
        Ok(self)
    }

    pub fn add_numeric_array_tag(
        &mut self,
        name: &str,
        value: NumericArrayTag,
    ) -> Result<&mut Self> {
        self.ensure_live()?;
        self.tags.add_numeric_array(name, value);
        Ok(self)
    }

    /// Convenience for integer arrays of a given element type
    pub fn add_integer_array_tag(
        &mut self,
        name: &str,
        element_type: ValueType,
        values: Vec<i64>,
    ) -> Result<&mut Self> {
        let tag = NumericArrayTag::integers(element_type, values)?;
        self.add_numeric_array_tag(name, tag)
    }

    /// Checks the record components for consistency
    ///
    /// # Errors
    ///
    /// * [`ValidationError::MissingRequiredField`] if the name, bases or qualities are empty,
    ///   or if a mapped record has no cigar
    /// * [`ValidationError::CigarLengthMismatch`] if the cigar of a mapped record does not
    ///   consume exactly the bases
    /// * [`ValidationError::BaseQualLengthMismatch`] if bases and qualities differ in count
    /// * [`ValidationError::InvalidTagName`] or [`ValidationError::IntegerTagRange`] for tags
    ///   that cannot be encoded
    pub fn validate(&self) -> Result<()> {
        self.ensure_live()?;
        if self.name.is_empty() {
            return Err(ValidationError::MissingRequiredField("name").into());
        }
        if self.bases.is_empty() {
            return Err(ValidationError::MissingRequiredField("bases").into());
        }
        if self.quals.is_empty() {
            return Err(ValidationError::MissingRequiredField("base qualities").into());
        }
        if !self.core.unmapped() {
            if self.cigar.is_empty() {
                return Err(ValidationError::MissingRequiredField("cigar").into());
            }
            let consumed = self.cigar_query_length();
            if consumed != self.bases.num_elements() {
                return Err(ValidationError::CigarLengthMismatch {
                    cigar: consumed,
                    bases: self.bases.num_elements(),
                }
                .into());
            }
        }
        if self.bases.num_elements() != self.quals.num_elements() {
            return Err(ValidationError::BaseQualLengthMismatch {
                bases: self.bases.num_elements(),
                quals: self.quals.num_elements(),
            }
            .into());
        }
        self.tags.validate()
    }

    fn cigar_query_length(&self) -> usize {
        let elements: Vec<CigarElement> = self
            .cigar
            .as_bytes()
            .chunks_exact(4)
            .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        query_length(&elements)
    }

    /// Validates if requested, then computes the core and the encoded tags of the record
    fn prepare(&self) -> Result<(SamCore, Vec<u8>)> {
        self.ensure_live()?;
        if self.validate_on_build {
            self.validate()?;
        }
        if self.name.num_elements() > MAX_NAME_LENGTH {
            return Err(ValidationError::NameTooLong(self.name.num_elements()).into());
        }
        let n_cigar = u16::try_from(self.cigar.num_elements())
            .map_err(|_| ValidationError::TooManyCigarElements(self.cigar.num_elements()))?;
        let aux = self.tags.serialize()?;

        let mut core = self.core;
        core.l_read_name = self.name.num_bytes() as u8;
        core.n_cigar = n_cigar;
        core.l_seq = self.bases.num_elements() as u32;
        let beg = i64::from(core.pos);
        core.bin = reg2bin(beg, beg + i64::from(core.l_seq), BIN_MIN_SHIFT, BIN_DEPTH) as u16;
        Ok((core, aux))
    }

    fn data_size(&self, aux: &[u8]) -> usize {
        self.name.num_bytes()
            + self.cigar.num_bytes()
            + self.bases.num_bytes()
            + self.quals.num_bytes()
            + aux.len()
    }

    /// Builds a record into a fresh buffer
    ///
    /// The builder is left untouched and can keep producing records.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if validation is enabled and fails, or if a component
    /// cannot be encoded.
    pub fn build(&self) -> Result<Sam> {
        let (core, aux) = self.prepare()?;
        let mut data = vec![0u8; self.data_size(&aux)];
        let mut cursor = self.name.copy_into(&mut data, 0);
        cursor = self.cigar.copy_into(&mut data, cursor);
        cursor = self.bases.copy_into(&mut data, cursor);
        cursor = self.quals.copy_into(&mut data, cursor);
        data[cursor..].copy_from_slice(&aux);
        log::trace!("Built record with {} data bytes", data.len());
        Ok(Sam::new(Rc::clone(&self.header), RawRecord::new(core, data)))
    }

    /// Builds a record by moving the builder's buffers into it
    ///
    /// The name buffer is grown in place to hold the whole record. Afterwards the builder is
    /// consumed and every further call fails with [`BuilderError::UseAfterConsume`].
    ///
    /// # Errors
    ///
    /// Same as [`SamBuilder::build`]. A failed build leaves the builder usable.
    pub fn build_once(&mut self) -> Result<Sam> {
        let (core, aux) = self.prepare()?;
        let total = self.data_size(&aux);
        let mut data = self.name.take();
        data.reserve_exact(total - data.len());
        data.extend_from_slice(&self.cigar.take());
        data.extend_from_slice(&self.bases.take());
        data.extend_from_slice(&self.quals.take());
        data.extend_from_slice(&aux);
        self.tags.clear();
        self.consumed = true;
        Ok(Sam::new(Rc::clone(&self.header), RawRecord::new(core, data)))
    }
}

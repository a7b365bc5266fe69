use std::{collections::BTreeMap, rc::Rc};

use super::{
    cigar_op, cigar_oplen, one_based_position, reference_length, zero_based_position, BaseQuals,
    Cigar, CigarElement, CigarOperator, RawRecord, ReadBases, RecordHandle, SamCore, SamFlags,
};
use crate::{
    error::{FieldError, Result},
    header::SamHeader,
    tags::{NumericArrayTag, SamTag, SamTagType, TagTable},
};

/// Name of the aux tag holding the cigar of the mate
pub const MATE_CIGAR_TAG: &str = "MC";

/// An alignment record together with the header it belongs to
///
/// The header is always shared. The record bytes are shared with every view handed out by
/// [`Sam::cigar`], [`Sam::bases`] and [`Sam::base_quals`] and with aliases created through
/// [`Sam::share`]; [`Clone`] deep-copies them.
#[derive(Debug, Clone)]
pub struct Sam {
    header: Rc<SamHeader>,
    record: RecordHandle,
}
impl Sam {
    /// Wraps a raw record
    pub fn new(header: Rc<SamHeader>, record: RawRecord) -> Self {
        Self {
            header,
            record: RecordHandle::new(record),
        }
    }

    /// Returns a cheap alias of this record
    ///
    /// Mutations through either alias are visible to both.
    pub fn share(&self) -> Self {
        Self {
            header: Rc::clone(&self.header),
            record: self.record.share(),
        }
    }

    pub fn header(&self) -> Rc<SamHeader> {
        Rc::clone(&self.header)
    }

    pub(crate) fn handle(&self) -> &RecordHandle {
        &self.record
    }

    /// Copies the raw core and data out of the record
    pub fn to_raw(&self) -> RawRecord {
        self.record.to_raw()
    }

    pub fn core(&self) -> SamCore {
        self.record.core()
    }

    pub fn name(&self) -> String {
        self.record
            .with(|r| String::from_utf8_lossy(r.name_bytes()).into_owned())
    }

    /// Chromosome index into the header references, `-1` when unplaced
    pub fn chromosome(&self) -> i32 {
        self.core().tid
    }

    /// 1-based leftmost aligned position
    pub fn alignment_start(&self) -> u32 {
        one_based_position(self.core().pos)
    }

    /// 1-based inclusive position of the last aligned reference base
    ///
    /// Unmapped records and records whose cigar does not consume the reference end where they
    /// start.
    pub fn alignment_stop(&self) -> u32 {
        let start = self.alignment_start();
        if self.unmapped() {
            return start;
        }
        span_stop(start, reference_length(&self.cigar_elements()))
    }

    /// Alignment start moved back over the clipped bases at the front of the cigar
    pub fn unclipped_start(&self) -> i64 {
        let clipped = leading_clip_length(&self.cigar_elements());
        i64::from(self.alignment_start()) - clipped
    }

    /// Alignment stop moved forward over the clipped bases at the end of the cigar
    pub fn unclipped_stop(&self) -> i64 {
        let mut elements = self.cigar_elements();
        elements.reverse();
        let clipped = leading_clip_length(&elements);
        i64::from(self.alignment_stop()) + clipped
    }

    pub fn mate_chromosome(&self) -> i32 {
        self.core().mate_tid
    }

    /// 1-based leftmost aligned position of the mate
    pub fn mate_alignment_start(&self) -> u32 {
        one_based_position(self.core().mate_pos)
    }

    /// 1-based inclusive alignment stop of the mate, computed from the [`MATE_CIGAR_TAG`] tag
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::MissingTag`] if the record does not carry the mate cigar, or a
    /// parse error if the tag does not hold a valid cigar.
    pub fn mate_alignment_stop(&self) -> Result<u32> {
        let elements = self.mate_cigar()?;
        Ok(span_stop(self.mate_alignment_start(), reference_length(&elements)))
    }

    /// Mate alignment start moved back over the clipped bases at the front of the mate cigar
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::MissingTag`] if the record does not carry the mate cigar.
    pub fn mate_unclipped_start(&self) -> Result<i64> {
        let elements = self.mate_cigar()?;
        Ok(i64::from(self.mate_alignment_start()) - leading_clip_length(&elements))
    }

    /// Mate alignment stop moved forward over the clipped bases at the end of the mate cigar
    ///
    /// Leading clips are skipped; every later element that consumes the reference or clips
    /// extends the stop.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::MissingTag`] if the record does not carry the mate cigar.
    pub fn mate_unclipped_stop(&self) -> Result<i64> {
        let elements = self.mate_cigar()?;
        let mut stop = i64::from(self.mate_alignment_start());
        let mut extended = false;
        let body = elements
            .iter()
            .skip_while(|&&e| cigar_op(e).is_ok_and(CigarOperator::is_clipping));
        for &element in body {
            let op = cigar_op(element)?;
            if op.consumes_reference_bases() || op.is_clipping() {
                stop += i64::from(cigar_oplen(element));
                extended = true;
            }
        }
        Ok(if extended { stop - 1 } else { stop })
    }

    fn mate_cigar(&self) -> Result<Vec<CigarElement>> {
        let tag = self
            .string_tag(MATE_CIGAR_TAG)?
            .ok_or_else(|| FieldError::MissingTag(MATE_CIGAR_TAG.to_string()))?;
        Cigar::parse_string(tag.value())
    }

    pub fn mapping_qual(&self) -> u8 {
        self.core().mapq
    }

    pub fn insert_size(&self) -> i32 {
        self.core().insert_size
    }

    pub fn set_chromosome(&mut self, tid: i32) {
        self.record.with_mut(|r| r.core.tid = tid);
    }

    /// Sets the 1-based alignment start
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValidationError::PositionOutOfRange`] if `start` exceeds `i32::MAX`.
    pub fn set_alignment_start(&mut self, start: u32) -> Result<()> {
        let pos = zero_based_position(start)?;
        self.record.with_mut(|r| r.core.pos = pos);
        Ok(())
    }

    pub fn set_mate_chromosome(&mut self, tid: i32) {
        self.record.with_mut(|r| r.core.mate_tid = tid);
    }

    /// Sets the 1-based mate alignment start
    ///
    /// # Errors
    ///
    /// Returns [`crate::ValidationError::PositionOutOfRange`] if `start` exceeds `i32::MAX`.
    pub fn set_mate_alignment_start(&mut self, start: u32) -> Result<()> {
        let pos = zero_based_position(start)?;
        self.record.with_mut(|r| r.core.mate_pos = pos);
        Ok(())
    }

    pub fn set_mapping_qual(&mut self, mapq: u8) {
        self.record.with_mut(|r| r.core.mapq = mapq);
    }

    pub fn set_insert_size(&mut self, insert_size: i32) {
        self.record.with_mut(|r| r.core.insert_size = insert_size);
    }

    /// Shared view of the cigar
    pub fn cigar(&self) -> Cigar {
        Cigar::new(self.record.share())
    }

    /// Shared view of the bases
    pub fn bases(&self) -> ReadBases {
        ReadBases::new(self.record.share())
    }

    /// Shared view of the base qualities
    pub fn base_quals(&self) -> BaseQuals {
        BaseQuals::new(self.record.share())
    }

    fn cigar_elements(&self) -> Vec<CigarElement> {
        self.cigar().elements()
    }

    /// Runs `f` over the parsed tag table and the raw aux bytes
    fn with_tags<T>(&self, f: impl FnOnce(&TagTable, &[u8]) -> Result<T>) -> Result<T> {
        self.record.with(|r| {
            let aux = r.aux_bytes();
            let table = TagTable::parse(aux)?;
            f(&table, aux)
        })
    }

    pub fn char_tag(&self, name: &str) -> Result<Option<SamTag<u8>>> {
        self.with_tags(|table, aux| table.char_value(aux, name))
            .map(|v| v.map(|value| SamTag::new(name, value)))
    }

    /// Any integer tag, widened to `i64`
    pub fn integer_tag(&self, name: &str) -> Result<Option<SamTag<i64>>> {
        self.with_tags(|table, aux| table.integer_value(aux, name))
            .map(|v| v.map(|value| SamTag::new(name, value)))
    }

    pub fn float_tag(&self, name: &str) -> Result<Option<SamTag<f32>>> {
        self.with_tags(|table, aux| table.float_value(aux, name))
            .map(|v| v.map(|value| SamTag::new(name, value)))
    }

    pub fn double_tag(&self, name: &str) -> Result<Option<SamTag<f64>>> {
        self.with_tags(|table, aux| table.double_value(aux, name))
            .map(|v| v.map(|value| SamTag::new(name, value)))
    }

    pub fn string_tag(&self, name: &str) -> Result<Option<SamTag<String>>> {
        self.with_tags(|table, aux| table.string_value(aux, name))
            .map(|v| v.map(|value| SamTag::new(name, value)))
    }

    /// Hex-encoded byte array tag, returned as its hex text
    pub fn byte_array_tag(&self, name: &str) -> Result<Option<SamTag<String>>> {
        self.with_tags(|table, aux| table.byte_array_value(aux, name))
            .map(|v| v.map(|value| SamTag::new(name, value)))
    }

    pub fn numeric_array_tag(&self, name: &str) -> Result<Option<SamTag<NumericArrayTag>>> {
        self.with_tags(|table, aux| table.numeric_array_value(aux, name))
            .map(|v| v.map(|value| SamTag::new(name, value)))
    }

    /// Name and type of every tag on the record
    pub fn all_tag_types(&self) -> Result<BTreeMap<String, SamTagType>> {
        self.with_tags(|table, _| Ok(table.tag_types()))
    }
}
impl SamFlags for Sam {
    fn flag(&self) -> u16 {
        self.core().flag
    }
    fn set_flag(&mut self, flag: u16) {
        self.record.with_mut(|r| r.core.flag = flag);
    }
}

/// 1-based inclusive stop of a span of `ref_len` reference bases, saturating at `u32::MAX`
fn span_stop(start: u32, ref_len: usize) -> u32 {
    match u32::try_from(ref_len) {
        Ok(0) => start,
        Ok(len) => start.saturating_add(len - 1),
        Err(_) => u32::MAX,
    }
}

/// Total length of the soft and hard clips at the front of the elements
fn leading_clip_length(elements: &[CigarElement]) -> i64 {
    elements
        .iter()
        .take_while(|&&e| cigar_op(e).is_ok_and(CigarOperator::is_clipping))
        .map(|&e| i64::from(cigar_oplen(e)))
        .sum()
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{
        builder::SamBuilder,
        header::Reference,
        record::{Base, FLAG_REVERSE},
        Error, ValidationError,
    };
    use anyhow::Result;

    fn header() -> Rc<SamHeader> {
        Rc::new(SamHeader::new(
            "",
            vec![Reference::new("chr1", 10_000), Reference::new("chr2", 10_000)],
        ))
    }

    fn record(cigar: &str, bases: &str) -> Result<Sam> {
        let quals = vec![30; bases.len()];
        let mut builder = SamBuilder::new(header(), true);
        builder
            .set_name("read1")?
            .set_chromosome(0)?
            .set_alignment_start(100)?
            .set_cigar_str(cigar)?
            .set_bases_str(bases)?
            .set_base_quals_slice(&quals)?;
        Ok(builder.build()?)
    }

    #[test]
    fn test_alignment_coordinates() -> Result<()> {
        let sam = record("2S5M2D3M1H", "AACGTACGTA")?;
        assert_eq!(sam.alignment_start(), 100);
        assert_eq!(sam.alignment_stop(), 100 + 10 - 1);
        assert_eq!(sam.unclipped_start(), 98);
        assert_eq!(sam.unclipped_stop(), 110);
        Ok(())
    }

    #[test]
    fn test_unmapped_stop_equals_start() -> Result<()> {
        let mut sam = record("4M", "ACGT")?;
        sam.set_unmapped();
        assert_eq!(sam.alignment_stop(), sam.alignment_start());
        Ok(())
    }

    #[test]
    fn test_mate_coordinates_from_tag() -> Result<()> {
        let mut builder = SamBuilder::from_record(&record("4M", "ACGT")?, true)?;
        builder
            .set_mate_alignment_start(200)?
            .add_string_tag(MATE_CIGAR_TAG, "3S10M2I5M4H")?;
        let sam = builder.build()?;
        assert_eq!(sam.mate_alignment_stop()?, 200 + 15 - 1);
        assert_eq!(sam.mate_unclipped_start()?, 197);
        assert_eq!(sam.mate_unclipped_stop()?, 200 + 15 + 4 - 1);
        Ok(())
    }

    #[test]
    fn test_mate_coordinates_without_tag() -> Result<()> {
        let sam = record("4M", "ACGT")?;
        assert!(matches!(
            sam.mate_alignment_stop(),
            Err(Error::FieldError(FieldError::MissingTag(_)))
        ));
        assert!(sam.mate_unclipped_start().is_err());
        assert!(sam.mate_unclipped_stop().is_err());
        Ok(())
    }

    #[test]
    fn test_shared_views_alias_record() -> Result<()> {
        let sam = record("4M", "ACGT")?;
        let mut bases = sam.bases();
        bases.set(0, Base::T)?;
        assert_eq!(sam.bases().to_string(), "TCGT");

        // a clone owns its own copy
        let copy = sam.clone();
        bases.set(1, Base::T)?;
        assert_eq!(copy.bases().to_string(), "TCGT");
        assert_eq!(sam.bases().to_string(), "TTGT");

        let mut alias = sam.share();
        alias.set_reverse();
        assert!(sam.has_flag(FLAG_REVERSE));
        assert!(!copy.reverse());
        Ok(())
    }

    #[test]
    fn test_tag_getters() -> Result<()> {
        let mut builder = SamBuilder::from_record(&record("4M", "ACGT")?, true)?;
        builder
            .add_integer_tag("NM", 0)?
            .add_char_tag("XA", b'x')?
            .add_double_tag("XD", 0.25)?
            .add_string_tag("RG", "group1")?;
        let sam = builder.build()?;

        let nm = sam.integer_tag("NM")?;
        assert_eq!(nm.map(SamTag::into_value), Some(0));
        assert!(sam.integer_tag("AS")?.is_none());
        assert_eq!(sam.char_tag("XA")?.map(SamTag::into_value), Some(b'x'));
        assert_eq!(sam.double_tag("XD")?.map(SamTag::into_value), Some(0.25));
        assert_eq!(
            sam.string_tag("RG")?.map(SamTag::into_value).as_deref(),
            Some("group1")
        );
        assert!(matches!(
            sam.integer_tag("RG"),
            Err(Error::FieldError(FieldError::TypeMismatch { .. }))
        ));

        let types = sam.all_tag_types()?;
        assert_eq!(types.len(), 4);
        assert_eq!(types.get("XD"), Some(&SamTagType::Double));
        Ok(())
    }

    #[test]
    fn test_core_setters() -> Result<()> {
        let mut sam = record("4M", "ACGT")?;
        sam.set_chromosome(1);
        sam.set_alignment_start(5)?;
        sam.set_mapping_qual(60);
        sam.set_insert_size(-150);
        sam.set_mate_chromosome(0);
        assert_eq!(sam.chromosome(), 1);
        assert_eq!(sam.header().reference_name(sam.chromosome()), Some("chr2"));
        assert_eq!(sam.alignment_start(), 5);
        assert_eq!(sam.mapping_qual(), 60);
        assert_eq!(sam.insert_size(), -150);
        assert_eq!(sam.mate_chromosome(), 0);
        assert_eq!(sam.name(), "read1");
        Ok(())
    }

    #[test]
    fn test_position_limits() -> Result<()> {
        let mut sam = record("4M", "ACGT")?;
        sam.set_alignment_start(i32::MAX as u32)?;
        assert_eq!(sam.alignment_start(), i32::MAX as u32);
        assert_eq!(sam.alignment_stop(), i32::MAX as u32 + 3);
        assert!(matches!(
            sam.set_alignment_start(u32::MAX),
            Err(Error::ValidationError(ValidationError::PositionOutOfRange(u32::MAX)))
        ));
        assert!(sam.set_mate_alignment_start(i32::MAX as u32 + 1).is_err());
        // a rejected start leaves the record untouched
        assert_eq!(sam.alignment_start(), i32::MAX as u32);
        assert_eq!(span_stop(u32::MAX - 1, 10), u32::MAX);
        Ok(())
    }
}

//! Variant records and the sources a multi-source merge reads from

use auto_impl::auto_impl;
use std::collections::VecDeque;

use crate::{
    error::Result,
    field::{IndividualField, SharedField},
};

/// Reference allele value marking an unknown reference
pub const MISSING_ALLELE: &str = ".";

/// Symbolic alternate alleles standing for "any allele other than the reference"
const NON_REF_ALLELES: [&str; 2] = ["<NON_REF>", "<*>"];

/// A variant site or reference block
///
/// Coordinates are 1-based and inclusive. Shared (INFO) and individual (FORMAT) fields are
/// keyed by their index in the id dictionary of the source header; at most one of each kind
/// is kept per index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    chromosome: u32,
    alignment_start: u32,
    alignment_stop: u32,
    ref_allele: String,
    alt_alleles: Vec<String>,
    shared_fields: Vec<SharedField>,
    individual_fields: Vec<IndividualField>,
}
impl Variant {
    /// Creates a variant spanning its reference allele
    pub fn new(
        chromosome: u32,
        alignment_start: u32,
        ref_allele: impl Into<String>,
        alt_alleles: Vec<String>,
    ) -> Self {
        let ref_allele = ref_allele.into();
        let span = if ref_allele == MISSING_ALLELE {
            1
        } else {
            u32::try_from(ref_allele.len().max(1)).unwrap_or(u32::MAX)
        };
        Self {
            chromosome,
            alignment_start,
            alignment_stop: alignment_start.saturating_add(span - 1),
            ref_allele,
            alt_alleles,
            shared_fields: Vec::new(),
            individual_fields: Vec::new(),
        }
    }

    /// Creates a reference block covering `[alignment_start, alignment_stop]`
    pub fn reference_block(
        chromosome: u32,
        alignment_start: u32,
        alignment_stop: u32,
        ref_allele: impl Into<String>,
    ) -> Self {
        Self {
            chromosome,
            alignment_start,
            alignment_stop,
            ref_allele: ref_allele.into(),
            alt_alleles: vec![NON_REF_ALLELES[0].to_string()],
            shared_fields: Vec::new(),
            individual_fields: Vec::new(),
        }
    }

    pub fn chromosome(&self) -> u32 {
        self.chromosome
    }

    pub fn alignment_start(&self) -> u32 {
        self.alignment_start
    }

    pub fn alignment_stop(&self) -> u32 {
        self.alignment_stop
    }

    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    pub fn alt_alleles(&self) -> &[String] {
        &self.alt_alleles
    }

    pub fn has_missing_ref(&self) -> bool {
        self.ref_allele.is_empty() || self.ref_allele == MISSING_ALLELE
    }

    /// True when the record carries no alternate allele other than a symbolic one
    pub fn is_reference_block(&self) -> bool {
        self.alt_alleles
            .iter()
            .all(|alt| NON_REF_ALLELES.contains(&alt.as_str()))
    }

    pub fn set_chromosome(&mut self, chromosome: u32) {
        self.chromosome = chromosome;
    }

    pub fn set_alignment_start(&mut self, start: u32) {
        self.alignment_start = start;
    }

    pub fn set_alignment_stop(&mut self, stop: u32) {
        self.alignment_stop = stop;
    }

    pub fn set_ref_allele(&mut self, ref_allele: impl Into<String>) {
        self.ref_allele = ref_allele.into();
    }

    pub fn set_alt_alleles(&mut self, alt_alleles: Vec<String>) {
        self.alt_alleles = alt_alleles;
    }

    pub fn shared_fields(&self) -> &[SharedField] {
        &self.shared_fields
    }

    pub fn individual_fields(&self) -> &[IndividualField] {
        &self.individual_fields
    }

    /// Adds a shared field, replacing any field with the same index
    pub fn add_shared_field(&mut self, field: SharedField) -> &mut Self {
        self.shared_fields
            .retain(|f| f.field_idx() != field.field_idx());
        self.shared_fields.push(field);
        self
    }

    /// Adds an individual field, replacing any field with the same index
    pub fn add_individual_field(&mut self, field: IndividualField) -> &mut Self {
        self.individual_fields
            .retain(|f| f.field_idx() != field.field_idx());
        self.individual_fields.push(field);
        self
    }

    pub fn shared_field(&self, field_idx: usize) -> Option<&SharedField> {
        self.shared_fields.iter().find(|f| f.field_idx() == field_idx)
    }

    pub fn individual_field(&self, field_idx: usize) -> Option<&IndividualField> {
        self.individual_fields
            .iter()
            .find(|f| f.field_idx() == field_idx)
    }

    /// Looks up a shared field by the id it is declared with in the INFO section of `header`
    pub fn shared_field_by_id(&self, header: &VariantHeader, id: &str) -> Option<&SharedField> {
        header
            .field_index(id, FieldCategory::Info)
            .and_then(|idx| self.shared_field(idx))
    }

    /// Looks up an individual field by the id it is declared with in the FORMAT section of
    /// `header`
    pub fn individual_field_by_id(
        &self,
        header: &VariantHeader,
        id: &str,
    ) -> Option<&IndividualField> {
        header
            .field_index(id, FieldCategory::Format)
            .and_then(|idx| self.individual_field(idx))
    }
}

/// Section of a variant header a field id is declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldCategory {
    Filter,
    Info,
    Format,
}
impl FieldCategory {
    fn mask(self) -> u8 {
        match self {
            Self::Filter => 0b001,
            Self::Info => 0b010,
            Self::Format => 0b100,
        }
    }
}

/// A field id and the header sections it is declared in
///
/// Filter, info and format fields share one id dictionary: an id declared in several sections
/// has a single index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    id: String,
    categories: u8,
}
impl HeaderField {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn has_category(&self, category: FieldCategory) -> bool {
        self.categories & category.mask() != 0
    }
}

/// Header of a variant source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantHeader {
    contigs: Vec<String>,
    fields: Vec<HeaderField>,
    samples: Vec<String>,
}
impl VariantHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a contig unless already declared and returns its index
    pub fn add_contig(&mut self, name: &str) -> usize {
        if let Some(idx) = self.contig_index(name) {
            return idx;
        }
        self.contigs.push(name.to_string());
        self.contigs.len() - 1
    }

    /// Declares a field id in a section and returns the id's index
    pub fn add_field(&mut self, id: &str, category: FieldCategory) -> usize {
        if let Some(idx) = self.fields.iter().position(|f| f.id == id) {
            self.fields[idx].categories |= category.mask();
            return idx;
        }
        self.fields.push(HeaderField {
            id: id.to_string(),
            categories: category.mask(),
        });
        self.fields.len() - 1
    }

    /// Appends a sample column and returns its index
    ///
    /// Duplicate names are kept: sample columns are positional.
    pub fn add_sample(&mut self, name: &str) -> usize {
        self.samples.push(name.to_string());
        self.samples.len() - 1
    }

    pub fn contigs(&self) -> &[String] {
        &self.contigs
    }

    pub fn contig_index(&self, name: &str) -> Option<usize> {
        self.contigs.iter().position(|c| c == name)
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// Index of a field id declared in `category`
    pub fn field_index(&self, id: &str, category: FieldCategory) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.id == id)
            .filter(|&idx| self.fields[idx].has_category(category))
    }

    /// Index of a field id in any section
    pub fn field_id_index(&self, id: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.id == id)
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Adds the contigs and fields of `other` that are not declared yet
    ///
    /// Samples are left alone; the header merger decides how sample columns combine.
    pub fn merge_definitions(&mut self, other: &VariantHeader) {
        for contig in &other.contigs {
            self.add_contig(contig);
        }
        for field in &other.fields {
            for category in [FieldCategory::Filter, FieldCategory::Info, FieldCategory::Format] {
                if field.has_category(category) {
                    self.add_field(&field.id, category);
                }
            }
        }
    }
}

/// A pull-based stream of variants sorted by chromosome and start
#[auto_impl(&mut, Box)]
pub trait VariantSource {
    fn header(&self) -> &VariantHeader;

    /// Returns the next variant, or `None` once the source is exhausted
    fn next_variant(&mut self) -> Option<Result<Variant>>;
}

/// In-memory variant source
#[derive(Debug, Default)]
pub struct VecSource {
    header: VariantHeader,
    records: VecDeque<Result<Variant>>,
}
impl VecSource {
    pub fn new(header: VariantHeader, variants: Vec<Variant>) -> Self {
        Self {
            header,
            records: variants.into_iter().map(Ok).collect(),
        }
    }

    /// Creates a source that may yield errors in between its variants
    pub fn from_results(header: VariantHeader, records: Vec<Result<Variant>>) -> Self {
        Self {
            header,
            records: records.into(),
        }
    }
}
impl VariantSource for VecSource {
    fn header(&self) -> &VariantHeader {
        &self.header
    }

    fn next_variant(&mut self) -> Option<Result<Variant>> {
        self.records.pop_front()
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::codec::ValueType;
    use anyhow::Result;

    #[test]
    fn test_variant_span() {
        let snp = Variant::new(0, 10, "A", vec!["C".to_string()]);
        assert_eq!(snp.alignment_stop(), 10);
        let deletion = Variant::new(0, 10, "ACG", vec!["A".to_string()]);
        assert_eq!(deletion.alignment_stop(), 12);
        let missing = Variant::new(0, 10, MISSING_ALLELE, vec![]);
        assert_eq!(missing.alignment_stop(), 10);
        assert!(missing.has_missing_ref());
    }

    #[test]
    fn test_span_saturates() {
        let variant = Variant::new(0, u32::MAX - 1, "ACGT", vec![]);
        assert_eq!(variant.alignment_stop(), u32::MAX);
    }

    #[test]
    fn test_fields_by_id() -> Result<()> {
        let mut header = VariantHeader::new();
        let dp = header.add_field("DP", FieldCategory::Info);
        header.add_field("DP", FieldCategory::Format);
        let gq = header.add_field("GQ", FieldCategory::Format);
        header.add_sample("NA1");
        header.add_sample("NA2");

        let mut variant = Variant::new(0, 10, "A", vec!["C".to_string()]);
        variant
            .add_shared_field(SharedField::integers(dp, ValueType::Int32, &[12])?)
            .add_individual_field(IndividualField::integers(dp, ValueType::Int16, 1, &[5, 7])?)
            .add_individual_field(IndividualField::integers(gq, ValueType::UInt8, 1, &[99, 20])?);

        let depth = variant.shared_field_by_id(&header, "DP");
        assert_eq!(depth.map(|f| f.integer(0)).transpose()?, Some(12));
        assert!(variant.shared_field_by_id(&header, "GQ").is_none());
        assert!(variant.individual_field_by_id(&header, "XX").is_none());

        let quality = variant.individual_field_by_id(&header, "GQ");
        assert_eq!(quality.map(|f| f.integer(1, 0)).transpose()?, Some(20));

        // adding a field with the same index replaces it
        variant.add_shared_field(SharedField::integers(dp, ValueType::Int32, &[40])?);
        assert_eq!(variant.shared_fields().len(), 1);
        assert_eq!(variant.shared_field(dp).map(|f| f.integer(0)).transpose()?, Some(40));
        Ok(())
    }

    #[test]
    fn test_reference_block() {
        let block = Variant::reference_block(0, 100, 500, "A");
        assert!(block.is_reference_block());
        assert_eq!(block.alignment_stop(), 500);
        let snp = Variant::new(0, 10, "A", vec!["C".to_string(), "<NON_REF>".to_string()]);
        assert!(!snp.is_reference_block());
    }

    #[test]
    fn test_shared_field_dictionary() {
        let mut header = VariantHeader::new();
        let dp_info = header.add_field("DP", FieldCategory::Info);
        let gq = header.add_field("GQ", FieldCategory::Format);
        let dp_format = header.add_field("DP", FieldCategory::Format);
        assert_eq!(dp_info, dp_format);
        assert_ne!(dp_info, gq);
        assert_eq!(header.field_index("DP", FieldCategory::Format), Some(0));
        assert_eq!(header.field_index("GQ", FieldCategory::Info), None);
        assert_eq!(header.field_id_index("GQ"), Some(1));
    }

    #[test]
    fn test_vec_source_drains() {
        let mut source = VecSource::new(
            VariantHeader::new(),
            vec![Variant::new(0, 1, "A", vec![]), Variant::new(0, 2, "C", vec![])],
        );
        assert!(source.next_variant().is_some_and(|r| r.is_ok()));
        assert!(source.next_variant().is_some());
        assert!(source.next_variant().is_none());
    }
}

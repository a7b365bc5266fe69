//! # Variant header merging
//!
//! [`VariantHeaderMerger`] combines the headers of several variant sources into one merged
//! header and keeps lookup tables translating field and sample indices between each source
//! and the merged header.

use std::collections::{hash_map::Entry, HashMap};

use crate::{
    lut::{LutLayout, MergedLut},
    variant::VariantHeader,
};

/// Number of sources the lookup tables are sized for initially
pub const DEFAULT_NUM_INPUTS: usize = 10;
/// Number of merged field ids the lookup tables are sized for initially
pub const DEFAULT_NUM_FIELDS: usize = 30;
/// Number of merged samples the lookup tables are sized for initially
pub const DEFAULT_NUM_SAMPLES: usize = 10;
/// Number of caller-defined field enums the enum table is sized for initially
pub const DEFAULT_NUM_ENUMS: usize = 30;

/// Headroom added to the field tables when the merged header outgrows them
const FIELD_GROWTH: usize = 20;

/// Layouts of the lookup tables held by a [`VariantHeaderMerger`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergerLayout {
    pub fields_forward: LutLayout,
    pub fields_reverse: LutLayout,
    pub samples_forward: LutLayout,
    pub samples_reverse: LutLayout,
}
impl MergerLayout {
    /// Uses the same layout for every table
    pub fn uniform(layout: LutLayout) -> Self {
        Self {
            fields_forward: layout,
            fields_reverse: layout,
            samples_forward: layout,
            samples_reverse: layout,
        }
    }
}

/// Incrementally merges variant headers and maps indices between inputs and the merged header
///
/// Samples are matched by name: a sample name seen in several inputs maps to one merged sample.
#[derive(Debug, Clone)]
pub struct VariantHeaderMerger {
    merged_header: VariantHeader,
    num_inputs: usize,
    fields_lut: MergedLut,
    samples_lut: MergedLut,
    /// Row 0 maps caller-defined enums to merged field indices
    enum_lut: MergedLut,
    sample_to_merged_idx: HashMap<String, usize>,
    num_inputs_allocated: usize,
    num_fields_allocated: usize,
    num_samples_allocated: usize,
    num_enums_allocated: usize,
}
impl Default for VariantHeaderMerger {
    fn default() -> Self {
        Self::new(MergerLayout::default())
    }
}
impl VariantHeaderMerger {
    pub fn new(layout: MergerLayout) -> Self {
        Self {
            merged_header: VariantHeader::new(),
            num_inputs: 0,
            fields_lut: MergedLut::new(
                DEFAULT_NUM_INPUTS,
                DEFAULT_NUM_FIELDS,
                layout.fields_forward,
                layout.fields_reverse,
            ),
            samples_lut: MergedLut::new(
                DEFAULT_NUM_INPUTS,
                DEFAULT_NUM_SAMPLES,
                layout.samples_forward,
                layout.samples_reverse,
            ),
            enum_lut: MergedLut::new(
                1,
                DEFAULT_NUM_ENUMS.max(DEFAULT_NUM_FIELDS),
                LutLayout::SourceMajor,
                LutLayout::SourceMajor,
            ),
            sample_to_merged_idx: HashMap::new(),
            num_inputs_allocated: DEFAULT_NUM_INPUTS,
            num_fields_allocated: DEFAULT_NUM_FIELDS,
            num_samples_allocated: DEFAULT_NUM_SAMPLES,
            num_enums_allocated: DEFAULT_NUM_ENUMS,
        }
    }

    /// Creates a merger and adds every header of `headers`, in order
    pub fn from_headers<'a>(
        headers: impl IntoIterator<Item = &'a VariantHeader>,
        layout: MergerLayout,
    ) -> Self {
        let mut merger = Self::new(layout);
        merger.add_headers(headers);
        merger
    }

    /// Merges a header and records its field and sample mappings
    ///
    /// The header becomes input number [`VariantHeaderMerger::num_inputs`] (before the call).
    pub fn add_header(&mut self, header: &VariantHeader) {
        let input = self.num_inputs;
        self.num_inputs += 1;
        self.merged_header.merge_definitions(header);
        self.add_new_samples(header, input);
        self.resize_luts_if_needed(header.n_samples());

        self.add_fields_mapping(header, input);
        self.add_samples_mapping(header, input);
        log::debug!(
            "Merged header of input {input}: {} fields, {} samples in merged header",
            self.merged_header.fields().len(),
            self.merged_header.n_samples()
        );
    }

    pub fn add_headers<'a>(&mut self, headers: impl IntoIterator<Item = &'a VariantHeader>) {
        for header in headers {
            self.add_header(header);
        }
    }

    fn add_fields_mapping(&mut self, header: &VariantHeader, input: usize) {
        for (input_idx, field) in header.fields().iter().enumerate() {
            let Some(merged_idx) = self.merged_header.field_id_index(field.id()) else {
                continue;
            };
            // the tables were grown to fit the merged header
            if let Err(e) = self
                .fields_lut
                .add_input_merged_idx_pair(input, input_idx, merged_idx)
            {
                log::warn!("Unable to map field {} of input {input}: {e}", field.id());
            }
        }
    }

    /// Appends the samples of `header` not seen in any earlier input to the merged header
    fn add_new_samples(&mut self, header: &VariantHeader, input: usize) {
        for sample in header.samples() {
            match self.sample_to_merged_idx.entry(sample.clone()) {
                Entry::Occupied(entry) => log::debug!(
                    "Sample {sample} of input {input} collapses onto merged sample {}",
                    entry.get()
                ),
                Entry::Vacant(entry) => {
                    entry.insert(self.merged_header.add_sample(sample));
                }
            }
        }
    }

    fn add_samples_mapping(&mut self, header: &VariantHeader, input: usize) {
        for (input_idx, sample) in header.samples().iter().enumerate() {
            let Some(&merged_idx) = self.sample_to_merged_idx.get(sample) else {
                continue;
            };
            if let Err(e) = self
                .samples_lut
                .add_input_merged_idx_pair(input, input_idx, merged_idx)
            {
                log::warn!("Unable to map sample {sample} of input {input}: {e}");
            }
        }
    }

    /// Grows every table to fit the merged header and the inputs seen so far
    fn resize_luts_if_needed(&mut self, input_samples: usize) {
        let num_fields = self.merged_header.fields().len();
        if self.num_fields_allocated < num_fields {
            self.num_fields_allocated = num_fields + FIELD_GROWTH;
        }
        if self.num_inputs_allocated < self.num_inputs {
            self.num_inputs_allocated = 2 * self.num_inputs;
        }
        // inputs repeating a sample name have more sample columns than merged samples
        let num_samples = self.merged_header.n_samples().max(input_samples);
        if self.num_samples_allocated < num_samples {
            self.num_samples_allocated = 2 * num_samples;
        }
        self.fields_lut
            .resize_luts_if_needed(self.num_inputs_allocated, self.num_fields_allocated);
        self.samples_lut
            .resize_luts_if_needed(self.num_inputs_allocated, self.num_samples_allocated);
        self.enum_lut.resize_luts_if_needed(1, self.num_fields_allocated);
    }

    pub fn merged_header(&self) -> &VariantHeader {
        &self.merged_header
    }

    /// Number of headers added so far
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    /// Merged index of sample `sample_idx` of `input`, or [`crate::LUT_MISSING_VALUE`]
    pub fn get_merged_sample_idx_for_input(&self, input: usize, sample_idx: usize) -> i32 {
        self.samples_lut.get_merged_idx_for_input(input, sample_idx)
    }

    /// Merged index of field `field_idx` of `input`, or [`crate::LUT_MISSING_VALUE`]
    pub fn get_merged_header_idx_for_input(&self, input: usize, field_idx: usize) -> i32 {
        self.fields_lut.get_merged_idx_for_input(input, field_idx)
    }

    /// Index in `input` of merged sample `merged_idx`, or [`crate::LUT_MISSING_VALUE`]
    pub fn get_input_sample_idx_for_merged(&self, input: usize, merged_idx: usize) -> i32 {
        self.samples_lut.get_input_idx_for_merged(input, merged_idx)
    }

    /// Index in `input` of merged field `merged_idx`, or [`crate::LUT_MISSING_VALUE`]
    pub fn get_input_header_idx_for_merged(&self, input: usize, merged_idx: usize) -> i32 {
        self.fields_lut.get_input_idx_for_merged(input, merged_idx)
    }

    /// Associates a caller-defined enum value with the merged index of a field id
    ///
    /// Ids absent from the merged header leave the enum unmapped.
    pub fn store_merged_field_idx_for_enum(&mut self, field_name: &str, field_enum: usize) {
        if field_enum >= self.num_enums_allocated {
            self.num_enums_allocated = 2 * field_enum + 1;
            self.enum_lut.resize_luts_if_needed(1, self.num_enums_allocated);
        }
        let result = match self.merged_header.field_id_index(field_name) {
            Some(merged_idx) => self.enum_lut.add_input_merged_idx_pair(0, field_enum, merged_idx),
            None => self.enum_lut.reset_merged_idx_for_input(0, field_enum),
        };
        if let Err(e) = result {
            log::warn!("Unable to store enum {field_enum} for field {field_name}: {e}");
        }
    }

    /// Merged field index stored for `field_enum`, or [`crate::LUT_MISSING_VALUE`]
    pub fn get_merged_field_idx_for_enum(&self, field_enum: usize) -> i32 {
        self.enum_lut.get_merged_idx_for_input(0, field_enum)
    }

    /// Enum stored for merged field `merged_idx`, or [`crate::LUT_MISSING_VALUE`]
    pub fn get_enum_for_merged_field_idx(&self, merged_idx: usize) -> i32 {
        self.enum_lut.get_input_idx_for_merged(0, merged_idx)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::{lut::LUT_MISSING_VALUE, variant::FieldCategory};

    fn header(fields: &[(&str, FieldCategory)], samples: &[&str]) -> VariantHeader {
        let mut header = VariantHeader::new();
        header.add_contig("chr1");
        for (id, category) in fields {
            header.add_field(id, *category);
        }
        for sample in samples {
            header.add_sample(sample);
        }
        header
    }

    #[test]
    fn test_field_mapping() {
        for layout in [LutLayout::SourceMajor, LutLayout::FieldMajor] {
            let first = header(
                &[("PASS", FieldCategory::Filter), ("DP", FieldCategory::Info)],
                &[],
            );
            let second = header(
                &[("GQ", FieldCategory::Format), ("DP", FieldCategory::Format)],
                &[],
            );
            let merger =
                VariantHeaderMerger::from_headers([&first, &second], MergerLayout::uniform(layout));

            let merged = merger.merged_header();
            assert_eq!(merged.fields().len(), 3);
            assert_eq!(merged.field_index("DP", FieldCategory::Format), Some(1));
            assert_eq!(merger.get_merged_header_idx_for_input(1, 0), 2);
            assert_eq!(merger.get_merged_header_idx_for_input(1, 1), 1);
            assert_eq!(merger.get_input_header_idx_for_merged(1, 2), 0);
            assert_eq!(merger.get_input_header_idx_for_merged(1, 0), LUT_MISSING_VALUE);
            assert_eq!(merger.get_input_header_idx_for_merged(0, 1), 1);
        }
    }

    #[test]
    fn test_duplicate_samples_collapse() {
        let first = header(&[], &["NA1", "NA2"]);
        let second = header(&[], &["NA3", "NA1"]);
        let merger = VariantHeaderMerger::from_headers([&first, &second], MergerLayout::default());

        assert_eq!(merger.merged_header().samples(), &["NA1", "NA2", "NA3"]);
        assert_eq!(merger.get_merged_sample_idx_for_input(1, 0), 2);
        assert_eq!(merger.get_merged_sample_idx_for_input(1, 1), 0);
        assert_eq!(merger.get_input_sample_idx_for_merged(1, 0), 1);
        assert_eq!(merger.get_input_sample_idx_for_merged(1, 1), LUT_MISSING_VALUE);
        assert_eq!(merger.num_inputs(), 2);
    }

    #[test]
    fn test_tables_grow_with_inputs() {
        let mut merger = VariantHeaderMerger::default();
        let samples: Vec<String> = (0..25).map(|idx| format!("S{idx}")).collect();
        let sample_refs: Vec<&str> = samples.iter().map(String::as_str).collect();
        let ids: Vec<String> = (0..40).map(|idx| format!("F{idx}")).collect();
        let fields: Vec<_> = ids.iter().map(|id| (id.as_str(), FieldCategory::Info)).collect();

        for _ in 0..(DEFAULT_NUM_INPUTS + 2) {
            merger.add_header(&header(&fields, &sample_refs));
        }
        let last = DEFAULT_NUM_INPUTS + 1;
        assert_eq!(merger.num_inputs(), last + 1);
        assert_eq!(merger.get_merged_sample_idx_for_input(last, 24), 24);
        assert_eq!(merger.get_merged_header_idx_for_input(last, 39), 39);
        assert_eq!(merger.get_merged_header_idx_for_input(0, 39), 39);
    }

    #[test]
    fn test_repeated_sample_within_input() {
        let merger = VariantHeaderMerger::from_headers(
            [&header(&[], &["A", "A", "A", "A", "A", "A", "A", "A", "A", "A", "A", "A"])],
            MergerLayout::default(),
        );
        assert_eq!(merger.merged_header().n_samples(), 1);
        assert_eq!(merger.get_merged_sample_idx_for_input(0, 11), 0);
    }

    #[test]
    fn test_field_enums() {
        let mut merger = VariantHeaderMerger::from_headers(
            [&header(
                &[("DP", FieldCategory::Info), ("GQ", FieldCategory::Format)],
                &[],
            )],
            MergerLayout::default(),
        );
        merger.store_merged_field_idx_for_enum("GQ", 0);
        merger.store_merged_field_idx_for_enum("MISSING", 1);
        merger.store_merged_field_idx_for_enum("DP", 45);

        assert_eq!(merger.get_merged_field_idx_for_enum(0), 1);
        assert_eq!(merger.get_merged_field_idx_for_enum(1), LUT_MISSING_VALUE);
        assert_eq!(merger.get_merged_field_idx_for_enum(45), 0);
        assert_eq!(merger.get_enum_for_merged_field_idx(1), 0);
    }
}

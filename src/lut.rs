//! # Merge lookup tables
//!
//! A [`MergedLut`] records, for every input source, how the indices of that source (header
//! fields, samples, alleles) correspond to indices in a merged index space. It holds two dense
//! tables: one from input indices to merged indices and one in the other direction.
//!
//! Each table can be laid out with one row per source or one row per field; both layouts
//! answer every lookup identically and only differ in which accesses are contiguous.

use std::ops::{Deref, DerefMut};

use crate::error::{FieldError, Result};

/// Value of every cell with no recorded mapping
pub const LUT_MISSING_VALUE: i32 = -1;

/// Number of alleles an [`AllelesLut`] is sized for initially
pub const DEFAULT_NUM_ALLELES: usize = 10;

/// Physical layout of a lookup table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LutLayout {
    /// One row per input source: `table[input][field]`
    #[default]
    SourceMajor,
    /// One row per field: `table[field][input]`
    FieldMajor,
}

/// Dense `num_inputs x num_fields` table of indices
#[derive(Debug, Clone, PartialEq, Eq)]
struct LutTable {
    layout: LutLayout,
    rows: Vec<Vec<i32>>,
}
impl LutTable {
    fn new(layout: LutLayout, num_inputs: usize, num_fields: usize) -> Self {
        let mut table = Self {
            layout,
            rows: Vec::new(),
        };
        table.grow(num_inputs, num_fields);
        table
    }

    /// Maps a logical `(input, field)` cell to `(row, column)`
    fn position(&self, input: usize, field: usize) -> (usize, usize) {
        match self.layout {
            LutLayout::SourceMajor => (input, field),
            LutLayout::FieldMajor => (field, input),
        }
    }

    fn dims(&self) -> (usize, usize) {
        (self.rows.len(), self.rows.first().map_or(0, Vec::len))
    }

    fn get(&self, input: usize, field: usize) -> i32 {
        let (row, col) = self.position(input, field);
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .copied()
            .unwrap_or(LUT_MISSING_VALUE)
    }

    fn set(&mut self, input: usize, field: usize, value: i32) -> Result<()> {
        let (row, col) = self.position(input, field);
        let (n_rows, n_cols) = self.dims();
        let cell = self
            .rows
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(FieldError::IndexOutOfRange {
                index: if row >= n_rows { row } else { col },
                size: if row >= n_rows { n_rows } else { n_cols },
            })?;
        *cell = value;
        Ok(())
    }

    fn reset(&mut self) {
        for row in &mut self.rows {
            row.fill(LUT_MISSING_VALUE);
        }
    }

    /// Grows the table to hold at least `num_inputs x num_fields` cells
    ///
    /// Existing cells keep their values; new cells are missing. Tables never shrink.
    fn grow(&mut self, num_inputs: usize, num_fields: usize) {
        let (want_rows, want_cols) = match self.layout {
            LutLayout::SourceMajor => (num_inputs, num_fields),
            LutLayout::FieldMajor => (num_fields, num_inputs),
        };
        let (n_rows, n_cols) = self.dims();
        let n_cols = n_cols.max(want_cols);
        if want_rows > n_rows {
            self.rows.resize_with(want_rows, Vec::new);
        }
        for row in &mut self.rows {
            if row.len() < n_cols {
                row.resize(n_cols, LUT_MISSING_VALUE);
            }
        }
    }
}

/// Bidirectional mapping between the indices of several inputs and a merged index space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedLut {
    /// `input index -> merged index`, per input
    forward: LutTable,
    /// `merged index -> input index`, per input
    reverse: LutTable,
    num_inputs: usize,
    num_fields: usize,
}
impl MergedLut {
    /// Creates tables for `num_inputs` sources and `num_fields` indices, all missing
    ///
    /// # Arguments
    ///
    /// * `num_inputs` - Number of input sources
    /// * `num_fields` - Number of indices per source, in both index spaces
    /// * `forward_layout` - Layout of the input to merged table
    /// * `reverse_layout` - Layout of the merged to input table
    pub fn new(
        num_inputs: usize,
        num_fields: usize,
        forward_layout: LutLayout,
        reverse_layout: LutLayout,
    ) -> Self {
        Self {
            forward: LutTable::new(forward_layout, num_inputs, num_fields),
            reverse: LutTable::new(reverse_layout, num_inputs, num_fields),
            num_inputs,
            num_fields,
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    pub fn is_missing(value: i32) -> bool {
        value == LUT_MISSING_VALUE
    }

    /// Records that index `input_idx` of `input` is index `merged_idx` in the merged space
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::IndexOutOfRange`] if either index lies outside the tables.
    pub fn add_input_merged_idx_pair(
        &mut self,
        input: usize,
        input_idx: usize,
        merged_idx: usize,
    ) -> Result<()> {
        self.forward.set(input, input_idx, merged_idx as i32)?;
        self.reverse.set(input, merged_idx, input_idx as i32)
    }

    /// Merged index of index `input_idx` of `input`, or [`LUT_MISSING_VALUE`]
    pub fn get_merged_idx_for_input(&self, input: usize, input_idx: usize) -> i32 {
        self.forward.get(input, input_idx)
    }

    /// Index in `input` of merged index `merged_idx`, or [`LUT_MISSING_VALUE`]
    pub fn get_input_idx_for_merged(&self, input: usize, merged_idx: usize) -> i32 {
        self.reverse.get(input, merged_idx)
    }

    /// Forgets the merged index of index `input_idx` of `input`
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::IndexOutOfRange`] if the cell lies outside the table.
    pub fn reset_merged_idx_for_input(&mut self, input: usize, input_idx: usize) -> Result<()> {
        self.forward.set(input, input_idx, LUT_MISSING_VALUE)
    }

    /// Forgets the index in `input` of merged index `merged_idx`
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::IndexOutOfRange`] if the cell lies outside the table.
    pub fn reset_input_idx_for_merged(&mut self, input: usize, merged_idx: usize) -> Result<()> {
        self.reverse.set(input, merged_idx, LUT_MISSING_VALUE)
    }

    /// Marks every mapping as missing, keeping the table sizes
    pub fn reset_luts(&mut self) {
        self.forward.reset();
        self.reverse.reset();
    }

    /// Grows both tables to hold at least `num_inputs x num_fields` cells
    ///
    /// Existing mappings are preserved and new cells are missing.
    pub fn resize_luts_if_needed(&mut self, num_inputs: usize, num_fields: usize) {
        if num_inputs <= self.num_inputs && num_fields <= self.num_fields {
            return;
        }
        self.num_inputs = self.num_inputs.max(num_inputs);
        self.num_fields = self.num_fields.max(num_fields);
        self.forward.grow(self.num_inputs, self.num_fields);
        self.reverse.grow(self.num_inputs, self.num_fields);
        log::debug!(
            "Resized lookup tables to {} inputs x {} fields",
            self.num_inputs,
            self.num_fields
        );
    }
}

/// Lookup table between the alleles of each input and the merged alleles of a site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllelesLut {
    lut: MergedLut,
    max_num_alleles: usize,
}
impl AllelesLut {
    pub fn new(num_inputs: usize, forward_layout: LutLayout, reverse_layout: LutLayout) -> Self {
        Self {
            lut: MergedLut::new(
                num_inputs,
                DEFAULT_NUM_ALLELES,
                forward_layout,
                reverse_layout,
            ),
            max_num_alleles: DEFAULT_NUM_ALLELES,
        }
    }

    pub fn max_num_alleles(&self) -> usize {
        self.max_num_alleles
    }

    /// Grows the tables when a site has more merged alleles than they can hold
    pub fn resize_luts_if_needed(&mut self, num_merged_alleles: usize) {
        if num_merged_alleles > self.max_num_alleles {
            let num_inputs = self.lut.num_inputs();
            self.lut
                .resize_luts_if_needed(num_inputs, num_merged_alleles);
            self.max_num_alleles = num_merged_alleles;
        }
    }
}
impl Deref for AllelesLut {
    type Target = MergedLut;

    fn deref(&self) -> &Self::Target {
        &self.lut
    }
}
impl DerefMut for AllelesLut {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.lut
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use anyhow::Result;

    const LAYOUTS: [LutLayout; 2] = [LutLayout::SourceMajor, LutLayout::FieldMajor];

    #[test]
    fn test_lookup_both_directions() -> Result<()> {
        for forward in LAYOUTS {
            for reverse in LAYOUTS {
                let mut lut = MergedLut::new(2, 4, forward, reverse);
                lut.add_input_merged_idx_pair(1, 0, 3)?;
                assert_eq!(lut.get_merged_idx_for_input(1, 0), 3);
                assert_eq!(lut.get_input_idx_for_merged(1, 3), 0);
                assert!(MergedLut::is_missing(lut.get_merged_idx_for_input(0, 0)));
                assert!(MergedLut::is_missing(lut.get_input_idx_for_merged(1, 0)));
            }
        }
        Ok(())
    }

    #[test]
    fn test_out_of_range() {
        let mut lut = MergedLut::new(2, 2, LutLayout::SourceMajor, LutLayout::FieldMajor);
        assert_eq!(lut.get_merged_idx_for_input(5, 5), LUT_MISSING_VALUE);
        assert!(lut.add_input_merged_idx_pair(2, 0, 0).is_err());
        assert!(lut.add_input_merged_idx_pair(0, 0, 2).is_err());
    }

    #[test]
    fn test_resize_preserves_entries() -> Result<()> {
        for layout in LAYOUTS {
            let mut lut = MergedLut::new(2, 3, layout, layout);
            lut.add_input_merged_idx_pair(0, 2, 1)?;
            lut.add_input_merged_idx_pair(1, 0, 2)?;

            lut.resize_luts_if_needed(5, 8);
            assert_eq!(lut.num_inputs(), 5);
            assert_eq!(lut.num_fields(), 8);
            assert_eq!(lut.get_merged_idx_for_input(0, 2), 1);
            assert_eq!(lut.get_input_idx_for_merged(0, 1), 2);
            assert_eq!(lut.get_merged_idx_for_input(1, 0), 2);
            assert_eq!(lut.get_input_idx_for_merged(1, 2), 0);

            let set = [(0, 2), (1, 0)];
            for input in 0..5 {
                for idx in 0..8 {
                    if !set.contains(&(input, idx)) {
                        assert!(MergedLut::is_missing(lut.get_merged_idx_for_input(input, idx)));
                    }
                }
            }
            lut.add_input_merged_idx_pair(4, 7, 7)?;
            assert_eq!(lut.get_merged_idx_for_input(4, 7), 7);
        }
        Ok(())
    }

    #[test]
    fn test_resize_never_shrinks() -> Result<()> {
        let mut lut = MergedLut::new(4, 4, LutLayout::SourceMajor, LutLayout::SourceMajor);
        lut.add_input_merged_idx_pair(3, 3, 3)?;
        lut.resize_luts_if_needed(6, 2);
        assert_eq!(lut.num_fields(), 4);
        assert_eq!(lut.get_merged_idx_for_input(3, 3), 3);
        lut.add_input_merged_idx_pair(5, 3, 0)?;
        Ok(())
    }

    #[test]
    fn test_resets() -> Result<()> {
        let mut lut = MergedLut::new(1, 2, LutLayout::SourceMajor, LutLayout::SourceMajor);
        lut.add_input_merged_idx_pair(0, 0, 1)?;
        lut.reset_input_idx_for_merged(0, 1)?;
        assert!(MergedLut::is_missing(lut.get_input_idx_for_merged(0, 1)));
        assert_eq!(lut.get_merged_idx_for_input(0, 0), 1);
        lut.reset_merged_idx_for_input(0, 0)?;
        assert!(MergedLut::is_missing(lut.get_merged_idx_for_input(0, 0)));

        lut.add_input_merged_idx_pair(0, 1, 0)?;
        lut.reset_luts();
        assert!(MergedLut::is_missing(lut.get_merged_idx_for_input(0, 1)));
        assert_eq!(lut.num_fields(), 2);
        Ok(())
    }

    #[test]
    fn test_alleles_lut_growth() -> Result<()> {
        let mut lut = AllelesLut::new(3, LutLayout::SourceMajor, LutLayout::FieldMajor);
        assert_eq!(lut.max_num_alleles(), DEFAULT_NUM_ALLELES);
        lut.add_input_merged_idx_pair(2, 1, 9)?;
        lut.resize_luts_if_needed(4);
        assert_eq!(lut.max_num_alleles(), DEFAULT_NUM_ALLELES);
        lut.resize_luts_if_needed(16);
        assert_eq!(lut.max_num_alleles(), 16);
        assert_eq!(lut.get_merged_idx_for_input(2, 1), 9);
        lut.add_input_merged_idx_pair(2, 15, 15)?;
        Ok(())
    }
}

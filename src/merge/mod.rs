//! # Multi-source variant merging
//!
//! Variants from several sorted sources are combined in two layers:
//!
//! * [`MultipleVariantIterator`] performs a k-way merge and yields every variant sharing one
//!   `(chromosome, start)` location as a single batch.
//! * [`ReferenceBlockSplittingVariantIterator`] wraps that merge and cuts reference blocks so
//!   that every record of a batch covers the same span.
//!
//! [`MultipleVariantReader`] owns the sources, checks that their headers agree and builds the
//! merged header.

mod multiple;
mod splitting;

pub use multiple::{MultipleVariantIterator, VariantBatch};
pub use splitting::ReferenceBlockSplittingVariantIterator;

use crate::{
    error::{HeaderError, ReadError, Result},
    header_merger::{MergerLayout, VariantHeaderMerger},
    variant::{VariantHeader, VariantSource},
};

/// Owner of a set of variant sources that are read together
pub struct MultipleVariantReader<S: VariantSource> {
    sources: Vec<S>,
    merger: VariantHeaderMerger,
}
impl<S: VariantSource> MultipleVariantReader<S> {
    /// Creates a reader over `sources`
    ///
    /// # Arguments
    ///
    /// * `sources` - The sources to merge, each sorted by chromosome and start
    /// * `validate_headers` - Whether every source must declare the same contigs, in the same
    ///   order
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Incompatible`] naming the first source whose contigs differ
    /// from those of the first source.
    pub fn new(sources: Vec<S>, validate_headers: bool) -> Result<Self> {
        Self::with_layout(sources, validate_headers, MergerLayout::default())
    }

    /// Creates a reader whose header merger uses the given lookup table layouts
    ///
    /// # Errors
    ///
    /// Same as [`MultipleVariantReader::new`].
    pub fn with_layout(
        sources: Vec<S>,
        validate_headers: bool,
        layout: MergerLayout,
    ) -> Result<Self> {
        if validate_headers {
            validate_contigs(&sources)?;
        }
        let mut merger = VariantHeaderMerger::new(layout);
        merger.add_headers(sources.iter().map(VariantSource::header));
        Ok(Self { sources, merger })
    }

    /// The header combining every source
    pub fn header(&self) -> &VariantHeader {
        self.merger.merged_header()
    }

    pub fn merger(&self) -> &VariantHeaderMerger {
        &self.merger
    }

    pub fn n_sources(&self) -> usize {
        self.sources.len()
    }

    /// Header of one source
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::SourceOutOfRange`] if there is no source at `source_idx`.
    pub fn source_header(&self, source_idx: usize) -> Result<&VariantHeader> {
        self.sources
            .get(source_idx)
            .map(VariantSource::header)
            .ok_or_else(|| ReadError::SourceOutOfRange(source_idx, self.sources.len()).into())
    }

    /// Merges the sources, one batch per location
    pub fn into_merged(self) -> MultipleVariantIterator<S> {
        MultipleVariantIterator::new(self.sources)
    }

    /// Merges the sources, cutting reference blocks at every record boundary
    pub fn into_split(self) -> ReferenceBlockSplittingVariantIterator<S> {
        ReferenceBlockSplittingVariantIterator::new(self.into_merged())
    }
}

fn validate_contigs<S: VariantSource>(sources: &[S]) -> Result<()> {
    let Some(first) = sources.first() else {
        return Ok(());
    };
    let expected = first.header().contigs();
    for (source_idx, source) in sources.iter().enumerate().skip(1) {
        let contigs = source.header().contigs();
        if contigs == expected {
            continue;
        }
        let reason = match expected.iter().zip(contigs).position(|(a, b)| a != b) {
            Some(idx) => format!(
                "contig {idx} is {:?}, expected {:?}",
                contigs[idx], expected[idx]
            ),
            None => format!(
                "declares {} contigs, expected {}",
                contigs.len(),
                expected.len()
            ),
        };
        return Err(HeaderError::Incompatible { source_idx, reason }.into());
    }
    Ok(())
}

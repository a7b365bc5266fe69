use std::{collections::VecDeque, mem};

use super::multiple::{MultipleVariantIterator, VariantBatch};
use crate::{
    error::{Error, Result},
    variant::VariantSource,
};

/// Reference allele given to the remainder of a split block when the base is unknown
const UNKNOWN_REFERENCE_BASE: &str = "N";

/// Merge of sorted variant sources that cuts overlapping reference blocks at every location
/// where another record starts or a block ends
///
/// Records starting at the same location are collected as pending. Each yielded batch holds
/// the pending records trimmed to end at the smallest of their stops and the base before the
/// next incoming record. Trimmed blocks keep their remainder pending, starting right after the
/// cut. Records carrying more than one alternate allele are never cut.
pub struct ReferenceBlockSplittingVariantIterator<S: VariantSource> {
    inner: MultipleVariantIterator<S>,
    /// Next batch of the underlying merge, empty once it is exhausted
    incoming: VariantBatch,
    pending: VariantBatch,
    pending_chrom: u32,
    pending_start: u32,
    pending_min_end: u32,
    errors: VecDeque<Error>,
}
impl<S: VariantSource> ReferenceBlockSplittingVariantIterator<S> {
    pub fn new(inner: MultipleVariantIterator<S>) -> Self {
        let mut iter = Self {
            inner,
            incoming: Vec::new(),
            pending: Vec::new(),
            pending_chrom: 0,
            pending_start: 0,
            pending_min_end: u32::MAX,
            errors: VecDeque::new(),
        };
        iter.advance_incoming();
        iter
    }

    pub fn from_sources(sources: Vec<S>) -> Self {
        Self::new(MultipleVariantIterator::new(sources))
    }

    /// Pulls the next batch of the underlying merge, setting aside its errors
    fn advance_incoming(&mut self) {
        self.incoming = loop {
            match self.inner.next() {
                Some(Ok(batch)) => break batch,
                Some(Err(e)) => self.errors.push_back(e),
                None => break Vec::new(),
            }
        };
    }

    /// Location of the incoming batch
    fn incoming_key(&self) -> Option<(u32, u32)> {
        self.incoming
            .first()
            .map(|(v, _)| (v.chromosome(), v.alignment_start()))
    }

    fn populate_pending(&mut self) {
        for (variant, source_idx) in mem::take(&mut self.incoming) {
            self.pending_min_end = self.pending_min_end.min(variant.alignment_stop());
            self.pending.push((variant, source_idx));
        }
        self.advance_incoming();
    }

    fn populate_split(&mut self, split: &mut VariantBatch) {
        let min_end = self.pending_min_end;

        // reuse the first reference base of the next record when it starts right after the cut
        let new_ref = match self.incoming.first() {
            Some((next, _))
                if next.chromosome() == self.pending_chrom
                    && u64::from(next.alignment_start()) == u64::from(min_end) + 1
                    && !next.has_missing_ref() =>
            {
                next.ref_allele()
                    .get(..1)
                    .unwrap_or(UNKNOWN_REFERENCE_BASE)
                    .to_string()
            }
            _ => UNKNOWN_REFERENCE_BASE.to_string(),
        };

        let mut new_start = None;
        let mut new_end = u32::MAX;
        let mut remaining = Vec::with_capacity(self.pending.len());
        for (mut variant, source_idx) in mem::take(&mut self.pending) {
            let stop = variant.alignment_stop();
            if stop == min_end || variant.alt_alleles().len() > 1 {
                split.push((variant, source_idx));
                continue;
            }

            let mut head = variant.clone();
            head.set_alignment_stop(min_end);
            split.push((head, source_idx));

            let start = min_end.saturating_add(1);
            variant.set_alignment_start(start);
            variant.set_alignment_stop(stop);
            variant.set_ref_allele(new_ref.as_str());
            new_start = Some(start);
            new_end = new_end.min(stop);
            remaining.push((variant, source_idx));
        }

        if let Some(start) = new_start {
            log::debug!(
                "Split {} reference blocks at {}:{}",
                remaining.len(),
                self.pending_chrom,
                min_end
            );
            self.pending_start = start;
            self.pending_min_end = new_end;
        }
        self.pending = remaining;
    }

    fn fetch_next_split(&mut self) -> VariantBatch {
        let mut split = Vec::new();
        while split.is_empty() {
            let Some((chrom, start)) = self.incoming_key() else {
                break;
            };
            if self.pending.is_empty() {
                self.pending_chrom = chrom;
                self.pending_start = start;
                self.pending_min_end = u32::MAX;
                self.populate_pending();
            } else if chrom == self.pending_chrom && start == self.pending_start {
                self.populate_pending();
            }

            // pending records may not extend past the base before the next record
            if let Some((chrom, start)) = self.incoming_key() {
                if chrom == self.pending_chrom {
                    self.pending_min_end = self.pending_min_end.min(start.saturating_sub(1));
                }
            }

            self.populate_split(&mut split);
        }

        // flush what remains once the sources are exhausted
        if split.is_empty() && !self.pending.is_empty() {
            self.populate_split(&mut split);
        }
        split
    }
}
impl<S: VariantSource> Iterator for ReferenceBlockSplittingVariantIterator<S> {
    type Item = Result<VariantBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.errors.pop_front() {
            return Some(Err(e));
        }
        let split = self.fetch_next_split();
        if split.is_empty() {
            return self.errors.pop_front().map(Err);
        }
        Some(Ok(split))
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::variant::{Variant, VariantHeader, VecSource};
    use anyhow::Result;

    fn source(variants: Vec<Variant>) -> VecSource {
        VecSource::new(VariantHeader::new(), variants)
    }

    fn snp(chromosome: u32, start: u32) -> Variant {
        Variant::new(
            chromosome,
            start,
            "G",
            vec!["T".to_string(), "<NON_REF>".to_string()],
        )
    }

    /// `(start, stop, ref, source)` of every record, sorted for comparison
    fn spans(batch: &VariantBatch) -> Vec<(u32, u32, String, usize)> {
        let mut spans: Vec<_> = batch
            .iter()
            .map(|(v, idx)| {
                (
                    v.alignment_start(),
                    v.alignment_stop(),
                    v.ref_allele().to_string(),
                    *idx,
                )
            })
            .collect();
        spans.sort_unstable();
        spans
    }

    fn all_spans(sources: Vec<VecSource>) -> Result<Vec<Vec<(u32, u32, String, usize)>>> {
        let batches = ReferenceBlockSplittingVariantIterator::from_sources(sources)
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(batches.iter().map(spans).collect())
    }

    #[test]
    fn test_block_split_before_next_record() -> Result<()> {
        let sources = vec![
            source(vec![Variant::reference_block(0, 100, 500, "A")]),
            source(vec![snp(0, 200)]),
        ];
        let batches = all_spans(sources)?;
        assert_eq!(
            batches,
            vec![
                vec![(100, 199, "A".to_string(), 0)],
                vec![(200, 200, "G".to_string(), 0), (200, 200, "G".to_string(), 1)],
                vec![(201, 500, "N".to_string(), 0)],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_remainder_stays_pending() -> Result<()> {
        let sources = vec![
            source(vec![Variant::reference_block(0, 100, 500, "A")]),
            source(vec![snp(0, 200)]),
        ];
        let mut iter = ReferenceBlockSplittingVariantIterator::from_sources(sources);
        let first = iter.next().transpose()?.unwrap_or_default();
        assert_eq!(spans(&first), vec![(100, 199, "A".to_string(), 0)]);
        assert_eq!(iter.pending.len(), 1);
        assert_eq!(iter.pending[0].0.alignment_start(), 200);
        assert_eq!(iter.pending[0].0.alignment_stop(), 500);
        Ok(())
    }

    #[test]
    fn test_blocks_with_different_ends() -> Result<()> {
        let sources = vec![
            source(vec![Variant::reference_block(0, 10, 20, "C")]),
            source(vec![Variant::reference_block(0, 10, 15, "C")]),
        ];
        let batches = all_spans(sources)?;
        assert_eq!(
            batches,
            vec![
                vec![(10, 15, "C".to_string(), 0), (10, 15, "C".to_string(), 1)],
                vec![(16, 20, "N".to_string(), 0)],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_multi_allelic_records_are_not_split() -> Result<()> {
        let deletion = Variant::new(
            0,
            10,
            "ACGTA",
            vec!["A".to_string(), "<NON_REF>".to_string()],
        );
        let sources = vec![source(vec![deletion]), source(vec![snp(0, 12)])];
        let batches = all_spans(sources)?;
        assert_eq!(
            batches,
            vec![
                vec![(10, 14, "ACGTA".to_string(), 0)],
                vec![(12, 12, "G".to_string(), 1)],
            ]
        );
        Ok(())
    }

    #[test]
    fn test_chromosome_change_flushes_blocks() -> Result<()> {
        let sources = vec![
            source(vec![Variant::reference_block(0, 1, 100, "T")]),
            source(vec![Variant::reference_block(1, 1, 5, "T")]),
        ];
        let batches = all_spans(sources)?;
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], vec![(1, 100, "T".to_string(), 0)]);
        assert_eq!(batches[1], vec![(1, 5, "T".to_string(), 1)]);
        Ok(())
    }

    #[test]
    fn test_empty_input() {
        let mut iter = ReferenceBlockSplittingVariantIterator::from_sources(vec![source(vec![])]);
        assert!(iter.next().is_none());
    }
}

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, VecDeque},
};

use crate::{
    error::{Error, Result},
    variant::{Variant, VariantSource},
};

/// Variants sharing one `(chromosome, start)` location, each paired with the index of the
/// source it came from
pub type VariantBatch = Vec<(Variant, usize)>;

/// A source together with the variant it is currently positioned on
struct Cursor<S> {
    source: S,
    source_idx: usize,
    current: Variant,
}
impl<S> Cursor<S> {
    fn key(&self) -> (u32, u32) {
        (self.current.chromosome(), self.current.alignment_start())
    }
}
// Ordering only looks at the genomic location, so cursors at the same location compare equal
// and pop in heap order.
impl<S> PartialEq for Cursor<S> {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl<S> Eq for Cursor<S> {}
impl<S> PartialOrd for Cursor<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<S> Ord for Cursor<S> {
    // reversed to turn the max-heap into a min-heap
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// K-way merge of sorted variant sources
///
/// Each item is the batch of every variant located at the smallest `(chromosome, start)` not
/// yet yielded, so batches come out in non-decreasing location order. The order of variants
/// within a batch is unspecified.
///
/// A source that fails to decode a variant yields the error as an `Err` item and takes no
/// further part in the merge.
pub struct MultipleVariantIterator<S: VariantSource> {
    queue: BinaryHeap<Cursor<S>>,
    errors: VecDeque<Error>,
}
impl<S: VariantSource> MultipleVariantIterator<S> {
    pub fn new(sources: Vec<S>) -> Self {
        let mut iter = Self {
            queue: BinaryHeap::with_capacity(sources.len()),
            errors: VecDeque::new(),
        };
        for (source_idx, source) in sources.into_iter().enumerate() {
            iter.advance(source, source_idx);
        }
        iter
    }

    /// Moves a source to its next variant and puts it back in the queue unless it is done
    fn advance(&mut self, mut source: S, source_idx: usize) {
        match source.next_variant() {
            Some(Ok(current)) => self.queue.push(Cursor {
                source,
                source_idx,
                current,
            }),
            Some(Err(e)) => {
                log::warn!("Dropping source {source_idx} from the merge: {e}");
                self.errors.push_back(e);
            }
            None => log::debug!("Source {source_idx} exhausted"),
        }
    }

    /// Number of sources still taking part in the merge
    pub fn n_active_sources(&self) -> usize {
        self.queue.len()
    }

    fn fetch_next_batch(&mut self) -> Option<VariantBatch> {
        let first = self.queue.pop()?;
        let key = first.key();
        let mut popped = vec![first];
        while self.queue.peek().is_some_and(|c| c.key() == key) {
            if let Some(cursor) = self.queue.pop() {
                popped.push(cursor);
            }
        }

        let mut batch = Vec::with_capacity(popped.len());
        for cursor in popped {
            let Cursor {
                source,
                source_idx,
                current,
            } = cursor;
            batch.push((current, source_idx));
            self.advance(source, source_idx);
        }
        Some(batch)
    }
}
impl<S: VariantSource> Iterator for MultipleVariantIterator<S> {
    type Item = Result<VariantBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.errors.pop_front() {
            return Some(Err(e));
        }
        self.fetch_next_batch().map(Ok)
    }
}

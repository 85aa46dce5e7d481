use std::num::NonZeroUsize;

use log::debug;
use ndarray::ArrayView2;
use rand::Rng;

use crate::dataset::{Batches, Dataset};

/// A batched iterator over a dataset with an explicit cursor.
///
/// `next_batch` advances the cursor until the dataset is exhausted, `reset` rewinds it to the
/// first sample. Resetting never reorders the samples, so re-iterating yields the same batches.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: Dataset,
    batch_size: NonZeroUsize,
    cursor: usize,
}

impl DataLoader {
    pub fn new(dataset: Dataset, batch_size: NonZeroUsize) -> Self {
        debug!(samples = dataset.len(), batch_size = batch_size.get(); "data loader created");

        Self {
            dataset,
            batch_size,
            cursor: 0,
        }
    }

    #[inline]
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Returns the amount of batches in a full pass, counting the last partial one.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size.get())
    }

    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Returns the next batch, or None if exhausted.
    pub fn next_batch(&mut self) -> Option<(ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        if self.cursor >= self.dataset.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size.get()).min(self.dataset.len());
        let start = self.cursor;

        self.cursor = end;
        Some(self.dataset.rows(start..end))
    }

    /// Iterates over a full pass of batches from the first sample, without moving the cursor.
    pub fn batches(&self) -> Batches<'_> {
        self.dataset.batches(self.batch_size)
    }

    /// Shuffles the underlying dataset and rewinds the cursor.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        debug!("shuffling {} samples", self.dataset.len());
        self.dataset.shuffle(rng);
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(batch_size: usize) -> DataLoader {
        let data = (0..10).flat_map(|i| [i as f32, i as f32 + 100.0]).collect();
        let dataset = Dataset::new(data, 1, 1).unwrap();

        DataLoader::new(dataset, NonZeroUsize::new(batch_size).unwrap())
    }

    #[test]
    fn next_batch_respects_batch_size() {
        let mut dl = loader(4);
        assert_eq!(dl.num_batches(), 3);

        let (x, y) = dl.next_batch().unwrap();
        assert_eq!(x.iter().copied().collect::<Vec<_>>(), [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(y.iter().copied().collect::<Vec<_>>(), [100.0, 101.0, 102.0, 103.0]);

        assert_eq!(dl.next_batch().unwrap().0.nrows(), 4);
        assert_eq!(dl.next_batch().unwrap().0.nrows(), 2);
        assert!(dl.next_batch().is_none());
    }

    #[test]
    fn reset_reproduces_batches() {
        let mut dl = loader(3);

        let mut first = Vec::new();
        while let Some((x, _)) = dl.next_batch() {
            first.push(x.to_owned());
        }

        dl.reset();

        let mut second = Vec::new();
        while let Some((x, _)) = dl.next_batch() {
            second.push(x.to_owned());
        }

        assert_eq!(first, second);
    }

    #[test]
    fn batches_match_next_batch() {
        let mut dl = loader(3);
        let all: Vec<_> = dl.batches().map(|(x, _)| x.to_owned()).collect();

        for expected in all {
            let (x, _) = dl.next_batch().unwrap();
            assert_eq!(x, expected);
        }

        assert!(dl.next_batch().is_none());
    }
}

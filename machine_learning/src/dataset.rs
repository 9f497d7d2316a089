use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory supervised dataset: one row of features and one row of labels per example.
#[derive(Debug, Clone)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Arguments
    /// * `x` - The features, shaped `(examples, x_size)`.
    /// * `y` - The labels, shaped `(examples, y_size)`.
    ///
    /// # Returns
    /// The dataset or a `SizeMismatch` if both matrices have a different amount of rows.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y })
    }

    /// Builds a dataset from interleaved rows of `x_size` features followed by `y_size` labels.
    pub fn from_rows(data: &[f32], x_size: usize, y_size: usize) -> Result<Self> {
        let row = x_size + y_size;
        if row == 0 || data.len() % row != 0 {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: data.len(),
                expected: data.len().next_multiple_of(row.max(1)),
            });
        }

        let full = ArrayView2::from_shape((data.len() / row, row), data)?;
        let (x, y) = full.split_at(Axis(1), x_size);
        Self::new(x.to_owned(), y.to_owned())
    }

    /// Returns the amount of examples.
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// Permutes the examples in place, keeping each feature row next to its label row.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.x = self.x.select(Axis(0), &order);
        self.y = self.y.select(Axis(0), &order);
    }

    /// Returns the dataset split in consecutive batches of at most `batch_size` examples.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let size = batch_size.get();
        self.x
            .axis_chunks_iter(Axis(0), size)
            .zip(self.y.axis_chunks_iter(Axis(0), size))
    }
}

/// A restartable, optionally shuffled, batched sequence over a `Dataset`.
///
/// Every call to `epoch` starts a new pass over every example; when shuffling is enabled the
/// examples are permuted again before each pass.
#[derive(Debug)]
pub struct DataLoader<R: Rng> {
    dataset: Dataset,
    batch_size: NonZeroUsize,
    shuffle: bool,
    rng: R,
}

impl<R: Rng> DataLoader<R> {
    /// Creates a new `DataLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The examples to iterate.
    /// * `batch_size` - The maximum amount of examples per batch.
    /// * `shuffle` - Whether to permute the examples before every pass.
    /// * `rng` - The source of randomness for shuffling.
    pub fn new(dataset: Dataset, batch_size: NonZeroUsize, shuffle: bool, rng: R) -> Self {
        Self {
            dataset,
            batch_size,
            shuffle,
            rng,
        }
    }

    /// Returns the amount of examples behind this loader.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn batch_size(&self) -> NonZeroUsize {
        self.batch_size
    }

    /// Starts a new pass over the examples.
    ///
    /// # Returns
    /// An iterator over `(x, y)` batch views.
    pub fn epoch(&mut self) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        if self.shuffle {
            self.dataset.shuffle(&mut self.rng);
        }

        self.dataset.batches(self.batch_size)
    }
}

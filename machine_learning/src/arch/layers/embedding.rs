use ndarray::{prelude::*, s};

use crate::{MlErr, Result};

/// A lookup table mapping token indices to dense vectors.
///
/// Takes `(batch, len)` inputs whose values are indices into the table and yields
/// `(batch, len * emb)` outputs, the embeddings of each sequence laid out one after the other.
#[derive(Clone, Debug)]
pub struct Embedding {
    dim: (usize, usize),
    indices: Array2<usize>,
}

impl Embedding {
    /// Creates a new `Embedding` layer.
    ///
    /// # Arguments
    /// * `dim` - The vocabulary size and the embedding size.
    pub fn new(dim: (usize, usize)) -> Self {
        Self {
            dim,
            indices: Array2::zeros((0, 0)),
        }
    }

    pub fn size(&self) -> usize {
        self.dim.0 * self.dim.1
    }

    pub fn shapes(&self) -> Vec<Vec<usize>> {
        vec![vec![self.dim.0, self.dim.1]]
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (vocab, emb) = self.dim;
        let table = ArrayView2::from_shape(self.dim, params)?;

        let (rows, len) = x.dim();
        let mut out = Array2::zeros((rows, len * emb));
        let mut indices = Array2::zeros((rows, len));

        for ((i, j), &value) in x.indexed_iter() {
            let index = Self::to_index(value, vocab)?;
            indices[(i, j)] = index;
            out.slice_mut(s![i, j * emb..(j + 1) * emb])
                .assign(&table.row(index));
        }

        self.indices = indices;
        Ok(out)
    }

    /// Scatters `d` into the rows of the table that were looked up on the last forward pass.
    ///
    /// Indices are not differentiable, the returned delta is all zeros.
    pub fn backward(&mut self, grad: &mut [f32], d: ArrayView2<f32>) -> Result<Array2<f32>> {
        let emb = self.dim.1;
        let (rows, len) = self.indices.dim();

        if d.dim() != (rows, len * emb) {
            return Err(MlErr::SizeMismatch {
                what: "embedding output delta",
                got: d.len(),
                expected: rows * len * emb,
            });
        }

        let mut dtable = ArrayViewMut2::from_shape(self.dim, grad)?;
        dtable.fill(0.);

        for ((i, j), &index) in self.indices.indexed_iter() {
            let mut row = dtable.row_mut(index);
            row += &d.slice(s![i, j * emb..(j + 1) * emb]);
        }

        Ok(Array2::zeros((rows, len)))
    }

    fn to_index(value: f32, vocab: usize) -> Result<usize> {
        if value < 0. || value.fract() != 0. || value as usize >= vocab {
            return Err(MlErr::IndexOutOfRange {
                index: value,
                len: vocab,
            });
        }

        Ok(value as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_concatenates_rows() {
        let mut embedding = Embedding::new((3, 2));
        let table = [0.0, 1.0, 10.0, 11.0, 20.0, 21.0];

        let y = embedding
            .forward(&table, array![[2.0, 0.0], [1.0, 1.0]].view())
            .unwrap();

        assert_eq!(y, array![[20.0_f32, 21.0, 0.0, 1.0], [10.0, 11.0, 10.0, 11.0]]);
    }

    #[test]
    fn backward_scatters_into_the_used_rows() {
        let mut embedding = Embedding::new((3, 1));
        let table = [0.0; 3];
        let mut grad = [9.0; 3];

        embedding
            .forward(&table, array![[1.0, 1.0], [2.0, 1.0]].view())
            .unwrap();
        embedding
            .backward(&mut grad, array![[1.0, 2.0], [4.0, 8.0]].view())
            .unwrap();

        assert_eq!(grad, [0.0, 11.0, 4.0]);
    }

    #[test]
    fn out_of_vocabulary_index_is_rejected() {
        let mut embedding = Embedding::new((3, 1));
        let table = [0.0; 3];

        for bad in [3.0, -1.0, 0.5] {
            let err = embedding.forward(&table, array![[bad]].view()).unwrap_err();
            assert!(matches!(err, MlErr::IndexOutOfRange { len: 3, .. }));
        }
    }
}

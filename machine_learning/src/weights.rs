use ndarray::{ArrayD, IxDyn};

use crate::{MlErr, Result};

/// The trainable parameters of a model as an ordered list of tensors, one per parameter tensor
/// of the architecture. This is the unit exchanged between the coordinator and its clients.
///
/// Cloning yields an independent copy, weight vectors are never shared between clients.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVector {
    tensors: Vec<ArrayD<f32>>,
}

impl WeightVector {
    /// Creates a new `WeightVector`.
    ///
    /// # Arguments
    /// * `tensors` - The parameter tensors in model order.
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Self { tensors }
    }

    /// Builds a `WeightVector` out of a flat buffer, splitting it by `shapes` in order.
    ///
    /// # Arguments
    /// * `flat` - Every parameter, tensor after tensor, in row-major order.
    /// * `shapes` - The shape of each tensor.
    ///
    /// # Returns
    /// The weight vector or a `SizeMismatch` if `flat` doesn't hold exactly as many values as
    /// the shapes describe.
    pub fn from_flat(flat: &[f32], shapes: &[Vec<usize>]) -> Result<Self> {
        let expected = shapes.iter().map(|s| s.iter().product::<usize>()).sum();
        if flat.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "flat weights",
                got: flat.len(),
                expected,
            });
        }

        let mut rest = flat;
        let mut tensors = Vec::with_capacity(shapes.len());

        for shape in shapes {
            let (head, tail) = rest.split_at(shape.iter().product());
            tensors.push(ArrayD::from_shape_vec(IxDyn(shape), head.to_vec())?);
            rest = tail;
        }

        Ok(Self { tensors })
    }

    /// Returns every parameter, tensor after tensor, in row-major order.
    pub fn to_flat(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.num_params());
        for tensor in &self.tensors {
            flat.extend(tensor.iter().copied());
        }
        flat
    }

    /// Returns the shape of every tensor in order.
    pub fn shapes(&self) -> Vec<Vec<usize>> {
        self.tensors.iter().map(|t| t.shape().to_vec()).collect()
    }

    /// Returns the amount of tensors.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Returns the total amount of scalar parameters.
    pub fn num_params(&self) -> usize {
        self.tensors.iter().map(ArrayD::len).sum()
    }

    pub fn tensors(&self) -> &[ArrayD<f32>] {
        &self.tensors
    }

    /// Checks that this vector has the same layout as `shapes`.
    ///
    /// # Arguments
    /// * `shapes` - The expected tensor shapes, in order.
    ///
    /// # Returns
    /// A `SizeMismatch` if the amount of tensors differs or a `ShapeMismatch` naming the first
    /// tensor whose shape differs.
    pub fn check_shapes(&self, shapes: &[Vec<usize>]) -> Result<()> {
        if self.tensors.len() != shapes.len() {
            return Err(MlErr::SizeMismatch {
                what: "weight tensors",
                got: self.tensors.len(),
                expected: shapes.len(),
            });
        }

        for (position, (tensor, expected)) in self.tensors.iter().zip(shapes).enumerate() {
            if tensor.shape() != expected.as_slice() {
                return Err(MlErr::ShapeMismatch {
                    position,
                    got: tensor.shape().to_vec(),
                    expected: expected.clone(),
                });
            }
        }

        Ok(())
    }
}

impl From<Vec<ArrayD<f32>>> for WeightVector {
    fn from(tensors: Vec<ArrayD<f32>>) -> Self {
        Self::new(tensors)
    }
}

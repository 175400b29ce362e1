use ndarray::{ArrayD, ArrayViewD};

use super::{PsdKernel, stationary::Stationary};
use crate::{Result, array::IntoArray};

/// The exponentiated quadratic (squared exponential, RBF) kernel:
///
/// `k(x, y) = amplitude² * exp(-|x - y|² / (2 * length_scale²))`
///
/// `amplitude` and `length_scale` may be batched, the kernel's batch shape is their broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentiatedQuadratic {
    params: Stationary,
}

impl ExponentiatedQuadratic {
    /// Creates a new `ExponentiatedQuadratic` over vector index points.
    ///
    /// # Arguments
    /// * `amplitude` - Positive scale of the kernel, scalar or batched.
    /// * `length_scale` - Positive input scale, scalar or batched.
    ///
    /// # Returns
    /// A new kernel or an error if the parameters are invalid or don't broadcast.
    pub fn new(amplitude: impl IntoArray, length_scale: impl IntoArray) -> Result<Self> {
        Self::with_feature_ndims(amplitude, length_scale, 1)
    }

    /// Creates a new `ExponentiatedQuadratic` whose index points have `feature_ndims`
    /// trailing dimensions.
    pub fn with_feature_ndims(
        amplitude: impl IntoArray,
        length_scale: impl IntoArray,
        feature_ndims: usize,
    ) -> Result<Self> {
        Ok(Self {
            params: Stationary::new(amplitude, length_scale, feature_ndims)?,
        })
    }

    pub fn amplitude(&self) -> &ArrayD<f64> {
        self.params.amplitude()
    }

    pub fn length_scale(&self) -> &ArrayD<f64> {
        self.params.length_scale()
    }

    /// Returns a copy of this kernel with a unit dimension inserted in its batch shape at `axis`.
    pub fn insert_batch_axis(&self, axis: usize) -> Result<Self> {
        Ok(Self {
            params: self.params.insert_batch_axis(axis)?,
        })
    }
}

impl Default for ExponentiatedQuadratic {
    fn default() -> Self {
        Self {
            params: Stationary::unit(1),
        }
    }
}

impl PsdKernel for ExponentiatedQuadratic {
    fn batch_shape(&self) -> Vec<usize> {
        self.params.batch_shape().to_vec()
    }

    fn feature_ndims(&self) -> usize {
        self.params.feature_ndims()
    }

    fn matrix(&self, x1: ArrayViewD<'_, f64>, x2: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        self.params.matrix(x1, x2, |r2| (-0.5 * r2).exp())
    }
}

use ndarray::{ArrayD, ArrayViewD};

use super::{PsdKernel, stationary::Stationary};
use crate::{Result, array::IntoArray};

const SQRT_5: f64 = 2.236_067_977_499_79;

/// The Matérn kernel with smoothness 5/2:
///
/// `k(x, y) = amplitude² * (1 + √5 r + 5r²/3) * exp(-√5 r)`
///
/// with `r = |x - y| / length_scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaternFiveHalves {
    params: Stationary,
}

impl MaternFiveHalves {
    pub fn new(amplitude: impl IntoArray, length_scale: impl IntoArray) -> Result<Self> {
        Self::with_feature_ndims(amplitude, length_scale, 1)
    }

    pub fn with_feature_ndims(
        amplitude: impl IntoArray,
        length_scale: impl IntoArray,
        feature_ndims: usize,
    ) -> Result<Self> {
        Ok(Self {
            params: Stationary::new(amplitude, length_scale, feature_ndims)?,
        })
    }

    pub fn insert_batch_axis(&self, axis: usize) -> Result<Self> {
        Ok(Self {
            params: self.params.insert_batch_axis(axis)?,
        })
    }
}

impl PsdKernel for MaternFiveHalves {
    fn batch_shape(&self) -> Vec<usize> {
        self.params.batch_shape().to_vec()
    }

    fn feature_ndims(&self) -> usize {
        self.params.feature_ndims()
    }

    fn matrix(&self, x1: ArrayViewD<'_, f64>, x2: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        self.params.matrix(x1, x2, |r2| {
            let r = r2.sqrt();
            (1. + SQRT_5 * r + 5. / 3. * r2) * (-SQRT_5 * r).exp()
        })
    }
}

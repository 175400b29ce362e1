use ndarray::{ArrayD, ArrayViewD};

use super::{ExponentiatedQuadratic, MaternFiveHalves, PsdKernel};
use crate::Result;

/// Any of the stationary kernels in this crate.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseKernel {
    ExponentiatedQuadratic(ExponentiatedQuadratic),
    MaternFiveHalves(MaternFiveHalves),
}
use BaseKernel::*;

impl BaseKernel {
    pub fn insert_batch_axis(&self, axis: usize) -> Result<Self> {
        Ok(match self {
            ExponentiatedQuadratic(k) => ExponentiatedQuadratic(k.insert_batch_axis(axis)?),
            MaternFiveHalves(k) => MaternFiveHalves(k.insert_batch_axis(axis)?),
        })
    }
}

impl PsdKernel for BaseKernel {
    fn batch_shape(&self) -> Vec<usize> {
        match self {
            ExponentiatedQuadratic(k) => k.batch_shape(),
            MaternFiveHalves(k) => k.batch_shape(),
        }
    }

    fn feature_ndims(&self) -> usize {
        match self {
            ExponentiatedQuadratic(k) => k.feature_ndims(),
            MaternFiveHalves(k) => k.feature_ndims(),
        }
    }

    fn matrix(&self, x1: ArrayViewD<'_, f64>, x2: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        match self {
            ExponentiatedQuadratic(k) => k.matrix(x1, x2),
            MaternFiveHalves(k) => k.matrix(x1, x2),
        }
    }
}

impl From<ExponentiatedQuadratic> for BaseKernel {
    fn from(k: ExponentiatedQuadratic) -> Self {
        ExponentiatedQuadratic(k)
    }
}

impl From<MaternFiveHalves> for BaseKernel {
    fn from(k: MaternFiveHalves) -> Self {
        MaternFiveHalves(k)
    }
}

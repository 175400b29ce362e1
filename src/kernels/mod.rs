//! Positive semi-definite kernels.
//!
//! A kernel evaluated on index points of shape `[b1..., n1, f...]` and `[b2..., n2, f...]`
//! returns a matrix of shape `broadcast(kernel batch, b1, b2) ++ [n1, n2]`, where `f...` are
//! the kernel's `feature_ndims` trailing feature dimensions.

mod base;
mod exponentiated_quadratic;
mod matern;
pub mod multitask;
mod stationary;

use ndarray::{ArrayD, ArrayViewD};

use crate::Result;

pub use base::BaseKernel;
pub use exponentiated_quadratic::ExponentiatedQuadratic;
pub use matern::MaternFiveHalves;
pub use multitask::{Independent, MultiTaskKernel, Separable};

/// A batch of positive semi-definite covariance functions.
pub trait PsdKernel {
    /// The shape of the kernel's parameter batch.
    fn batch_shape(&self) -> Vec<usize>;

    /// The number of trailing dimensions of a single index point.
    fn feature_ndims(&self) -> usize;

    /// Computes the covariance between every pair of index points in `x1` and `x2`.
    ///
    /// # Arguments
    /// * `x1` - Index points of shape `[b1..., n1, f...]`.
    /// * `x2` - Index points of shape `[b2..., n2, f...]`.
    ///
    /// # Returns
    /// The kernel matrices of shape `broadcast(batch, b1, b2) ++ [n1, n2]`.
    fn matrix(&self, x1: ArrayViewD<'_, f64>, x2: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>>;
}

impl<K: PsdKernel + ?Sized> PsdKernel for Box<K> {
    fn batch_shape(&self) -> Vec<usize> {
        (**self).batch_shape()
    }

    fn feature_ndims(&self) -> usize {
        (**self).feature_ndims()
    }

    fn matrix(&self, x1: ArrayViewD<'_, f64>, x2: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        (**self).matrix(x1, x2)
    }
}

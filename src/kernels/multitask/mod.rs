//! Multi-task kernels.
//!
//! A multi-task kernel models a vector valued function with `T` outputs. The kernels here are
//! separable: the covariance between output `t` at `x` and output `s` at `y` is
//! `k(x, y) * B[t, s]`, with `k` a single-task kernel over index points and `B` a `T x T` task
//! covariance. Over `N` index points the joint covariance is `kron(K, B)`, whose row
//! `n * T + t` corresponds to task `t` at index point `n`.

mod independent;
mod separable;

use ndarray::{Array2, ArrayD, ArrayViewD, IxDyn};

use crate::{
    Result,
    array::flat,
    linalg::{from_array2, matrix_block, to_row_major},
    shape::{concat, split_batch},
};

pub use independent::Independent;
pub use separable::Separable;

/// A batch of covariance functions over (index point, task) pairs.
pub trait MultiTaskKernel {
    /// The number of outputs of the modeled function.
    fn num_tasks(&self) -> usize;

    /// The shape of the kernel's parameter batch.
    fn batch_shape(&self) -> Vec<usize>;

    /// The number of trailing dimensions of a single index point.
    fn feature_ndims(&self) -> usize;

    /// The covariance between index points shared by every pair of tasks, of shape
    /// `broadcast(batch, b1, b2) ++ [n1, n2]`.
    fn index_matrix(&self, x1: ArrayViewD<'_, f64>, x2: ArrayViewD<'_, f64>)
    -> Result<ArrayD<f64>>;

    /// The `T x T` covariance between tasks.
    fn task_matrix(&self) -> Array2<f64>;

    /// The dense covariance over all tasks, of shape
    /// `broadcast(batch, b1, b2) ++ [n1 * T, n2 * T]`.
    fn matrix_over_all_tasks(
        &self,
        x1: ArrayViewD<'_, f64>,
        x2: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<f64>> {
        let k = self.index_matrix(x1, x2)?;
        let (batch, event) = split_batch("kernel matrix", k.shape(), 2)?;
        let (n1, n2) = (event[0], event[1]);
        let nbatch: usize = batch.iter().product();

        let task = from_array2(self.task_matrix().view());
        let t = task.nrows();
        let values = flat(&k);

        let mut out = Vec::with_capacity(nbatch * n1 * n2 * t * t);
        for b in 0..nbatch {
            let block = matrix_block(&values, b, n1, n2).kronecker(&task);
            out.extend(to_row_major(&block));
        }

        let shape = concat(&[batch, &[n1 * t, n2 * t][..]]);
        Ok(ArrayD::from_shape_vec(IxDyn(&shape), out)?)
    }
}

impl<K: MultiTaskKernel + ?Sized> MultiTaskKernel for Box<K> {
    fn num_tasks(&self) -> usize {
        (**self).num_tasks()
    }

    fn batch_shape(&self) -> Vec<usize> {
        (**self).batch_shape()
    }

    fn feature_ndims(&self) -> usize {
        (**self).feature_ndims()
    }

    fn index_matrix(
        &self,
        x1: ArrayViewD<'_, f64>,
        x2: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<f64>> {
        (**self).index_matrix(x1, x2)
    }

    fn task_matrix(&self) -> Array2<f64> {
        (**self).task_matrix()
    }

    fn matrix_over_all_tasks(
        &self,
        x1: ArrayViewD<'_, f64>,
        x2: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<f64>> {
        (**self).matrix_over_all_tasks(x1, x2)
    }
}

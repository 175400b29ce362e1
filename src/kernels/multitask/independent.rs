use ndarray::{Array2, ArrayD, ArrayViewD};

use super::MultiTaskKernel;
use crate::{GpErr, Result, kernels::PsdKernel};

/// A multi-task kernel whose tasks are independent and share the same base kernel, that is,
/// its task covariance is the identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Independent<K> {
    num_tasks: usize,
    base_kernel: K,
}

impl<K: PsdKernel> Independent<K> {
    /// Creates a new `Independent` kernel.
    ///
    /// # Arguments
    /// * `num_tasks` - The number of tasks, must be positive.
    /// * `base_kernel` - The kernel shared by every task.
    ///
    /// # Returns
    /// A new kernel or an error if `num_tasks` is zero.
    pub fn new(num_tasks: usize, base_kernel: K) -> Result<Self> {
        if num_tasks == 0 {
            return Err(GpErr::InvalidParameter {
                what: "num_tasks",
                reason: "must be positive".into(),
            });
        }

        Ok(Self {
            num_tasks,
            base_kernel,
        })
    }

    pub fn base_kernel(&self) -> &K {
        &self.base_kernel
    }
}

impl<K: PsdKernel> MultiTaskKernel for Independent<K> {
    fn num_tasks(&self) -> usize {
        self.num_tasks
    }

    fn batch_shape(&self) -> Vec<usize> {
        self.base_kernel.batch_shape()
    }

    fn feature_ndims(&self) -> usize {
        self.base_kernel.feature_ndims()
    }

    fn index_matrix(
        &self,
        x1: ArrayViewD<'_, f64>,
        x2: ArrayViewD<'_, f64>,
    ) -> Result<ArrayD<f64>> {
        self.base_kernel.matrix(x1, x2)
    }

    fn task_matrix(&self) -> Array2<f64> {
        Array2::eye(self.num_tasks)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{Array, array};

    use super::*;
    use crate::kernels::ExponentiatedQuadratic;

    #[test]
    fn rejects_zero_tasks() {
        assert!(Independent::new(0, ExponentiatedQuadratic::default()).is_err());
    }

    #[test]
    fn matrix_over_all_tasks_is_block_kronecker() {
        let base = ExponentiatedQuadratic::new(0.5, 2.).unwrap();
        let kernel = Independent::new(3, base.clone()).unwrap();
        let x = array![[0., 0.], [1., 1.]].into_dyn();
        let y = array![[0., 1.], [2., 0.], [-1., 0.]].into_dyn();

        let k = base.matrix(x.view(), y.view()).unwrap();
        let full = kernel.matrix_over_all_tasks(x.view(), y.view()).unwrap();
        assert_eq!(full.shape(), &[6, 9]);

        for n in 0..2 {
            for m in 0..3 {
                for t in 0..3 {
                    for s in 0..3 {
                        let expected = if t == s { k[[n, m]] } else { 0. };
                        assert_relative_eq!(full[[n * 3 + t, m * 3 + s]], expected);
                    }
                }
            }
        }
    }

    #[test]
    fn batch_shape_comes_from_base() {
        let base = ExponentiatedQuadratic::new(array![1., 2.], 1.).unwrap();
        let kernel = Independent::new(2, base).unwrap();
        assert_eq!(kernel.batch_shape(), vec![2]);

        let x = Array::<f64, _>::zeros((5, 4, 1)).into_dyn();
        let full = kernel.matrix_over_all_tasks(x.view(), x.view());
        // kernel batch [2] doesn't broadcast against index points batch [5]
        assert!(full.is_err());

        let x = Array::<f64, _>::zeros((4, 1)).into_dyn();
        let full = kernel.matrix_over_all_tasks(x.view(), x.view()).unwrap();
        assert_eq!(full.shape(), &[2, 8, 8]);
    }
}

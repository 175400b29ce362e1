use ndarray::{Array2, ArrayD, ArrayViewD};

use super::MultiTaskKernel;
use crate::{
    GpErr, Result,
    kernels::PsdKernel,
    linalg::{add_diagonal, from_array2},
};

const SYMMETRY_TOLERANCE: f64 = 1e-10;
/// Relative diagonal shift under which a semi-definite task covariance still factors.
const PSD_TOLERANCE: f64 = 1e-10;

/// A multi-task kernel with a full task covariance: `k((x, t), (y, s)) = k(x, y) * B[t, s]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Separable<K> {
    base_kernel: K,
    task_covariance: Array2<f64>,
}

impl<K: PsdKernel> Separable<K> {
    /// Creates a new `Separable` kernel.
    ///
    /// # Arguments
    /// * `base_kernel` - The kernel over index points.
    /// * `task_covariance` - A symmetric positive semi-definite `T x T` matrix.
    ///
    /// # Returns
    /// A new kernel or an error if the task covariance is not a valid covariance matrix.
    pub fn new(base_kernel: K, task_covariance: Array2<f64>) -> Result<Self> {
        let (rows, cols) = task_covariance.dim();
        if rows == 0 || rows != cols {
            return Err(GpErr::InvalidParameter {
                what: "task_covariance",
                reason: format!("must be a non empty square matrix, got {rows}x{cols}"),
            });
        }

        let asymmetric = (0..rows)
            .flat_map(|i| (0..i).map(move |j| (i, j)))
            .any(|(i, j)| {
                (task_covariance[[i, j]] - task_covariance[[j, i]]).abs() > SYMMETRY_TOLERANCE
            });
        if asymmetric {
            return Err(GpErr::InvalidParameter {
                what: "task_covariance",
                reason: "must be symmetric".into(),
            });
        }

        let scale = task_covariance
            .diag()
            .iter()
            .fold(1f64, |acc, v| acc.max(v.abs()));
        let mut shifted = from_array2(task_covariance.view());
        add_diagonal(&mut shifted, PSD_TOLERANCE * scale);
        if shifted.cholesky().is_none() {
            return Err(GpErr::InvalidParameter {
                what: "task_covariance",
                reason: "must be positive semi-definite".into(),
            });
        }

        Ok(Self {
            base_kernel,
            task_covariance,
        })
    }

    pub fn base_kernel(&self) -> &K {
        &self.base_kernel
    }
}

impl<K: PsdKernel> MultiTaskKernel for Separable<K> {
    fn num_tasks(&self) -> usize {
        self.task_covariance.nrows()
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
        self.task_covariance.clone()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::array;

    use super::*;
    use crate::kernels::{ExponentiatedQuadratic, Independent};

    #[test]
    fn identity_matches_independent() {
        let base = ExponentiatedQuadratic::new(1.5, 0.7).unwrap();
        let separable = Separable::new(base.clone(), Array2::eye(2)).unwrap();
        let independent = Independent::new(2, base).unwrap();

        let x = array![[0.1], [0.4], [-0.3]].into_dyn();
        let a = separable.matrix_over_all_tasks(x.view(), x.view()).unwrap();
        let b = independent.matrix_over_all_tasks(x.view(), x.view()).unwrap();
        assert_relative_eq!(a, b);
    }

    #[test]
    fn scales_by_task_covariance() {
        let base = ExponentiatedQuadratic::default();
        let kernel = Separable::new(base, array![[2., 0.5], [0.5, 1.]]).unwrap();
        let x = array![[0.], [1.]].into_dyn();
        let full = kernel.matrix_over_all_tasks(x.view(), x.view()).unwrap();

        let k01 = (-0.5f64).exp();
        assert_relative_eq!(full[[0, 0]], 2.);
        assert_relative_eq!(full[[0, 1]], 0.5);
        assert_relative_eq!(full[[1, 3]], k01, max_relative = 1e-12);
        assert_relative_eq!(full[[0, 3]], 0.5 * k01, max_relative = 1e-12);
    }

    #[test]
    fn rejects_invalid_task_covariance() {
        let base = ExponentiatedQuadratic::default();
        assert!(Separable::new(base.clone(), array![[1., 0.2], [0.3, 1.]]).is_err());
        assert!(Separable::new(base.clone(), array![[1., 2.], [2., 1.]]).is_err());
        assert!(Separable::new(base.clone(), Array2::zeros((2, 3))).is_err());
        assert!(Separable::new(base, array![[1., 1.], [1., 1.]]).is_ok());
    }

    #[test]
    fn singular_task_covariance_is_accepted() {
        let base = ExponentiatedQuadratic::default();
        let rank_one = array![[4., 2., -2.], [2., 1., -1.], [-2., -1., 1.]];
        let kernel = Separable::new(base.clone(), rank_one.clone()).unwrap();
        assert_eq!(kernel.num_tasks(), 3);
        assert_relative_eq!(kernel.task_matrix(), rank_one);

        assert!(Separable::new(base, Array2::zeros((2, 2))).is_ok());
    }

    #[test]
    fn indefinite_task_covariance_is_rejected() {
        let base = ExponentiatedQuadratic::default();
        let result = Separable::new(base, array![[1., 0., 0.], [0., -1e-3, 0.], [0., 0., 1.]]);
        assert!(matches!(
            result,
            Err(GpErr::InvalidParameter {
                what: "task_covariance",
                ..
            })
        ));
    }
}

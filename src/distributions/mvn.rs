use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector};
use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::{
    GpErr, Result, linalg,
    shape::{broadcast_shapes, concat, index_map, split_batch},
};

/// A batch of multivariate normal distributions, each parameterized by its mean and the lower
/// triangular Cholesky factor of its covariance.
///
/// Batch members are stored in C order of the batch shape. Events may have more than one
/// dimension, in which case they're flattened in C order.
#[derive(Debug, Clone)]
pub struct MultivariateNormal {
    batch_shape: Vec<usize>,
    event_shape: Vec<usize>,
    loc: Vec<DVector<f64>>,
    scale_tril: Vec<DMatrix<f64>>,
}

impl MultivariateNormal {
    /// Creates a new `MultivariateNormal`.
    ///
    /// # Arguments
    /// * `batch_shape` - The shape of the batch.
    /// * `event_shape` - The shape of a single draw.
    /// * `loc` - One mean per batch member.
    /// * `scale_tril` - One lower triangular scale per batch member.
    ///
    /// # Returns
    /// A new distribution or an error if the parameters don't agree with the shapes.
    pub fn new(
        batch_shape: Vec<usize>,
        event_shape: Vec<usize>,
        loc: Vec<DVector<f64>>,
        scale_tril: Vec<DMatrix<f64>>,
    ) -> Result<Self> {
        let nbatch: usize = batch_shape.iter().product();
        let dim: usize = event_shape.iter().product();

        for (what, got) in [("loc", loc.len()), ("scale_tril", scale_tril.len())] {
            if got != nbatch {
                return Err(GpErr::SizeMismatch {
                    a: what,
                    b: "batch",
                    got,
                    expected: nbatch,
                });
            }
        }

        if let Some(v) = loc.iter().find(|v| v.len() != dim) {
            return Err(GpErr::SizeMismatch {
                a: "loc",
                b: "event",
                got: v.len(),
                expected: dim,
            });
        }

        if let Some(m) = scale_tril.iter().find(|m| m.shape() != (dim, dim)) {
            return Err(GpErr::SizeMismatch {
                a: "scale_tril",
                b: "event",
                got: m.nrows(),
                expected: dim,
            });
        }

        Ok(Self {
            batch_shape,
            event_shape,
            loc,
            scale_tril,
        })
    }

    /// Creates a new `MultivariateNormal` from full covariance matrices.
    ///
    /// # Arguments
    /// * `batch_shape` - The shape of the batch.
    /// * `event_shape` - The shape of a single draw.
    /// * `loc` - One mean per batch member.
    /// * `covariance` - One symmetric covariance per batch member.
    /// * `jitter` - The diagonal shift added before factoring the covariances.
    ///
    /// # Returns
    /// A new distribution or an error if some covariance is not positive definite.
    pub fn from_covariance(
        batch_shape: Vec<usize>,
        event_shape: Vec<usize>,
        loc: Vec<DVector<f64>>,
        covariance: Vec<DMatrix<f64>>,
        jitter: f64,
    ) -> Result<Self> {
        let scale_tril = covariance
            .par_iter()
            .map(|cov| linalg::cholesky("predictive covariance", cov, jitter).map(|c| c.unpack()))
            .collect::<Result<Vec<_>>>()?;

        Self::new(batch_shape, event_shape, loc, scale_tril)
    }

    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    pub fn event_shape(&self) -> &[usize] {
        &self.event_shape
    }

    fn dim(&self) -> usize {
        self.event_shape.iter().product()
    }

    fn full_shape(&self, prefix: &[usize]) -> Vec<usize> {
        concat(&[prefix, &self.batch_shape[..], &self.event_shape[..]])
    }

    /// The means, of shape `batch ++ event`.
    pub fn mean(&self) -> Result<ArrayD<f64>> {
        let values: Vec<f64> = self.loc.iter().flat_map(|v| v.iter().copied()).collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&self.full_shape(&[])), values)?)
    }

    /// The marginal variances, of shape `batch ++ event`.
    pub fn variance(&self) -> Result<ArrayD<f64>> {
        let values: Vec<f64> = self
            .scale_tril
            .iter()
            .flat_map(|l| l.row_iter().map(|row| row.norm_squared()).collect::<Vec<_>>())
            .collect();
        Ok(ArrayD::from_shape_vec(IxDyn(&self.full_shape(&[])), values)?)
    }

    /// Computes the log density of `x`.
    ///
    /// # Arguments
    /// * `x` - Points of shape `[s..., event...]`, where `s...` broadcasts against the batch.
    ///
    /// # Returns
    /// The log densities, of shape `broadcast(s..., batch)`.
    pub fn log_prob<S, D>(&self, x: &ArrayBase<S, D>) -> Result<ArrayD<f64>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let (x_batch, x_event) = split_batch("x", x.shape(), self.event_shape.len())?;
        if x_event != self.event_shape.as_slice() {
            return Err(GpErr::IncompatibleShapes {
                a: "x",
                b: "event",
                a_shape: x.shape().to_vec(),
                b_shape: self.event_shape.clone(),
            });
        }

        let out_shape = broadcast_shapes(("x", x_batch), ("batch", &self.batch_shape))?;
        let map_x = index_map("x", x_batch, &out_shape)?;
        let map_d = index_map("batch", &self.batch_shape, &out_shape)?;

        let dim = self.dim();
        let values: Vec<f64> = x.iter().copied().collect();
        let half_log_det: Vec<f64> = self
            .scale_tril
            .iter()
            .map(|l| l.diagonal().iter().map(|d| d.ln()).sum())
            .collect();
        let log_norm = 0.5 * dim as f64 * (2. * PI).ln();

        let lp: Vec<f64> = map_x
            .par_iter()
            .zip(map_d.par_iter())
            .map(|(&xi, &di)| {
                let diff = linalg::vector_block(&values, xi, dim) - &self.loc[di];
                match self.scale_tril[di].solve_lower_triangular(&diff) {
                    Some(z) => -0.5 * z.norm_squared() - half_log_det[di] - log_norm,
                    None => f64::NAN,
                }
            })
            .collect();

        Ok(ArrayD::from_shape_vec(IxDyn(&out_shape), lp)?)
    }

    /// Draws samples.
    ///
    /// # Arguments
    /// * `sample_shape` - The shape of the independent draws.
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// The samples, of shape `sample_shape ++ batch ++ event`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        sample_shape: &[usize],
        rng: &mut R,
    ) -> Result<ArrayD<f64>> {
        let nsamples: usize = sample_shape.iter().product();
        let dim = self.dim();

        let mut values = Vec::with_capacity(nsamples * self.loc.len() * dim);
        for _ in 0..nsamples {
            for (loc, scale) in self.loc.iter().zip(&self.scale_tril) {
                let z: DVector<f64> = DVector::from_fn(dim, |_, _| StandardNormal.sample(rng));
                values.extend((loc + scale * z).iter().copied());
            }
        }

        Ok(ArrayD::from_shape_vec(
            IxDyn(&self.full_shape(sample_shape)),
            values,
        )?)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::{Array, array};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn standard(batch: usize, dim: usize) -> MultivariateNormal {
        MultivariateNormal::new(
            vec![batch],
            vec![dim],
            vec![DVector::zeros(dim); batch],
            vec![DMatrix::identity(dim, dim); batch],
        )
        .unwrap()
    }

    #[test]
    fn log_prob_univariate() {
        let mvn = MultivariateNormal::new(
            vec![],
            vec![1],
            vec![DVector::from_element(1, 1.)],
            vec![DMatrix::from_element(1, 1, 2.)],
        )
        .unwrap();

        let lp = mvn.log_prob(&array![3.]).unwrap();
        let expected = -0.5 * 1. - 2f64.ln() - 0.5 * (2. * PI).ln();
        assert_eq!(lp.ndim(), 0);
        assert_relative_eq!(lp.sum(), expected, max_relative = 1e-12);
    }

    #[test]
    fn log_prob_full_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[2., 0.6, 0.6, 1.]);
        let mvn = MultivariateNormal::from_covariance(
            vec![],
            vec![2],
            vec![DVector::from_column_slice(&[0.5, -1.])],
            vec![cov.clone()],
            0.,
        )
        .unwrap();

        let x = array![1., 0.];
        let diff = DVector::from_column_slice(&[0.5, 1.]);
        let det = cov.determinant();
        let inv = cov.try_inverse().unwrap();
        let quad = (diff.transpose() * inv * &diff)[(0, 0)];
        let expected = -0.5 * quad - 0.5 * det.ln() - (2. * PI).ln();

        assert_relative_eq!(mvn.log_prob(&x).unwrap().sum(), expected, max_relative = 1e-10);
    }

    #[test]
    fn log_prob_broadcasts_sample_dims() {
        let mvn = standard(3, 2);
        let x = Array::<f64, _>::zeros((5, 1, 2));
        let lp = mvn.log_prob(&x).unwrap();
        assert_eq!(lp.shape(), &[5, 3]);
        assert_relative_eq!(lp[[4, 2]], -(2. * PI).ln(), max_relative = 1e-12);

        let bad = Array::<f64, _>::zeros((5, 2, 2));
        assert!(mvn.log_prob(&bad).is_err());
        let bad = Array::<f64, _>::zeros((3, 4));
        assert!(mvn.log_prob(&bad).is_err());
    }

    #[test]
    fn sample_shape_and_moments() {
        let mvn = MultivariateNormal::new(
            vec![2],
            vec![1],
            vec![DVector::from_element(1, -3.), DVector::from_element(1, 5.)],
            vec![DMatrix::from_element(1, 1, 0.5); 2],
        )
        .unwrap();

        let mut rng = StdRng::seed_from_u64(42);
        let samples = mvn.sample(&[4000], &mut rng).unwrap();
        assert_eq!(samples.shape(), &[4000, 2, 1]);

        let means = samples.mean_axis(ndarray::Axis(0)).unwrap();
        assert_relative_eq!(means[[0, 0]], -3., epsilon = 0.05);
        assert_relative_eq!(means[[1, 0]], 5., epsilon = 0.05);
    }

    #[test]
    fn mean_and_variance_shapes() {
        let mvn = MultivariateNormal::new(
            vec![3],
            vec![2, 2],
            vec![DVector::zeros(4); 3],
            vec![DMatrix::identity(4, 4); 3],
        )
        .unwrap();
        assert_eq!(mvn.mean().unwrap().shape(), &[3, 2, 2]);

        let var = mvn.variance().unwrap();
        assert_eq!(var.shape(), &[3, 2, 2]);
        assert!(var.iter().all(|v| (*v - 1.).abs() < 1e-12));

        let flat_event = MultivariateNormal::new(
            vec![3],
            vec![2, 2],
            vec![DVector::zeros(3); 3],
            vec![DMatrix::identity(3, 3); 3],
        );
        assert!(flat_event.is_err());
    }

    #[test]
    fn rejects_mismatched_parameters() {
        let err = MultivariateNormal::new(
            vec![2],
            vec![2],
            vec![DVector::zeros(2)],
            vec![DMatrix::identity(2, 2)],
        );
        assert!(err.is_err());
    }
}

use ndarray::{ArrayBase, ArrayD, ArrayViewD, Axis, Data, Dimension};
use rand::Rng;

use super::{
    MultivariateNormal,
    regression::{Parts, Regression},
};
use crate::{
    Result,
    array::IntoArray,
    kernels::{Independent, PsdKernel},
};

const DEFAULT_JITTER: f64 = 1e-6;

/// The posterior of a single-task Gaussian process conditioned on observations.
///
/// Draws have shape `[N]`.
pub struct GaussianProcessRegressionModel<K> {
    inner: Regression<Independent<K>>,
}

/// Builds a [`GaussianProcessRegressionModel`].
pub struct GaussianProcessRegressionModelBuilder<K> {
    parts: Parts<K>,
}

/// Appends a unit task axis.
fn with_task_axis(a: ArrayD<f64>) -> ArrayD<f64> {
    let ndim = a.ndim();
    a.insert_axis(Axis(ndim))
}

impl<K: PsdKernel> GaussianProcessRegressionModelBuilder<K> {
    fn new(kernel: K) -> Self {
        Self {
            parts: Parts {
                kernel,
                observation_index_points: None,
                observations: None,
                observations_is_missing: None,
                index_points: None,
                observation_noise_variance: None,
                predictive_noise_variance: None,
                mean_fn: None,
                jitter: DEFAULT_JITTER,
                validate_args: false,
            },
        }
    }

    pub fn observation_index_points(mut self, x: impl IntoArray) -> Self {
        self.parts.observation_index_points = Some(x.into_array());
        self
    }

    /// Observations of shape `[b..., M]`.
    pub fn observations(mut self, y: impl IntoArray) -> Self {
        self.parts.observations = Some(y.into_array());
        self
    }

    pub fn observations_is_missing<S, D>(mut self, mask: ArrayBase<S, D>) -> Self
    where
        S: Data<Elem = bool>,
        D: Dimension,
    {
        self.parts.observations_is_missing = Some(mask.into_owned().into_dyn());
        self
    }

    pub fn index_points(mut self, x: impl IntoArray) -> Self {
        self.parts.index_points = Some(x.into_array());
        self
    }

    pub fn observation_noise_variance(mut self, variance: impl IntoArray) -> Self {
        self.parts.observation_noise_variance = Some(variance.into_array());
        self
    }

    pub fn predictive_noise_variance(mut self, variance: impl IntoArray) -> Self {
        self.parts.predictive_noise_variance = Some(variance.into_array());
        self
    }

    /// The prior mean, its output must broadcast to `[b..., N]`.
    pub fn mean_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(ArrayViewD<'_, f64>) -> ArrayD<f64> + Send + Sync + 'static,
    {
        self.parts.mean_fn = Some(Box::new(f));
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        self.parts.jitter = jitter;
        self
    }

    pub fn validate_args(mut self, validate_args: bool) -> Self {
        self.parts.validate_args = validate_args;
        self
    }

    /// Validates the parameters and conditions the model on the observations.
    pub fn build(self) -> Result<GaussianProcessRegressionModel<K>> {
        let Parts {
            kernel,
            observation_index_points,
            observations,
            observations_is_missing,
            index_points,
            observation_noise_variance,
            predictive_noise_variance,
            mean_fn,
            jitter,
            validate_args,
        } = self.parts;

        let parts = Parts {
            kernel: Independent::new(1, kernel)?,
            observation_index_points,
            observations: observations.map(with_task_axis),
            observations_is_missing: observations_is_missing.map(|mask| {
                let ndim = mask.ndim();
                mask.insert_axis(Axis(ndim))
            }),
            index_points,
            observation_noise_variance,
            predictive_noise_variance,
            mean_fn: mean_fn.map(|f| -> crate::mean_fn::MeanFn {
                Box::new(move |x: ArrayViewD<'_, f64>| with_task_axis(f(x)))
            }),
            jitter,
            validate_args,
        };

        Ok(GaussianProcessRegressionModel {
            inner: Regression::new(parts, true)?,
        })
    }
}

impl<K: PsdKernel> GaussianProcessRegressionModel<K> {
    pub fn builder(kernel: K) -> GaussianProcessRegressionModelBuilder<K> {
        GaussianProcessRegressionModelBuilder::new(kernel)
    }

    pub fn kernel(&self) -> &K {
        self.inner.kernel().base_kernel()
    }

    pub fn index_points(&self) -> Option<&ArrayD<f64>> {
        self.inner.index_points()
    }

    pub fn observation_index_points(&self) -> Option<&ArrayD<f64>> {
        self.inner.observation_index_points()
    }

    pub fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    pub fn batch_shape_tensor<S, D>(&self, index_points: &ArrayBase<S, D>) -> Result<Vec<usize>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.inner
            .batch_shape_at(Some(index_points.view().into_dyn()))
    }

    /// `[N]`, fails if no index points were bound at construction.
    pub fn event_shape(&self) -> Result<Vec<usize>> {
        self.inner.event_shape()
    }

    pub fn mean(&self) -> Result<ArrayD<f64>> {
        self.inner.mean(None)
    }

    pub fn mean_at<S, D>(&self, index_points: &ArrayBase<S, D>) -> Result<ArrayD<f64>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.inner.mean(Some(index_points.view().into_dyn()))
    }

    pub fn variance(&self) -> Result<ArrayD<f64>> {
        self.inner.variance(None)
    }

    pub fn distribution(&self) -> Result<MultivariateNormal> {
        self.inner.distribution(None)
    }

    /// The log density of `x`, of shape `[s..., N]`.
    pub fn log_prob<S, D>(&self, x: &ArrayBase<S, D>) -> Result<ArrayD<f64>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.inner.log_prob(x.view().into_dyn(), None)
    }

    pub fn log_prob_at<S, D, S2, D2>(
        &self,
        x: &ArrayBase<S, D>,
        index_points: &ArrayBase<S2, D2>,
    ) -> Result<ArrayD<f64>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
        S2: Data<Elem = f64>,
        D2: Dimension,
    {
        self.inner
            .log_prob(x.view().into_dyn(), Some(index_points.view().into_dyn()))
    }

    /// Draws samples of shape `sample_shape ++ batch ++ [N]`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        sample_shape: &[usize],
        rng: &mut R,
    ) -> Result<ArrayD<f64>> {
        self.inner.sample(sample_shape, rng, None)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use approx::assert_relative_eq;
    use ndarray::{Array1, array};

    use super::*;
    use crate::kernels::ExponentiatedQuadratic;

    #[test]
    fn single_observation_posterior() {
        let model = GaussianProcessRegressionModel::builder(ExponentiatedQuadratic::default())
            .observation_index_points(array![[0.]])
            .observations(array![1.])
            .observation_noise_variance(0.5)
            .predictive_noise_variance(0.)
            .index_points(array![[0.], [1.]])
            .jitter(0.)
            .build()
            .unwrap();

        assert_eq!(model.event_shape().unwrap(), vec![2]);

        let k01 = (-0.5f64).exp();
        let mean = model.mean().unwrap();
        assert_eq!(mean.shape(), &[2]);
        assert_relative_eq!(mean[0], 1. / 1.5, max_relative = 1e-12);
        assert_relative_eq!(mean[1], k01 / 1.5, max_relative = 1e-12);

        let var = model.variance().unwrap();
        assert_relative_eq!(var[0], 1. - 1. / 1.5, max_relative = 1e-12);
        assert_relative_eq!(var[1], 1. - k01 * k01 / 1.5, max_relative = 1e-12);
    }

    #[test]
    fn prior_log_prob_is_standard_normal() {
        let model = GaussianProcessRegressionModel::builder(ExponentiatedQuadratic::default())
            .index_points(array![[0.]])
            .jitter(0.)
            .build()
            .unwrap();

        let lp = model.log_prob(&array![0.]).unwrap();
        assert_eq!(lp.ndim(), 0);
        assert_relative_eq!(lp.sum(), -0.5 * (2. * PI).ln(), max_relative = 1e-12);
    }

    #[test]
    fn mean_fn_drops_task_axis() {
        let model = GaussianProcessRegressionModel::builder(ExponentiatedQuadratic::default())
            .index_points(array![[0.], [1.], [2.]])
            .mean_fn(|x| x.index_axis(Axis(x.ndim() - 1), 0).to_owned())
            .build()
            .unwrap();

        let mean = model.mean().unwrap();
        assert_eq!(mean, Array1::from(vec![0., 1., 2.]).into_dyn());
        assert_eq!(model.sample(&[3], &mut rand::rng()).unwrap().shape(), &[3, 3]);
    }
}

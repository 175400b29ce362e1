use ndarray::{ArrayBase, ArrayD, ArrayViewD, Data, Dimension};
use rand::Rng;

use super::{
    MultivariateNormal,
    regression::{Parts, Regression},
};
use crate::{Result, array::IntoArray, kernels::MultiTaskKernel};

const DEFAULT_JITTER: f64 = 1e-6;

/// The posterior of a multi-task Gaussian process conditioned on observations.
///
/// Draws have shape `[N, T]`: the value of each of the `T` tasks at each of the `N` index
/// points. Without observations the model is the multi-task prior.
pub struct MultiTaskGaussianProcessRegressionModel<K> {
    inner: Regression<K>,
}

/// Builds a [`MultiTaskGaussianProcessRegressionModel`].
pub struct MultiTaskGaussianProcessRegressionModelBuilder<K> {
    parts: Parts<K>,
}

impl<K: MultiTaskKernel> MultiTaskGaussianProcessRegressionModelBuilder<K> {
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

    /// Index points of shape `[b..., M, f...]` at which the observations were made.
    pub fn observation_index_points(mut self, x: impl IntoArray) -> Self {
        self.parts.observation_index_points = Some(x.into_array());
        self
    }

    /// Observations of shape `[b..., M, T]`.
    pub fn observations(mut self, y: impl IntoArray) -> Self {
        self.parts.observations = Some(y.into_array());
        self
    }

    /// A mask broadcastable against the observations, `true` where a value is missing.
    pub fn observations_is_missing<S, D>(mut self, mask: ArrayBase<S, D>) -> Self
    where
        S: Data<Elem = bool>,
        D: Dimension,
    {
        self.parts.observations_is_missing = Some(mask.into_owned().into_dyn());
        self
    }

    /// Index points of shape `[b..., N, f...]` to predict at.
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

    /// The prior mean, its output must broadcast to `[b..., N, T]`.
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

    /// Whether to check parameter values on top of their shapes.
    pub fn validate_args(mut self, validate_args: bool) -> Self {
        self.parts.validate_args = validate_args;
        self
    }

    /// Validates the parameters and conditions the model on the observations.
    pub fn build(self) -> Result<MultiTaskGaussianProcessRegressionModel<K>> {
        Ok(MultiTaskGaussianProcessRegressionModel {
            inner: Regression::new(self.parts, false)?,
        })
    }
}

impl<K: MultiTaskKernel> MultiTaskGaussianProcessRegressionModel<K> {
    pub fn builder(kernel: K) -> MultiTaskGaussianProcessRegressionModelBuilder<K> {
        MultiTaskGaussianProcessRegressionModelBuilder::new(kernel)
    }

    pub fn kernel(&self) -> &K {
        self.inner.kernel()
    }

    pub fn num_tasks(&self) -> usize {
        self.inner.kernel().num_tasks()
    }

    pub fn index_points(&self) -> Option<&ArrayD<f64>> {
        self.inner.index_points()
    }

    pub fn observation_index_points(&self) -> Option<&ArrayD<f64>> {
        self.inner.observation_index_points()
    }

    /// The batch shape with the index points bound at construction.
    pub fn batch_shape(&self) -> &[usize] {
        self.inner.batch_shape()
    }

    /// The batch shape when evaluated at `index_points`.
    pub fn batch_shape_tensor<S, D>(&self, index_points: &ArrayBase<S, D>) -> Result<Vec<usize>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.inner
            .batch_shape_at(Some(index_points.view().into_dyn()))
    }

    /// `[N, T]`, fails if no index points were bound at construction.
    pub fn event_shape(&self) -> Result<Vec<usize>> {
        self.inner.event_shape()
    }

    /// The event shape when evaluated at `index_points`.
    pub fn event_shape_tensor<S, D>(&self, index_points: &ArrayBase<S, D>) -> Result<Vec<usize>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        let prediction = self
            .inner
            .predict(Some(index_points.view().into_dyn()), false)?;
        Ok(self.inner.event_shape_for(prediction.num_points))
    }

    /// The predictive mean at the bound index points, of shape `batch ++ [N, T]`.
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

    /// The predictive marginal variances, of shape `batch ++ [N, T]`.
    pub fn variance(&self) -> Result<ArrayD<f64>> {
        self.inner.variance(None)
    }

    pub fn variance_at<S, D>(&self, index_points: &ArrayBase<S, D>) -> Result<ArrayD<f64>>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.inner.variance(Some(index_points.view().into_dyn()))
    }

    /// The joint predictive distribution over every (index point, task) pair.
    pub fn distribution(&self) -> Result<MultivariateNormal> {
        self.inner.distribution(None)
    }

    pub fn distribution_at<S, D>(
        &self,
        index_points: &ArrayBase<S, D>,
    ) -> Result<MultivariateNormal>
    where
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.inner.distribution(Some(index_points.view().into_dyn()))
    }

    /// The log density of `x`, of shape `[s..., N, T]`.
    ///
    /// # Returns
    /// The log densities, of shape `broadcast(s..., batch)`.
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

    /// Draws samples of shape `sample_shape ++ batch ++ [N, T]`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        sample_shape: &[usize],
        rng: &mut R,
    ) -> Result<ArrayD<f64>> {
        self.inner.sample(sample_shape, rng, None)
    }

    pub fn sample_at<R, S, D>(
        &self,
        sample_shape: &[usize],
        rng: &mut R,
        index_points: &ArrayBase<S, D>,
    ) -> Result<ArrayD<f64>>
    where
        R: Rng + ?Sized,
        S: Data<Elem = f64>,
        D: Dimension,
    {
        self.inner
            .sample(sample_shape, rng, Some(index_points.view().into_dyn()))
    }
}

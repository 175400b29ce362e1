//! Multi-task Gaussian process regression.
//!
//! A [`MultiTaskGaussianProcessRegressionModel`] is the posterior of a vector valued Gaussian
//! process conditioned on (possibly noisy, possibly partially missing) observations. Every
//! parameter may carry leading batch dimensions, which broadcast against each other.

pub mod array;
pub mod config;
pub mod distributions;
pub mod error;
pub mod kernels;
pub mod linalg;
pub mod mean_fn;
pub mod shape;

use config::{Adapter, Report, RunConfig};

pub use array::IntoArray;
pub use distributions::{
    GaussianProcessRegressionModel, MultiTaskGaussianProcessRegressionModel, MultivariateNormal,
};
pub use error::{GpErr, Result};
pub use kernels::{
    BaseKernel, ExponentiatedQuadratic, Independent, MaternFiveHalves, MultiTaskKernel,
    PsdKernel, Separable,
};

/// Builds the model described by `config` and summarizes its posterior.
///
/// # Errors
/// Returns a `GpErr` if the configuration is inconsistent or a covariance can't be factored.
pub fn run(config: &RunConfig) -> Result<Report> {
    log::info!(
        num_tasks = config.tasks.num_tasks(),
        num_observations = config.data.observations.len();
        "adapting config"
    );
    let model = Adapter::new().adapt(config)?;

    log::info!(
        "predicting at {} index point(s)",
        config.data.index_points.len()
    );
    Report::new(&model, config.num_samples, config.seed)
}

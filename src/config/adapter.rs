use log::debug;
use ndarray::{Array1, Array2};

use super::{DataConfig, KernelConfig, RunConfig, TasksConfig};
use crate::{
    GpErr, Result,
    distributions::MultiTaskGaussianProcessRegressionModel,
    kernels::{
        BaseKernel, ExponentiatedQuadratic, Independent, MaternFiveHalves, MultiTaskKernel,
        Separable,
    },
    mean_fn,
};

/// A model built from a [`RunConfig`].
pub type ConfiguredModel = MultiTaskGaussianProcessRegressionModel<Box<dyn MultiTaskKernel>>;

/// Turns configurations into models.
#[derive(Debug, Default)]
pub struct Adapter;

impl Adapter {
    pub fn new() -> Self {
        Self
    }

    /// Validates `config` and builds the model it describes.
    ///
    /// # Returns
    /// The model or an error if the configuration is inconsistent.
    pub fn adapt(&self, config: &RunConfig) -> Result<ConfiguredModel> {
        self.validate_data(&config.data, config.tasks.num_tasks())?;
        if let Some(means) = &config.task_means
            && means.len() != config.tasks.num_tasks()
        {
            return Err(GpErr::InvalidConfig(format!(
                "task_means has {} value(s) but there are {} task(s)",
                means.len(),
                config.tasks.num_tasks()
            )));
        }

        let kernel = self.adapt_kernel(config.kernel, &config.tasks)?;
        let mut builder = MultiTaskGaussianProcessRegressionModel::builder(kernel)
            .index_points(self.matrix("index_points", &config.data.index_points)?)
            .observation_noise_variance(config.observation_noise_variance)
            .jitter(config.jitter)
            .validate_args(config.validate_args);

        if !config.data.observations.is_empty() {
            let (observations, missing) = self.observations(&config.data.observations)?;
            builder = builder
                .observation_index_points(self.matrix(
                    "observation_index_points",
                    &config.data.observation_index_points,
                )?)
                .observations(observations)
                .observations_is_missing(missing);
        }

        if let Some(variance) = config.predictive_noise_variance {
            builder = builder.predictive_noise_variance(variance);
        }

        if let Some(means) = &config.task_means {
            builder = builder.mean_fn(mean_fn::constant(Array1::from(means.clone())));
        }

        builder.build()
    }

    // -------------------------------------------------------------------------
    // Validation
    // -------------------------------------------------------------------------

    fn validate_data(&self, data: &DataConfig, num_tasks: usize) -> Result<()> {
        if num_tasks == 0 {
            return Err(GpErr::InvalidConfig("at least one task is required".into()));
        }

        if data.index_points.is_empty() {
            return Err(GpErr::InvalidConfig(
                "at least one index point is required".into(),
            ));
        }

        if data.observations.len() != data.observation_index_points.len() {
            return Err(GpErr::InvalidConfig(format!(
                "{} observation row(s) for {} observation index point(s)",
                data.observations.len(),
                data.observation_index_points.len()
            )));
        }

        if let Some((i, row)) = data
            .observations
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != num_tasks)
        {
            return Err(GpErr::InvalidConfig(format!(
                "observation row {i} has {} value(s) but there are {num_tasks} task(s)",
                row.len()
            )));
        }

        let features = data.index_points[0].len();
        if let Some((i, row)) = data
            .observation_index_points
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != features)
        {
            return Err(GpErr::InvalidConfig(format!(
                "observation index point {i} has {} feature(s), index points have {features}",
                row.len()
            )));
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Adaptation
    // -------------------------------------------------------------------------

    fn adapt_kernel(
        &self,
        kernel: KernelConfig,
        tasks: &TasksConfig,
    ) -> Result<Box<dyn MultiTaskKernel>> {
        let base: BaseKernel = match kernel {
            KernelConfig::ExponentiatedQuadratic {
                amplitude,
                length_scale,
            } => ExponentiatedQuadratic::new(amplitude, length_scale)?.into(),
            KernelConfig::MaternFiveHalves {
                amplitude,
                length_scale,
            } => MaternFiveHalves::new(amplitude, length_scale)?.into(),
        };
        debug!("adapted base kernel {base:?}");

        Ok(match tasks {
            TasksConfig::Independent { num_tasks } => Box::new(Independent::new(*num_tasks, base)?),
            TasksConfig::Separable { task_covariance } => Box::new(Separable::new(
                base,
                self.matrix("task_covariance", task_covariance)?,
            )?),
        })
    }

    /// Splits rows with missing values into values and a missing mask.
    fn observations(&self, rows: &[Vec<Option<f64>>]) -> Result<(Array2<f64>, Array2<bool>)> {
        let values: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| row.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect();
        let values = self.matrix("observations", &values)?;
        let missing = values.mapv(f64::is_nan);
        Ok((values, missing))
    }

    fn matrix(&self, what: &str, rows: &[Vec<f64>]) -> Result<Array2<f64>> {
        let ncols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != ncols) {
            return Err(GpErr::InvalidConfig(format!(
                "{what} rows must all have the same length"
            )));
        }

        let values: Vec<f64> = rows.iter().flatten().copied().collect();
        Ok(Array2::from_shape_vec((rows.len(), ncols), values)?)
    }
}

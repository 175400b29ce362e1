use log::info;
use ndarray::{ArrayBase, Data, RemoveAxis};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::ConfiguredModel;
use crate::Result;

/// The posterior summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub batch_shape: Vec<usize>,
    pub event_shape: Vec<usize>,
    /// Predictive mean, one row per index point.
    pub mean: Vec<Vec<f64>>,
    pub variance: Vec<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub samples: Option<Vec<Vec<Vec<f64>>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub log_prob: Option<Vec<f64>>,
}

fn rows<S, D>(a: &ArrayBase<S, D>) -> Vec<Vec<f64>>
where
    S: Data<Elem = f64>,
    D: RemoveAxis,
{
    a.outer_iter()
        .map(|row| row.iter().copied().collect())
        .collect()
}

impl Report {
    /// Summarizes `model` at its bound index points.
    ///
    /// # Arguments
    /// * `model` - A model with bound index points and no batch dimensions.
    /// * `num_samples` - The number of posterior draws to include, none if zero.
    /// * `seed` - The seed of the sampler, drawn from the OS if `None`.
    pub fn new(model: &ConfiguredModel, num_samples: usize, seed: Option<u64>) -> Result<Self> {
        let mean = model.mean()?;
        let variance = model.variance()?;

        let (samples, log_prob) = if num_samples > 0 {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let samples = model.sample(&[num_samples], &mut rng)?;
            let log_prob = model.log_prob(&samples)?;
            info!("drew {num_samples} posterior sample(s)");

            (
                Some(samples.outer_iter().map(|s| rows(&s)).collect()),
                Some(log_prob.iter().copied().collect()),
            )
        } else {
            (None, None)
        };

        Ok(Self {
            batch_shape: model.batch_shape().to_vec(),
            event_shape: model.event_shape()?,
            mean: rows(&mean),
            variance: rows(&variance),
            samples,
            log_prob,
        })
    }
}

use serde::{Deserialize, Serialize};

use crate::Result;

const DEFAULT_JITTER: f64 = 1e-6;

fn unit() -> f64 {
    1.
}

fn default_jitter() -> f64 {
    DEFAULT_JITTER
}

/// The configuration of the kernel over index points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelConfig {
    ExponentiatedQuadratic {
        #[serde(default = "unit")]
        amplitude: f64,
        #[serde(default = "unit")]
        length_scale: f64,
    },
    MaternFiveHalves {
        #[serde(default = "unit")]
        amplitude: f64,
        #[serde(default = "unit")]
        length_scale: f64,
    },
}

/// How the tasks covary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TasksConfig {
    Independent { num_tasks: usize },
    Separable { task_covariance: Vec<Vec<f64>> },
}

impl TasksConfig {
    pub fn num_tasks(&self) -> usize {
        match self {
            TasksConfig::Independent { num_tasks } => *num_tasks,
            TasksConfig::Separable { task_covariance } => task_covariance.len(),
        }
    }
}

/// The data of a run, one row per index point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DataConfig {
    pub observation_index_points: Vec<Vec<f64>>,
    /// One value per task, `null` where missing.
    pub observations: Vec<Vec<Option<f64>>>,
    pub index_points: Vec<Vec<f64>>,
}

/// A complete regression run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunConfig {
    pub kernel: KernelConfig,
    pub tasks: TasksConfig,
    #[serde(default)]
    pub observation_noise_variance: f64,
    #[serde(default)]
    pub predictive_noise_variance: Option<f64>,
    /// A constant prior mean per task.
    #[serde(default)]
    pub task_means: Option<Vec<f64>>,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    #[serde(default)]
    pub validate_args: bool,
    pub data: DataConfig,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub num_samples: usize,
}

impl RunConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

//! Gaussian process regression over a separable multi-task kernel.
//!
//! Both regression models are built on [`Regression`]: the single-task model is a one-task
//! regression whose event drops the task axis.
//!
//! With observations `y` at `X_o`, task covariance `B` and prior mean `m`, the posterior at `X`
//! is normal with
//!
//! ```text
//! C     = kron(K(X_o, X_o), B) + observation_noise_variance * I
//! mean  = m(X) + kron(K(X, X_o), B) C⁻¹ (y - m(X_o))
//! cov   = kron(K(X, X), B) + predictive_noise_variance * I
//!         - kron(K(X, X_o), B) C⁻¹ kron(K(X_o, X), B)
//! ```
//!
//! Missing observations get their rows and columns of `C` replaced by the identity and their
//! centered value set to zero, which drops them from both expressions.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::{ArrayD, ArrayViewD, IxDyn};
use rand::Rng;
use rayon::prelude::*;

use super::MultivariateNormal;
use crate::{
    GpErr, Result,
    array::{IntoArray, flat},
    kernels::MultiTaskKernel,
    linalg::{add_diagonal, cholesky, from_array2, isolate, matrix_block, solve_lower},
    mean_fn::{self, MeanFn},
    shape::{broadcast_all, broadcast_shapes, concat, index_map, pad_left, split_batch},
};

/// Everything a regression model can be built from.
pub(crate) struct Parts<K> {
    pub kernel: K,
    pub observation_index_points: Option<ArrayD<f64>>,
    pub observations: Option<ArrayD<f64>>,
    pub observations_is_missing: Option<ArrayD<bool>>,
    pub index_points: Option<ArrayD<f64>>,
    pub observation_noise_variance: Option<ArrayD<f64>>,
    pub predictive_noise_variance: Option<ArrayD<f64>>,
    pub mean_fn: Option<MeanFn>,
    pub jitter: f64,
    pub validate_args: bool,
}

/// The factored observation covariance of a single batch member.
struct Factor {
    scale: DMatrix<f64>,
    alpha: DVector<f64>,
    missing: Vec<bool>,
}

/// The observations a regression is conditioned on, factored once per batch member.
struct Conditioning {
    index_points: ArrayD<f64>,
    num_points: usize,
    /// Broadcast batch shape of the kernel, observation index points, observations and mask.
    batch_shape: Vec<usize>,
    /// `batch_shape` further broadcast with the observation noise and the prior mean.
    factor_batch_shape: Vec<usize>,
    factors: Vec<Factor>,
}

/// The predictive mean and covariance at a set of index points, one per batch member.
pub(crate) struct Prediction {
    pub batch_shape: Vec<usize>,
    pub num_points: usize,
    pub loc: Vec<DVector<f64>>,
    pub covariance: Option<Vec<DMatrix<f64>>>,
}

pub(crate) struct Regression<K> {
    kernel: K,
    conditioning: Option<Conditioning>,
    index_points: Option<ArrayD<f64>>,
    observation_noise_variance: ArrayD<f64>,
    predictive_noise_variance: ArrayD<f64>,
    mean_fn: MeanFn,
    jitter: f64,
    single_task: bool,
    batch_shape: Vec<usize>,
}

impl<K: MultiTaskKernel> Regression<K> {
    /// Validates the parts and factors the observation covariance.
    ///
    /// # Arguments
    /// * `parts` - The model's parameters.
    /// * `single_task` - Whether events drop the task axis, the kernel must have one task.
    ///
    /// # Returns
    /// A new regression or an error if the parameters are invalid.
    pub fn new(parts: Parts<K>, single_task: bool) -> Result<Self> {
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
        } = parts;

        if !(jitter >= 0. && jitter.is_finite()) {
            return Err(GpErr::InvalidParameter {
                what: "jitter",
                reason: format!("must be non negative and finite, got {jitter}"),
            });
        }

        if single_task && kernel.num_tasks() != 1 {
            return Err(GpErr::SizeMismatch {
                a: "single task kernel",
                b: "num_tasks",
                got: kernel.num_tasks(),
                expected: 1,
            });
        }

        let observation_noise_variance =
            observation_noise_variance.unwrap_or_else(|| 0.0.into_array());
        let predictive_noise_variance =
            predictive_noise_variance.unwrap_or_else(|| observation_noise_variance.clone());
        if validate_args {
            check_variance("observation_noise_variance", &observation_noise_variance)?;
            check_variance("predictive_noise_variance", &predictive_noise_variance)?;
        }

        let mean_fn = mean_fn.unwrap_or_else(mean_fn::zero);

        if let Some(x) = &index_points {
            check_index_points("index_points", x, kernel.feature_ndims(), validate_args)?;
        }

        let conditioning = match (observation_index_points, observations) {
            (Some(x), Some(y)) => Some(Conditioning::new(
                &kernel,
                x,
                y,
                observations_is_missing,
                &observation_noise_variance,
                &mean_fn,
                jitter,
                validate_args,
            )?),
            (None, None) if observations_is_missing.is_none() => None,
            _ => return Err(GpErr::IncompleteObservations),
        };

        let mut regression = Self {
            kernel,
            conditioning,
            index_points,
            observation_noise_variance,
            predictive_noise_variance,
            mean_fn,
            jitter,
            single_task,
            batch_shape: Vec::new(),
        };

        let batch_shape =
            regression.batch_shape_at(regression.index_points.as_ref().map(|x| x.view()))?;
        regression.batch_shape = batch_shape;

        debug!(
            "built regression over {} task(s) conditioned on {} point(s): batch_shape={:?}",
            regression.kernel.num_tasks(),
            regression.conditioning.as_ref().map_or(0, |c| c.num_points),
            regression.batch_shape,
        );

        Ok(regression)
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn index_points(&self) -> Option<&ArrayD<f64>> {
        self.index_points.as_ref()
    }

    pub fn observation_index_points(&self) -> Option<&ArrayD<f64>> {
        self.conditioning.as_ref().map(|c| &c.index_points)
    }

    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    /// The batch shape of the model when evaluated at `index_points` (or the bound ones).
    pub fn batch_shape_at(&self, index_points: Option<ArrayViewD<'_, f64>>) -> Result<Vec<usize>> {
        let mut shapes: Vec<(&'static str, Vec<usize>)> = vec![
            ("kernel", self.kernel.batch_shape()),
            (
                "observation_noise_variance",
                self.observation_noise_variance.shape().to_vec(),
            ),
            (
                "predictive_noise_variance",
                self.predictive_noise_variance.shape().to_vec(),
            ),
        ];

        if let Some(c) = &self.conditioning {
            shapes.push(("observations", c.batch_shape.clone()));
        }

        if let Some(x) = index_points {
            let event_ndims = self.kernel.feature_ndims() + 1;
            let (x_batch, _) = split_batch("index_points", x.shape(), event_ndims)?;
            shapes.push(("index_points", x_batch.to_vec()));
        }

        broadcast_all(shapes.iter().map(|(what, shape)| (*what, shape.as_slice())))
    }

    /// The event shape at `num_points` index points.
    pub fn event_shape_for(&self, num_points: usize) -> Vec<usize> {
        if self.single_task {
            vec![num_points]
        } else {
            vec![num_points, self.kernel.num_tasks()]
        }
    }

    /// The event shape at the bound index points.
    pub fn event_shape(&self) -> Result<Vec<usize>> {
        let x = self.index_points.as_ref().ok_or(GpErr::MissingIndexPoints)?;
        let event_ndims = self.kernel.feature_ndims() + 1;
        let (_, x_event) = split_batch("index_points", x.shape(), event_ndims)?;
        Ok(self.event_shape_for(x_event[0]))
    }

    fn resolve<'a>(
        &'a self,
        index_points: Option<ArrayViewD<'a, f64>>,
    ) -> Result<ArrayViewD<'a, f64>> {
        match index_points {
            Some(x) => Ok(x),
            None => self
                .index_points
                .as_ref()
                .map(|x| x.view())
                .ok_or(GpErr::MissingIndexPoints),
        }
    }

    /// Computes the predictive mean and, optionally, covariance.
    ///
    /// # Arguments
    /// * `index_points` - Where to predict, the bound index points if `None`.
    /// * `with_covariance` - Whether to compute the predictive covariances.
    ///
    /// # Returns
    /// The predictive moments or an error if the shapes don't broadcast.
    pub fn predict(
        &self,
        index_points: Option<ArrayViewD<'_, f64>>,
        with_covariance: bool,
    ) -> Result<Prediction> {
        let x = self.resolve(index_points)?;
        let event_ndims = self.kernel.feature_ndims() + 1;
        let (_, x_event) = split_batch("index_points", x.shape(), event_ndims)?;
        let n = x_event[0];
        let t = self.kernel.num_tasks();
        let nt = n * t;

        let task = from_array2(self.kernel.task_matrix().view());
        let k_tt = self.kernel.index_matrix(x.view(), x.view())?;
        let (tt_batch, _) = split_batch("kernel matrix", k_tt.shape(), 2)?;

        let mean = (self.mean_fn)(x.view());
        let mean_shape = pad_left(mean.shape(), 2);
        let (mean_batch, _) = mean_shape.split_at(mean_shape.len() - 2);

        let conditioning = self.conditioning.as_ref();
        let k_to = conditioning
            .map(|c| self.kernel.index_matrix(x.view(), c.index_points.view()))
            .transpose()?;

        let mut shapes: Vec<(&'static str, &[usize])> = vec![
            ("kernel matrix", tt_batch),
            ("mean_fn output", mean_batch),
            (
                "observation_noise_variance",
                self.observation_noise_variance.shape(),
            ),
            (
                "predictive_noise_variance",
                self.predictive_noise_variance.shape(),
            ),
        ];
        if let (Some(c), Some(k_to)) = (conditioning, &k_to) {
            let (to_batch, _) = split_batch("cross kernel matrix", k_to.shape(), 2)?;
            shapes.push(("observations", &c.factor_batch_shape[..]));
            shapes.push(("cross kernel matrix", to_batch));
        }
        let batch = broadcast_all(shapes)?;
        let nbatch: usize = batch.iter().product();

        let map_tt = index_map("kernel matrix", tt_batch, &batch)?;
        let map_noise = index_map(
            "predictive_noise_variance",
            self.predictive_noise_variance.shape(),
            &batch,
        )?;
        let map_mean = index_map(
            "mean_fn output",
            &mean_shape,
            &concat(&[&batch[..], &[n, t][..]]),
        )?;

        let tt_values = flat(&k_tt);
        let noise = flat(&self.predictive_noise_variance);
        let mean_values = flat(&mean);
        let mean_full: Vec<f64> = map_mean.iter().map(|&i| mean_values[i]).collect();

        let cross = match (conditioning, &k_to) {
            (Some(c), Some(k_to)) => {
                let (to_batch, _) = split_batch("cross kernel matrix", k_to.shape(), 2)?;
                Some((
                    c,
                    flat(k_to),
                    index_map("cross kernel matrix", to_batch, &batch)?,
                    index_map("observations", &c.factor_batch_shape, &batch)?,
                ))
            }
            _ => None,
        };

        debug!("predicting at {n} index point(s): batch_shape={batch:?}");

        let members: Vec<(DVector<f64>, Option<DMatrix<f64>>)> = (0..nbatch)
            .into_par_iter()
            .map(|b| {
                let prior_mean = DVector::from_column_slice(&mean_full[b * nt..(b + 1) * nt]);
                let mut cov = with_covariance.then(|| {
                    let mut cov = matrix_block(&tt_values, map_tt[b], n, n).kronecker(&task);
                    add_diagonal(&mut cov, noise[map_noise[b]]);
                    cov
                });

                let loc = match &cross {
                    Some((c, to_values, map_to, map_factor)) => {
                        let factor = &c.factors[map_factor[b]];
                        let mut k_to = matrix_block(to_values, map_to[b], n, c.num_points)
                            .kronecker(&task);
                        for (j, _) in factor.missing.iter().enumerate().filter(|(_, x)| **x) {
                            k_to.column_mut(j).fill(0.);
                        }

                        if let Some(cov) = cov.as_mut() {
                            let v = solve_lower(&factor.scale, &k_to.transpose());
                            *cov -= v.transpose() * &v;
                        }

                        prior_mean + &k_to * &factor.alpha
                    }
                    None => prior_mean,
                };

                let cov = cov.map(|cov| (&cov + cov.transpose()) * 0.5);
                (loc, cov)
            })
            .collect();

        let (loc, covariance): (Vec<_>, Vec<_>) = members.into_iter().unzip();
        let covariance = with_covariance
            .then(|| covariance.into_iter().collect::<Option<Vec<_>>>())
            .flatten();

        Ok(Prediction {
            batch_shape: batch,
            num_points: n,
            loc,
            covariance,
        })
    }

    /// The predictive distribution at `index_points` (or the bound ones).
    pub fn distribution(
        &self,
        index_points: Option<ArrayViewD<'_, f64>>,
    ) -> Result<MultivariateNormal> {
        let prediction = self.predict(index_points, true)?;
        let event_shape = self.event_shape_for(prediction.num_points);
        let covariance = prediction.covariance.unwrap_or_default();

        MultivariateNormal::from_covariance(
            prediction.batch_shape,
            event_shape,
            prediction.loc,
            covariance,
            self.jitter,
        )
    }

    /// The predictive mean, of shape `batch ++ event`.
    pub fn mean(&self, index_points: Option<ArrayViewD<'_, f64>>) -> Result<ArrayD<f64>> {
        let prediction = self.predict(index_points, false)?;
        let shape = concat(&[
            &prediction.batch_shape[..],
            &self.event_shape_for(prediction.num_points)[..],
        ]);
        let values: Vec<f64> = prediction
            .loc
            .iter()
            .flat_map(|v| v.iter().copied())
            .collect();

        Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
    }

    pub fn variance(&self, index_points: Option<ArrayViewD<'_, f64>>) -> Result<ArrayD<f64>> {
        self.distribution(index_points)?.variance()
    }

    pub fn log_prob(
        &self,
        x: ArrayViewD<'_, f64>,
        index_points: Option<ArrayViewD<'_, f64>>,
    ) -> Result<ArrayD<f64>> {
        self.distribution(index_points)?.log_prob(&x)
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        sample_shape: &[usize],
        rng: &mut R,
        index_points: Option<ArrayViewD<'_, f64>>,
    ) -> Result<ArrayD<f64>> {
        self.distribution(index_points)?.sample(sample_shape, rng)
    }
}

impl Conditioning {
    #[allow(clippy::too_many_arguments)]
    fn new<K: MultiTaskKernel>(
        kernel: &K,
        index_points: ArrayD<f64>,
        observations: ArrayD<f64>,
        observations_is_missing: Option<ArrayD<bool>>,
        noise_variance: &ArrayD<f64>,
        mean_fn: &MeanFn,
        jitter: f64,
        validate_args: bool,
    ) -> Result<Self> {
        let t = kernel.num_tasks();
        let event_ndims = kernel.feature_ndims() + 1;

        check_index_points(
            "observation_index_points",
            &index_points,
            kernel.feature_ndims(),
            validate_args,
        )?;
        let (_, x_event) = split_batch(
            "observation_index_points",
            index_points.shape(),
            event_ndims,
        )?;
        let m = x_event[0];
        let mt = m * t;

        let (_, y_event) = split_batch("observations", observations.shape(), 2)?;
        if y_event[0] != m {
            return Err(GpErr::SizeMismatch {
                a: "observations",
                b: "observation_index_points",
                got: y_event[0],
                expected: m,
            });
        }
        if y_event[1] != t {
            return Err(GpErr::SizeMismatch {
                a: "observations",
                b: "num_tasks",
                got: y_event[1],
                expected: t,
            });
        }

        let y_shape = match &observations_is_missing {
            Some(mask) => broadcast_shapes(
                ("observations", observations.shape()),
                ("observations_is_missing", mask.shape()),
            )?,
            None => observations.shape().to_vec(),
        };
        let (y_batch, y_event) = y_shape.split_at(y_shape.len() - 2);
        if y_event != [m, t].as_slice() {
            return Err(GpErr::IncompatibleShapes {
                a: "observations",
                b: "observations_is_missing",
                a_shape: observations.shape().to_vec(),
                b_shape: y_shape.clone(),
            });
        }

        let y_all: Vec<f64> = observations
            .broadcast(IxDyn(&y_shape))
            .ok_or_else(|| GpErr::IncompatibleShapes {
                a: "observations",
                b: "observations_is_missing",
                a_shape: observations.shape().to_vec(),
                b_shape: y_shape.clone(),
            })?
            .iter()
            .copied()
            .collect();
        let missing_all: Vec<bool> = match &observations_is_missing {
            Some(mask) => mask
                .broadcast(IxDyn(&y_shape))
                .ok_or_else(|| GpErr::IncompatibleShapes {
                    a: "observations_is_missing",
                    b: "observations",
                    a_shape: mask.shape().to_vec(),
                    b_shape: y_shape.clone(),
                })?
                .iter()
                .copied()
                .collect(),
            None => vec![false; y_all.len()],
        };

        let non_finite = y_all
            .iter()
            .zip(&missing_all)
            .filter(|(y, missing)| !**missing && !y.is_finite())
            .count();
        if non_finite > 0 {
            if validate_args {
                return Err(GpErr::InvalidParameter {
                    what: "observations",
                    reason: format!("{non_finite} non finite value(s) aren't flagged as missing"),
                });
            }
            warn!("{non_finite} non finite observation(s) aren't flagged as missing");
        }

        let task = from_array2(kernel.task_matrix().view());
        let k_oo = kernel.index_matrix(index_points.view(), index_points.view())?;
        let (k_batch, _) = split_batch("observation kernel matrix", k_oo.shape(), 2)?;

        let mean = mean_fn(index_points.view());
        let mean_shape = pad_left(mean.shape(), 2);
        let (mean_batch, _) = mean_shape.split_at(mean_shape.len() - 2);

        let batch_shape = broadcast_shapes(("kernel", k_batch), ("observations", y_batch))?;
        let factor_batch_shape = broadcast_all([
            ("observations", &batch_shape[..]),
            ("observation_noise_variance", noise_variance.shape()),
            ("mean_fn output", mean_batch),
        ])?;

        let map_k = index_map("observation kernel matrix", k_batch, &factor_batch_shape)?;
        let map_y = index_map("observations", y_batch, &factor_batch_shape)?;
        let map_noise = index_map(
            "observation_noise_variance",
            noise_variance.shape(),
            &factor_batch_shape,
        )?;
        let map_mean = index_map(
            "mean_fn output",
            &mean_shape,
            &concat(&[&factor_batch_shape[..], &[m, t][..]]),
        )?;

        let k_values = flat(&k_oo);
        let noise = flat(noise_variance);
        let mean_values = flat(&mean);

        let factors = (0..map_k.len())
            .into_par_iter()
            .map(|b| {
                let mut cov = matrix_block(&k_values, map_k[b], m, m).kronecker(&task);
                add_diagonal(&mut cov, noise[map_noise[b]]);

                let yb = map_y[b];
                let missing = missing_all[yb * mt..(yb + 1) * mt].to_vec();
                let centered = DVector::from_fn(mt, |r, _| {
                    if missing[r] {
                        0.
                    } else {
                        y_all[yb * mt + r] - mean_values[map_mean[b * mt + r]]
                    }
                });

                isolate(&mut cov, &missing);
                let chol = cholesky("observation covariance", &cov, jitter)?;
                let alpha = chol.solve(&centered);

                Ok(Factor {
                    scale: chol.unpack(),
                    alpha,
                    missing,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "factored {} observation covariance(s) of size {mt}: batch_shape={:?}",
            factors.len(),
            factor_batch_shape
        );

        Ok(Self {
            index_points,
            num_points: m,
            batch_shape,
            factor_batch_shape,
            factors,
        })
    }
}

fn check_variance(what: &'static str, variance: &ArrayD<f64>) -> Result<()> {
    match variance.iter().find(|v| !(**v >= 0. && v.is_finite())) {
        Some(v) => Err(GpErr::InvalidParameter {
            what,
            reason: format!("must be non negative and finite, got {v}"),
        }),
        None => Ok(()),
    }
}

fn check_index_points(
    what: &'static str,
    x: &ArrayD<f64>,
    feature_ndims: usize,
    validate_args: bool,
) -> Result<()> {
    split_batch(what, x.shape(), feature_ndims + 1)?;

    if validate_args && x.iter().any(|v| !v.is_finite()) {
        return Err(GpErr::InvalidParameter {
            what,
            reason: "must be finite".into(),
        });
    }

    Ok(())
}

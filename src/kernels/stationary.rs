use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use rayon::prelude::*;

use crate::{
    GpErr, Result,
    array::{IntoArray, flat},
    shape::{broadcast_shapes, concat, index_map, split_batch},
};

/// The parameters shared by every stationary kernel: `amplitude * profile(|x - y| / length_scale)`.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Stationary {
    amplitude: ArrayD<f64>,
    length_scale: ArrayD<f64>,
    feature_ndims: usize,
    batch_shape: Vec<usize>,
}

impl Stationary {
    pub fn new(
        amplitude: impl IntoArray,
        length_scale: impl IntoArray,
        feature_ndims: usize,
    ) -> Result<Self> {
        let amplitude = amplitude.into_array();
        let length_scale = length_scale.into_array();

        check_positive("amplitude", &amplitude)?;
        check_positive("length_scale", &length_scale)?;
        if feature_ndims == 0 {
            return Err(GpErr::InvalidParameter {
                what: "feature_ndims",
                reason: "must be at least 1".into(),
            });
        }

        let batch_shape = broadcast_shapes(
            ("amplitude", amplitude.shape()),
            ("length_scale", length_scale.shape()),
        )?;

        Ok(Self {
            amplitude,
            length_scale,
            feature_ndims,
            batch_shape,
        })
    }

    /// Unit amplitude and length scale.
    pub fn unit(feature_ndims: usize) -> Self {
        Self {
            amplitude: 1.0.into_array(),
            length_scale: 1.0.into_array(),
            feature_ndims: feature_ndims.max(1),
            batch_shape: Vec::new(),
        }
    }

    pub fn amplitude(&self) -> &ArrayD<f64> {
        &self.amplitude
    }

    pub fn length_scale(&self) -> &ArrayD<f64> {
        &self.length_scale
    }

    pub fn feature_ndims(&self) -> usize {
        self.feature_ndims
    }

    pub fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    /// Returns a copy whose batch shape has a new unit axis at `axis`.
    pub fn insert_batch_axis(&self, axis: usize) -> Result<Self> {
        if axis > self.batch_shape.len() {
            return Err(GpErr::InvalidParameter {
                what: "batch axis",
                reason: format!(
                    "axis {axis} is out of bounds for batch shape {:?}",
                    self.batch_shape
                ),
            });
        }

        let expand = |what: &'static str, param: &ArrayD<f64>| -> Result<ArrayD<f64>> {
            let full = param
                .broadcast(IxDyn(&self.batch_shape))
                .ok_or_else(|| GpErr::IncompatibleShapes {
                    a: what,
                    b: "batch shape",
                    a_shape: param.shape().to_vec(),
                    b_shape: self.batch_shape.clone(),
                })?;
            Ok(full.to_owned().insert_axis(Axis(axis)))
        };

        Self::new(
            expand("amplitude", &self.amplitude)?,
            expand("length_scale", &self.length_scale)?,
            self.feature_ndims,
        )
    }

    /// Evaluates `amplitude² * profile(|x1 - x2|² / length_scale²)` for every pair of points.
    pub fn matrix<F>(
        &self,
        x1: ArrayViewD<'_, f64>,
        x2: ArrayViewD<'_, f64>,
        profile: F,
    ) -> Result<ArrayD<f64>>
    where
        F: Fn(f64) -> f64 + Sync,
    {
        let event_ndims = self.feature_ndims + 1;
        let (b1, e1) = split_batch("x1", x1.shape(), event_ndims)?;
        let (b2, e2) = split_batch("x2", x2.shape(), event_ndims)?;

        let dim: usize = e1[1..].iter().product();
        if e1[1..] != e2[1..] {
            return Err(GpErr::SizeMismatch {
                a: "x1 features",
                b: "x2 features",
                got: dim,
                expected: e2[1..].iter().product(),
            });
        }

        let (n1, n2) = (e1[0], e2[0]);
        let batch = broadcast_shapes(("kernel", &self.batch_shape), ("x1", b1))
            .and_then(|b| broadcast_shapes(("x1 and kernel", &b), ("x2", b2)))?;

        let map1 = index_map("x1", b1, &batch)?;
        let map2 = index_map("x2", b2, &batch)?;
        let map_amp = index_map("amplitude", self.amplitude.shape(), &batch)?;
        let map_ls = index_map("length_scale", self.length_scale.shape(), &batch)?;

        let x1: Vec<f64> = x1.iter().copied().collect();
        let x2: Vec<f64> = x2.iter().copied().collect();
        let amplitude = flat(&self.amplitude);
        let length_scale = flat(&self.length_scale);

        let block = n1 * n2;
        let mut out = vec![0.; map1.len() * block];

        out.par_chunks_mut(block.max(1))
            .enumerate()
            .for_each(|(b, chunk)| {
                let amp2 = amplitude[map_amp[b]].powi(2);
                let ls2 = length_scale[map_ls[b]].powi(2);
                let p1 = &x1[map1[b] * n1 * dim..(map1[b] + 1) * n1 * dim];
                let p2 = &x2[map2[b] * n2 * dim..(map2[b] + 1) * n2 * dim];

                for i in 0..n1 {
                    let a = &p1[i * dim..(i + 1) * dim];
                    for j in 0..n2 {
                        let c = &p2[j * dim..(j + 1) * dim];
                        let d2: f64 = a.iter().zip(c).map(|(u, v)| (u - v).powi(2)).sum();
                        chunk[i * n2 + j] = amp2 * profile(d2 / ls2);
                    }
                }
            });

        Ok(ArrayD::from_shape_vec(
            IxDyn(&concat(&[&batch[..], &[n1, n2][..]])),
            out,
        )?)
    }
}

fn check_positive(what: &'static str, param: &ArrayD<f64>) -> Result<()> {
    match param.iter().find(|v| !(**v > 0. && v.is_finite())) {
        Some(v) => Err(GpErr::InvalidParameter {
            what,
            reason: format!("must be positive and finite, got {v}"),
        }),
        None => Ok(()),
    }
}

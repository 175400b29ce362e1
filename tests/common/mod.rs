#![allow(dead_code)]

use ndarray::{Array, Array1, Array2, ArrayD, Axis, IxDyn, stack};
use rand::Rng;

/// A 3x3 grid over `[-4, 4]²`, flattened to shape `[9, 2]`.
pub fn grid() -> Array2<f64> {
    let axis = Array1::linspace(-4., 4., 3);
    let points: Vec<[f64; 2]> = axis
        .iter()
        .flat_map(|&y| axis.iter().map(move |&x| [x, y]))
        .collect();
    Array2::from(points)
}

/// `linspace(-20, 20, 9 * num_tasks)` reshaped to `[9, num_tasks]`.
pub fn grid_observations(num_tasks: usize) -> Array2<f64> {
    Array1::linspace(-20., 20., 9 * num_tasks)
        .into_shape_with_order((9, num_tasks))
        .unwrap()
}

/// Repeats `a` along a new leading axis.
pub fn repeat(a: &Array2<f64>, times: usize) -> ArrayD<f64> {
    let views = vec![a.view(); times];
    stack(Axis(0), &views).unwrap().into_dyn()
}

pub fn uniform<R: Rng>(shape: &[usize], low: f64, high: f64, rng: &mut R) -> ArrayD<f64> {
    Array::from_shape_simple_fn(IxDyn(shape), || rng.random_range(low..high))
}

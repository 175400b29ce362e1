//! Prior mean functions.
//!
//! A mean function maps index points of shape `[b..., n, f...]` to the prior mean at those
//! points. For a multi-task model the output must broadcast to `[b..., n, T]`, for a single-task
//! model to `[b..., n]`.

use ndarray::{Array1, ArrayD, ArrayViewD, arr0};

/// A boxed mean function.
pub type MeanFn = Box<dyn Fn(ArrayViewD<'_, f64>) -> ArrayD<f64> + Send + Sync>;

/// The zero mean function.
pub fn zero() -> MeanFn {
    Box::new(|_: ArrayViewD<'_, f64>| arr0(0.).into_dyn())
}

/// A mean function returning the same per-task value at every index point.
///
/// # Arguments
/// * `values` - The mean of every task, its output broadcasts to `[..., n, T]`.
pub fn constant(values: Array1<f64>) -> MeanFn {
    let values = values.into_dyn();
    Box::new(move |_: ArrayViewD<'_, f64>| values.clone())
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, array};

    use super::*;

    #[test]
    fn zero_is_scalar() {
        let x = Array::<f64, _>::zeros((3, 2)).into_dyn();
        let m = zero()(x.view());
        assert_eq!(m.ndim(), 0);
        assert_eq!(m.first(), Some(&0.));
    }

    #[test]
    fn constant_ignores_index_points() {
        let f = constant(array![1., 2., 3.]);
        let x = Array::<f64, _>::zeros((4, 2)).into_dyn();
        assert_eq!(f(x.view()), array![1., 2., 3.].into_dyn());
    }
}

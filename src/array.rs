use ndarray::{ArrayBase, ArrayD, Data, Dimension, arr0};

/// Conversion into the dynamic-rank `f64` arrays every model parameter is stored as.
pub trait IntoArray {
    fn into_array(self) -> ArrayD<f64>;
}

impl IntoArray for f64 {
    fn into_array(self) -> ArrayD<f64> {
        arr0(self).into_dyn()
    }
}

impl<S, D> IntoArray for ArrayBase<S, D>
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    fn into_array(self) -> ArrayD<f64> {
        self.into_owned().into_dyn()
    }
}

/// Returns the array's elements in logical (C) order.
pub(crate) fn flat(a: &ArrayD<f64>) -> Vec<f64> {
    a.iter().copied().collect()
}

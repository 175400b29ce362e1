//! Dense linear algebra helpers, a thin layer over `nalgebra`.

use log::warn;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use ndarray::ArrayView2;

use crate::{GpErr, Result};

/// How many times the jitter is multiplied by ten before giving up on a factorization.
const MAX_JITTER_ESCALATIONS: usize = 4;

/// Reads the `idx`-th `rows x cols` row-major block of `data`.
pub fn matrix_block(data: &[f64], idx: usize, rows: usize, cols: usize) -> DMatrix<f64> {
    let size = rows * cols;
    DMatrix::from_row_slice(rows, cols, &data[idx * size..(idx + 1) * size])
}

/// Reads the `idx`-th `len`-long block of `data`.
pub fn vector_block(data: &[f64], idx: usize, len: usize) -> DVector<f64> {
    DVector::from_column_slice(&data[idx * len..(idx + 1) * len])
}

/// Copies a 2-D array into a matrix.
pub fn from_array2(a: ArrayView2<'_, f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

/// Returns the entries of `m` in row-major order.
pub fn to_row_major(m: &DMatrix<f64>) -> Vec<f64> {
    m.transpose().as_slice().to_vec()
}

/// Adds `value` to every diagonal entry of `m`.
pub fn add_diagonal(m: &mut DMatrix<f64>, value: f64) {
    for i in 0..m.nrows().min(m.ncols()) {
        m[(i, i)] += value;
    }
}

/// Factors `m + jitter * I`.
///
/// Whenever the factorization fails the jitter is multiplied by ten, up to
/// `MAX_JITTER_ESCALATIONS` times.
///
/// # Arguments
/// * `what` - A name for the matrix, used in logs and errors.
/// * `m` - A symmetric matrix.
/// * `jitter` - The initial diagonal shift.
///
/// # Returns
/// The Cholesky factorization or an error if the matrix is not positive definite.
pub fn cholesky(what: &'static str, m: &DMatrix<f64>, jitter: f64) -> Result<Cholesky<f64, Dyn>> {
    let mut shift = jitter;

    for attempt in 0..=MAX_JITTER_ESCALATIONS {
        let mut shifted = m.clone();
        add_diagonal(&mut shifted, shift);

        let factored = shifted.cholesky().filter(|chol| {
            chol.l_dirty()
                .diagonal()
                .iter()
                .all(|d| *d > 0. && d.is_finite())
        });
        if let Some(chol) = factored {
            return Ok(chol);
        }

        if attempt < MAX_JITTER_ESCALATIONS {
            let next = if shift > 0. { shift * 10. } else { 1e-10 };
            warn!("{what} is not positive definite with jitter {shift:e}, retrying with {next:e}");
            shift = next;
        }
    }

    Err(GpErr::NotPositiveDefinite { what, jitter: shift })
}

/// Solves `L x = b` for a lower triangular `L`, column by column.
pub fn solve_lower(l: &DMatrix<f64>, b: &DMatrix<f64>) -> DMatrix<f64> {
    // Cholesky factors have strictly positive diagonals, so the solve can't fail.
    l.solve_lower_triangular(b)
        .unwrap_or_else(|| DMatrix::from_element(b.nrows(), b.ncols(), f64::NAN))
}

/// Zeroes the given rows and columns of a square matrix and puts ones on their diagonal.
pub fn isolate(m: &mut DMatrix<f64>, masked: &[bool]) {
    for (i, _) in masked.iter().enumerate().filter(|(_, x)| **x) {
        m.row_mut(i).fill(0.);
        m.column_mut(i).fill(0.);
        m[(i, i)] = 1.;
    }
}

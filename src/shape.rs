//! Batch shape bookkeeping.
//!
//! Shapes follow right-aligned broadcasting: two dimensions are compatible when they're equal
//! or one of them is 1, and missing leading dimensions count as 1. Arrays are never expanded in
//! memory; instead [`index_map`] tells, for every flat position of the broadcast shape, which
//! flat position of the smaller shape it reads from.

use crate::{GpErr, Result};

/// Broadcasts two shapes together.
///
/// # Arguments
/// * `a` - A named shape.
/// * `b` - Another named shape.
///
/// # Returns
/// The broadcast shape or an error if some dimension is incompatible.
pub fn broadcast_shapes(
    (a_name, a): (&'static str, &[usize]),
    (b_name, b): (&'static str, &[usize]),
) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    let mut out = vec![1; rank];

    for i in 0..rank {
        let da = if i < rank - a.len() { 1 } else { a[i - (rank - a.len())] };
        let db = if i < rank - b.len() { 1 } else { b[i - (rank - b.len())] };

        out[i] = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            _ => {
                return Err(GpErr::IncompatibleShapes {
                    a: a_name,
                    b: b_name,
                    a_shape: a.to_vec(),
                    b_shape: b.to_vec(),
                });
            }
        };
    }

    Ok(out)
}

/// Broadcasts every named shape in `shapes` into a single one.
pub fn broadcast_all<'a, I>(shapes: I) -> Result<Vec<usize>>
where
    I: IntoIterator<Item = (&'static str, &'a [usize])>,
{
    let mut acc: (&'static str, Vec<usize>) = ("batch", Vec::new());

    for (name, shape) in shapes {
        let merged = broadcast_shapes((acc.0, &acc.1), (name, shape))?;
        acc = ("batch", merged);
    }

    Ok(acc.1)
}

/// Builds the flat index map from `from` into the broadcast shape `to`.
///
/// # Arguments
/// * `what` - The name of the array being broadcast, used in errors.
/// * `from` - The shape of the array being read.
/// * `to` - The target shape, `from` must broadcast to it.
///
/// # Returns
/// A vector of length `to.iter().product()` whose i-th entry is the C-order flat index in
/// `from` that the i-th C-order flat position of `to` reads.
pub fn index_map(what: &'static str, from: &[usize], to: &[usize]) -> Result<Vec<usize>> {
    let mismatch = || GpErr::IncompatibleShapes {
        a: what,
        b: "target",
        a_shape: from.to_vec(),
        b_shape: to.to_vec(),
    };

    if from.len() > to.len() {
        return Err(mismatch());
    }

    let offset = to.len() - from.len();
    let mut strides = vec![0; from.len()];
    let mut acc = 1;
    for i in (0..from.len()).rev() {
        if from[i] != 1 && from[i] != to[offset + i] {
            return Err(mismatch());
        }

        strides[i] = if from[i] == 1 { 0 } else { acc };
        acc *= from[i];
    }

    let total: usize = to.iter().product();
    let mut out = Vec::with_capacity(total);
    for flat in 0..total {
        let mut rem = flat;
        let mut idx = 0;
        for axis in (offset..to.len()).rev() {
            idx += (rem % to[axis]) * strides[axis - offset];
            rem /= to[axis];
        }
        out.push(idx);
    }

    Ok(out)
}

/// Splits `shape` into its leading batch dimensions and its trailing `event_ndims` dimensions.
pub fn split_batch<'a>(
    what: &'static str,
    shape: &'a [usize],
    event_ndims: usize,
) -> Result<(&'a [usize], &'a [usize])> {
    if shape.len() < event_ndims {
        return Err(GpErr::RankTooSmall {
            what,
            got: shape.len(),
            expected: event_ndims,
        });
    }

    Ok(shape.split_at(shape.len() - event_ndims))
}

/// Left pads `shape` with ones until it has at least `rank` dimensions.
pub fn pad_left(shape: &[usize], rank: usize) -> Vec<usize> {
    let missing = rank.saturating_sub(shape.len());
    std::iter::repeat_n(1, missing)
        .chain(shape.iter().copied())
        .collect()
}

/// Concatenates shapes.
pub fn concat(parts: &[&[usize]]) -> Vec<usize> {
    parts.iter().flat_map(|p| p.iter().copied()).collect()
}

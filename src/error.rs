use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, GpErr>;

/// The crate's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum GpErr {
    /// Two shapes could not be broadcast against each other.
    IncompatibleShapes {
        a: &'static str,
        b: &'static str,
        a_shape: Vec<usize>,
        b_shape: Vec<usize>,
    },
    /// An array has fewer dimensions than its role requires.
    RankTooSmall {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A dimension that must match exactly doesn't.
    SizeMismatch {
        a: &'static str,
        b: &'static str,
        got: usize,
        expected: usize,
    },
    /// Only one of observation index points and observations was given.
    IncompleteObservations,
    /// No index points were bound at construction nor passed to the call.
    MissingIndexPoints,
    /// A parameter holds an invalid value.
    InvalidParameter {
        what: &'static str,
        reason: String,
    },
    /// A covariance matrix could not be factored even after adding jitter.
    NotPositiveDefinite {
        what: &'static str,
        jitter: f64,
    },
    /// A configuration is malformed.
    InvalidConfig(String),
}

impl Display for GpErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpErr::IncompatibleShapes {
                a,
                b,
                a_shape,
                b_shape,
            } => write!(
                f,
                "The shapes of {a} ({a_shape:?}) and {b} ({b_shape:?}) can't be broadcast together"
            ),
            GpErr::RankTooSmall {
                what,
                got,
                expected,
            } => write!(
                f,
                "{what} must have at least {expected} dimensions, got {got}"
            ),
            GpErr::SizeMismatch {
                a,
                b,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch between {a} and {b}, got {got} and expected {expected}"
            ),
            GpErr::IncompleteObservations => write!(
                f,
                "observation_index_points and observations must be given together"
            ),
            GpErr::MissingIndexPoints => write!(
                f,
                "no index points were bound at construction nor given to the call"
            ),
            GpErr::InvalidParameter { what, reason } => write!(f, "invalid {what}: {reason}"),
            GpErr::NotPositiveDefinite { what, jitter } => write!(
                f,
                "the {what} is not positive definite (last jitter tried: {jitter:e})"
            ),
            GpErr::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl Error for GpErr {}

impl From<ndarray::ShapeError> for GpErr {
    fn from(e: ndarray::ShapeError) -> Self {
        Self::InvalidParameter {
            what: "array shape",
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for GpErr {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}

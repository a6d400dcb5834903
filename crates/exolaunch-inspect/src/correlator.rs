//! Array operations on correlator data.

use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InspectError {
    #[error("no correlator data")]
    Empty,

    #[error("configuration {index} has {found} time slices, expected {expected}")]
    Ragged {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("source group tsrc_{index} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        index: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("temporal extent should be even, got {0}")]
    OddTimeExtent(usize),

    #[error("operator {0} not found")]
    UnknownOperator(String),

    #[error("no positive values to plot on a log axis")]
    NoPositiveValues,

    #[error("plot error: {0}")]
    Plot(String),

    #[error("built without HDF5 support; rebuild with the `hdf5` feature")]
    Unsupported,

    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),
}

/// Correlators of one source position, shape `(ncfg, Lt)`.
#[derive(Debug, Clone)]
pub struct SourceSet {
    /// Numeric suffix of the `tsrc_<k>` group
    pub index: usize,
    pub data: Array2<f64>,
}

/// Numeric suffix of a `tsrc_<k>` group name.
pub fn tsrc_index(name: &str) -> Option<usize> {
    name.strip_prefix("tsrc_")?.parse().ok()
}

/// Stack per-configuration correlators into a `(ncfg, Lt)` array.
pub fn stack_configs(rows: &[Vec<f64>]) -> Result<Array2<f64>, InspectError> {
    let lt = rows.first().ok_or(InspectError::Empty)?.len();
    let mut flat = Vec::with_capacity(rows.len() * lt);
    for (index, row) in rows.iter().enumerate() {
        if row.len() != lt {
            return Err(InspectError::Ragged {
                index,
                expected: lt,
                found: row.len(),
            });
        }
        flat.extend_from_slice(row);
    }
    Array2::from_shape_vec((rows.len(), lt), flat).map_err(|_| InspectError::Empty)
}

/// Rotate the time axis left by `shift`, so `out[t] = data[(t + shift) % Lt]`.
pub fn roll_left(data: &Array2<f64>, shift: usize) -> Array2<f64> {
    let lt = data.ncols();
    if lt == 0 {
        return data.clone();
    }
    Array2::from_shape_fn(data.dim(), |(cfg, t)| data[[cfg, (t + shift) % lt]])
}

/// Shift each source set to `t = 0` and average over sources.
///
/// Set `k` is rolled by `k * tsrc_spacing`.
pub fn average_sources(
    sets: &[SourceSet],
    tsrc_spacing: usize,
) -> Result<Array2<f64>, InspectError> {
    let first = sets.first().ok_or(InspectError::Empty)?;
    let shape = first.data.dim();
    let mut sum = Array2::<f64>::zeros(shape);

    for set in sets {
        if set.data.dim() != shape {
            return Err(InspectError::ShapeMismatch {
                index: set.index,
                expected: shape,
                found: set.data.dim(),
            });
        }
        sum += &roll_left(&set.data, set.index * tsrc_spacing);
    }
    Ok(sum / sets.len() as f64)
}

/// Fold a correlator about the midpoint: `(C + flip(C)) / 2` on the first `Lt / 2` slices.
pub fn fold(data: &Array2<f64>) -> Result<Array2<f64>, InspectError> {
    let lt = data.ncols();
    if lt % 2 == 1 {
        return Err(InspectError::OddTimeExtent(lt));
    }
    Ok(Array2::from_shape_fn((data.nrows(), lt / 2), |(cfg, t)| {
        (data[[cfg, t]] + data[[cfg, lt - 1 - t]]) / 2.0
    }))
}

/// Mean over configurations.
pub fn config_average(data: &Array2<f64>) -> Result<Array1<f64>, InspectError> {
    data.mean_axis(Axis(0)).ok_or(InspectError::Empty)
}

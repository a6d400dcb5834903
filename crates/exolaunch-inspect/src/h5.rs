//! Reading correlator files laid out as `/<operator>/<channel>/tsrc_<k>/<dataset>`.

use crate::correlator::InspectError;
use camino::Utf8Path;
use ndarray::Array2;
use std::collections::BTreeMap;

/// Channel group read under each operator.
pub const DEFAULT_CHANNEL: &str = "meson1_light_light";

/// Time slices between consecutive source positions.
pub const DEFAULT_TSRC_SPACING: usize = 4;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub channel: String,
    pub tsrc_spacing: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            tsrc_spacing: DEFAULT_TSRC_SPACING,
        }
    }
}

/// Load every operator of a file, source-averaged, as `(ncfg, Lt)` arrays.
#[cfg(feature = "hdf5")]
pub fn load_operators(
    path: &Utf8Path,
    options: &LoadOptions,
) -> Result<BTreeMap<String, Array2<f64>>, InspectError> {
    use crate::correlator::{SourceSet, average_sources, stack_configs, tsrc_index};

    let file = hdf5::File::open(path)?;
    let mut operators = BTreeMap::new();

    for op in file.member_names()? {
        let channel_path = format!("{}/{}", op, options.channel);
        if !file.link_exists(&channel_path) {
            tracing::warn!("{} has no {} group", op, options.channel);
            continue;
        }
        let channel = file.group(&channel_path)?;

        let mut sources: Vec<(usize, String)> = channel
            .member_names()?
            .into_iter()
            .filter_map(|name| tsrc_index(&name).map(|k| (k, name)))
            .collect();
        sources.sort();

        let mut sets = Vec::with_capacity(sources.len());
        for (index, name) in sources {
            let group = channel.group(&name)?;
            let mut datasets = group.member_names()?;
            datasets.sort();

            let mut rows = Vec::with_capacity(datasets.len());
            for dataset in datasets {
                match group.dataset(&dataset).and_then(|ds| ds.read_raw::<f64>()) {
                    Ok(row) => rows.push(row),
                    Err(e) => {
                        tracing::warn!("Skipping {}/{}/{}: {}", channel_path, name, dataset, e)
                    }
                }
            }
            if rows.is_empty() {
                continue;
            }
            sets.push(SourceSet {
                index,
                data: stack_configs(&rows)?,
            });
        }

        if sets.is_empty() {
            tracing::warn!("{} has no readable source groups", channel_path);
            continue;
        }
        tracing::debug!("{}: {} source groups", op, sets.len());
        operators.insert(op, average_sources(&sets, options.tsrc_spacing)?);
    }

    Ok(operators)
}

#[cfg(not(feature = "hdf5"))]
pub fn load_operators(
    _path: &Utf8Path,
    _options: &LoadOptions,
) -> Result<BTreeMap<String, Array2<f64>>, InspectError> {
    Err(InspectError::Unsupported)
}

//! Merged template parameters for one ensemble.

use crate::config::{ConfigError, EnsembleConfig};
use crate::lists;
use exolaunch_parsers::EnsembleParams;
use exolaunch_render::Params;
use serde_yaml::Value;

/// Ensemble parameters under their template names: `beta`, `mud`, `ms`,
/// `mc`, `NL`, `NT`, `P`. Absent masses and indices are left out.
pub fn ensemble_params(ensemble: &EnsembleParams) -> Params {
    let mut params = Params::new();
    params.insert("beta".into(), Value::from(ensemble.beta.as_str()));
    params.insert("mud".into(), Value::from(ensemble.light_mass.as_str()));
    if let Some(ms) = &ensemble.strange_mass {
        params.insert("ms".into(), Value::from(ms.as_str()));
    }
    if let Some(mc) = &ensemble.charm_mass {
        params.insert("mc".into(), Value::from(mc.as_str()));
    }
    params.insert("NL".into(), Value::from(ensemble.lattice_length));
    params.insert("NT".into(), Value::from(ensemble.lattice_time));
    if let Some(p) = &ensemble.momentum_index {
        params.insert("P".into(), Value::from(p.as_str()));
    }
    params
}

/// Build the parameter set every template of an ensemble is rendered with.
///
/// Order of precedence, lowest first: the YAML keys, the decoded ensemble
/// parameters, then the derived keys. `num_vecs_perams`, `meson_nvec`,
/// `cfg_path` and `cfg_name` are derived only when the YAML leaves them out.
pub fn merge_params(
    config: &EnsembleConfig,
    ensemble: &EnsembleParams,
) -> Result<Params, ConfigError> {
    let mut params: Params = config.extra.clone();

    params.insert("cfg_i".into(), Value::from(config.cfg_i));
    params.insert("cfg_f".into(), Value::from(config.cfg_f));
    params.insert("cfg_d".into(), Value::from(config.cfg_d));
    params.insert("data_path".into(), Value::from(config.data_path.as_str()));
    params.insert(
        "launch_path".into(),
        Value::from(config.launch_path.as_str()),
    );
    params.insert("eigs_path".into(), Value::from(config.eigs_dir().as_str()));
    for (key, label) in [
        ("prop_mass_light_label", &config.prop_mass_light_label),
        ("prop_mass_strange_label", &config.prop_mass_strange_label),
        ("prop_mass_charm_label", &config.prop_mass_charm_label),
    ] {
        if let Some(label) = label {
            params.insert(key.into(), Value::from(label.as_str()));
        }
    }

    params.extend(ensemble_params(ensemble));

    let nt = ensemble.lattice_time;
    params.insert("ens_short".into(), Value::from(config.ens_short.as_str()));
    for key in ["Nt_forward", "prop_t_fwd", "meson_t_fwd"] {
        params.insert(key.into(), Value::from(nt));
    }
    for key in ["num_vecs_perams", "meson_nvec"] {
        params.entry(key.into()).or_insert_with(|| Value::from(nt));
    }

    let location = ensemble.gauge_location();
    let cfg_path = config.cfg_path.clone().unwrap_or(location.cfg_path);
    let cfg_name = config.cfg_name.clone().unwrap_or(location.cfg_name);
    params.insert("cfg_path".into(), Value::from(cfg_path));
    params.insert("cfg_name".into(), Value::from(cfg_name));

    if let Some(sources) = source_times(config, &params, nt)? {
        params.insert("t_sources".into(), sources);
    }

    if let (Some(colors), Some(at_once)) = (
        config.get_u64("disco_max_colors"),
        config.get_u64("disco_max_colors_at_once"),
    ) {
        if at_once == 0 {
            return Err(invalid(config, "disco_max_colors_at_once must be positive"));
        }
        params.insert(
            "num_color_parts".into(),
            Value::from(colors.div_ceil(at_once)),
        );
    }

    params.insert("momentum_list".into(), Value::from(lists::momentum_list()));
    params.insert(
        "displacement_list".into(),
        Value::from(lists::displacement_list()),
    );
    params.insert(
        "disco_displacement_list".into(),
        Value::from(lists::displacement_list()),
    );
    params.insert(
        "disco_t_sources".into(),
        Value::from((0..nt).collect::<Vec<u32>>()),
    );

    tracing::debug!(
        "Merged {} parameters for {}",
        params.len(),
        config.ens_short
    );
    Ok(params)
}

/// Perambulator source times: `prop_t_sources` verbatim, else spaced by
/// `num_tsrc` over the forward propagation window.
fn source_times(
    config: &EnsembleConfig,
    params: &Params,
    nt: u32,
) -> Result<Option<Value>, ConfigError> {
    if let Some(explicit) = params.get("prop_t_sources") {
        return Ok(Some(explicit.clone()));
    }
    let Some(num_tsrc) = config.get_u64("num_tsrc") else {
        return Ok(None);
    };
    let num_tsrc = u32::try_from(num_tsrc).unwrap_or(u32::MAX);
    lists::t_sources(nt, num_tsrc)
        .map(|times| Some(Value::from(times)))
        .ok_or_else(|| {
            invalid(
                config,
                &format!("num_tsrc {} does not fit into {} time slices", num_tsrc, nt),
            )
        })
}

fn invalid(config: &EnsembleConfig, message: &str) -> ConfigError {
    ConfigError::Invalid {
        path: config.source.clone(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;
    use exolaunch_parsers::parse_ensemble;

    fn merged(extra: &str) -> Result<Params, ConfigError> {
        let content = format!(
            "cfg_i: 11\ncfg_f: 51\ncfg_d: 10\ndata_path: /data\nlaunch_path: /launch\n{}",
            extra
        );
        let config = EnsembleConfig::parse("a085m300", Utf8Path::new("a085m300.yml"), &content)?;
        let ensemble = config.ensemble()?;
        merge_params(&config, &ensemble)
    }

    #[test]
    fn test_ensemble_params_keys() {
        let params = ensemble_params(&parse_ensemble("b3.6_s48t64").unwrap());
        assert_eq!(params["beta"], Value::from("3.6"));
        assert_eq!(params["mc"], Value::from("0.25"));
        assert_eq!(params["NL"], Value::from(48u32));
        assert!(!params.contains_key("ms"));
        assert!(!params.contains_key("P"));
    }

    #[test]
    fn test_derived_keys() {
        let params = merged("").unwrap();
        assert_eq!(params["ens_short"], Value::from("a085m300"));
        assert_eq!(params["NT"], Value::from(64u32));
        assert_eq!(params["Nt_forward"], Value::from(64u32));
        assert_eq!(params["meson_t_fwd"], Value::from(64u32));
        assert_eq!(params["num_vecs_perams"], Value::from(64u32));
        assert_eq!(
            params["cfg_name"],
            Value::from("b3.57_ms-0.007_mud-0.044_s32t64-000-n_cfg_")
        );
        let len = |key: &str| params[key].as_sequence().map(Vec::len);
        assert_eq!(len("momentum_list"), Some(19));
        assert_eq!(len("disco_t_sources"), Some(64));
        assert!(!params.contains_key("t_sources"));
        assert!(!params.contains_key("num_color_parts"));
    }

    #[test]
    fn test_ensemble_overrides_yaml_but_defaults_do_not() {
        let params = merged("NT: 8\nprop_t_fwd: 16\nmeson_nvec: 96\ncfg_name: mine_\n").unwrap();
        assert_eq!(params["NT"], Value::from(64u32));
        assert_eq!(params["prop_t_fwd"], Value::from(64u32));
        assert_eq!(params["meson_nvec"], Value::from(96u64));
        assert_eq!(params["cfg_name"], Value::from("mine_"));
    }

    #[test]
    fn test_t_sources() {
        let params = merged("num_tsrc: 4\n").unwrap();
        assert_eq!(params["t_sources"], Value::from(vec![0u32, 16, 32, 48]));

        let params = merged("num_tsrc: 4\nprop_t_sources: 0 32\n").unwrap();
        assert_eq!(params["t_sources"], Value::from("0 32"));

        assert!(matches!(merged("num_tsrc: 0\n"), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_num_color_parts() {
        let params = merged("disco_max_colors: 3325\ndisco_max_colors_at_once: 256\n").unwrap();
        assert_eq!(params["num_color_parts"], Value::from(13u64));
        assert!(matches!(
            merged("disco_max_colors: 10\ndisco_max_colors_at_once: 0\n"),
            Err(ConfigError::Invalid { .. })
        ));
    }
}

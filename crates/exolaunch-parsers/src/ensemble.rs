//! Decoding of ensemble short tags into lattice parameters.
//!
//! A short tag such as `a085m300` names a gauge ensemble. It resolves to a
//! long-form string (`b3.57_ms-0.007_mud-0.044_s32t64-000`) which encodes
//! the coupling, the bare quark masses and the lattice volume.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnsembleError {
    #[error("Unknown ensemble short tag: {0}")]
    UnknownEnsemble(String),
    #[error("Malformed ensemble tag {tag}: {long_form} matches no known naming convention")]
    MalformedTag { tag: String, long_form: String },
}

/// Short tag -> long form for every ensemble we generate jobs for.
const LONG_TAGS: &[(&str, &str)] = &[
    ("a065m420", "b3.70_ms-0.000_mud-0.020_s32t96-000"),
    ("a065m380", "b3.70_ms0.000_mud-0.0220_s32t96-000"),
    ("a065m300", "b3.70_ms-0.000_mud-0.025_s40t96-000"),
    ("a085m420", "b3.57_ms-0.007_mud-0.038_s24t64-000"),
    ("a085m300", "b3.57_ms-0.007_mud-0.044_s32t64-000"),
    ("a085m200", "b3.57_ms-0.007_mud-0.048_s48t64-000"),
    ("a125m400", "b3.30_ms-0.057_mud-0.1200_s16t64-000"),
    ("a125m330", "b3.30_ms-0.057_mud-0.1233_s24t64-000"),
    ("a125m280", "b3.30_ms-0.057_mud-0.1265_s24t64-000"),
    ("b3.6_s32t64", "b3.6_mc0.25_mud-0.013_s32t64"),
    ("b3.6_s40t64", "b3.6_mc0.25_mud-0.013_s40t64"),
    ("b3.6_s48t64", "b3.6_mc0.25_mud-0.013_s48t64"),
    ("b3.6_s64t64", "b3.6_mc0.25_mud-0.013_s64t64"),
    ("b3.4_s24t64", "b3.4_mc0.33_mud-0.040_s24t64"),
    ("b3.4_s32t64", "b3.4_mc0.33_mud-0.040_s32t64"),
    ("b3.4_s36t64", "b3.4_mc0.33_mud-0.040_s36t64"),
    ("b3.4_s48t64", "b3.4_mc0.33_mud-0.040_s48t64"),
];

/// Naming conventions, tried in order. The first match wins.
static PATTERNS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        // 2+1 flavour ensembles with a strange mass and a momentum index
        Regex::new(
            r"^b(?P<beta>[0-9]+\.[0-9]+)_ms(?P<ms>-?[0-9]+\.[0-9]+)_mud-(?P<mud>[0-9]+\.[0-9]+)_s(?P<NL>[0-9]+)t(?P<NT>[0-9]+)-(?P<P>[0-9]{3})",
        )
        .expect("valid ensemble pattern"),
        // 3+1 flavour ensembles with a charm mass
        Regex::new(
            r"^b(?P<beta>[0-9]+\.[0-9]+)_mc(?P<mc>[0-9]+\.[0-9]{2})_mud-(?P<mud>[0-9]+\.[0-9]{3})_s(?P<NL>[0-9]{2})t(?P<NT>[0-9]{2})",
        )
        .expect("valid ensemble pattern"),
        // minimal form without a momentum index
        Regex::new(
            r"^b(?P<beta>[0-9]+\.[0-9]+)_ms(?P<ms>-?[0-9]+\.[0-9]{3})_mud-(?P<mud>[0-9]+\.[0-9]{3})_s(?P<NL>[0-9]{2})t(?P<NT>[0-9]{2})",
        )
        .expect("valid ensemble pattern"),
    ]
});

/// Physical parameters of an ensemble.
///
/// Couplings and masses keep their textual form; generated input files must
/// reproduce the digits exactly as they appear in the ensemble name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleParams {
    /// Gauge coupling
    pub beta: String,
    /// Light (up/down) bare mass magnitude; the physical value is negative
    pub light_mass: String,
    /// Strange bare mass
    pub strange_mass: Option<String>,
    /// Charm bare mass
    pub charm_mass: Option<String>,
    /// Spatial extent
    pub lattice_length: u32,
    /// Temporal extent
    pub lattice_time: u32,
    /// Three-digit momentum/stream index
    pub momentum_index: Option<String>,
}

/// Where the gauge configurations of an ensemble live on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaugeLocation {
    pub cfg_path: String,
    pub cfg_name: String,
}

impl EnsembleParams {
    /// Default gauge configuration directory and file stem.
    pub fn gauge_location(&self) -> GaugeLocation {
        let (beta, mud, nl, nt) = (
            &self.beta,
            &self.light_mass,
            self.lattice_length,
            self.lattice_time,
        );
        match (&self.charm_mass, &self.strange_mass) {
            (Some(mc), _) => GaugeLocation {
                cfg_path: format!(
                    "/p/data1/slnpp/GREGORY/CONFIGS/NF3P1/B{beta}/B{beta}_M-{mud}M{mc}_L{nl}T{nt}/NS8_LS1_G2"
                ),
                cfg_name: format!("test_b{beta}_m{mud}m{mc}_l{nl}t{nt}_nf3p1_cfg_"),
            },
            (None, ms) => {
                let ms = ms.as_deref().unwrap_or("0.000");
                let p = self.momentum_index.as_deref().unwrap_or("000");
                GaugeLocation {
                    cfg_path: format!(
                        "/p/project1/exotichadrons/pederiva/6stout/beta_{beta}/ms_{ms}/mud_-{mud}/s{nl}t{nt}/cnfg/"
                    ),
                    cfg_name: format!("b{beta}_ms{ms}_mud-{mud}_s{nl}t{nt}-{p}-n_cfg_"),
                }
            }
        }
    }
}

/// Builtin ensemble table plus run-specific additions.
#[derive(Debug, Clone, Default)]
pub struct EnsembleRegistry {
    extra: BTreeMap<String, String>,
}

impl EnsembleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or shadow) a short tag.
    pub fn insert(&mut self, tag: impl Into<String>, long_form: impl Into<String>) {
        self.extra.insert(tag.into(), long_form.into());
    }

    /// Resolve a short tag to its long form.
    pub fn long_form(&self, tag: &str) -> Option<&str> {
        self.extra.get(tag).map(String::as_str).or_else(|| {
            LONG_TAGS
                .iter()
                .find(|(short, _)| *short == tag)
                .map(|(_, long)| *long)
        })
    }

    /// Decode a short tag.
    pub fn parse(&self, tag: &str) -> Result<EnsembleParams, EnsembleError> {
        let long_form = self
            .long_form(tag)
            .ok_or_else(|| EnsembleError::UnknownEnsemble(tag.to_string()))?;
        parse_long_form(long_form).ok_or_else(|| EnsembleError::MalformedTag {
            tag: tag.to_string(),
            long_form: long_form.to_string(),
        })
    }

    /// All known short tags, builtin first.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = LONG_TAGS.iter().map(|(short, _)| *short).collect();
        for tag in self.extra.keys() {
            if !tags.contains(&tag.as_str()) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// Decode a short tag using the builtin table.
pub fn parse_ensemble(tag: &str) -> Result<EnsembleParams, EnsembleError> {
    EnsembleRegistry::new().parse(tag)
}

/// Decode a long-form ensemble string, or `None` if no convention matches.
pub fn parse_long_form(long_form: &str) -> Option<EnsembleParams> {
    let caps = PATTERNS.iter().find_map(|re| re.captures(long_form))?;
    let text = |name: &str| caps.name(name).map(|m| m.as_str().to_string());

    Some(EnsembleParams {
        beta: text("beta")?,
        light_mass: text("mud")?,
        strange_mass: text("ms"),
        charm_mass: text("mc"),
        lattice_length: caps.name("NL")?.as_str().parse().ok()?,
        lattice_time: caps.name("NT")?.as_str().parse().ok()?,
        momentum_index: text("P"),
    })
}

//! Scan data directories for missing output files.

use crate::types::{AuditKind, AuditReport, KindReport};
use camino::{Utf8Path, Utf8PathBuf};
use exolaunch_parsers::{CfgRange, pad_cfg_id};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct AuditOptions {
    /// Root of the Chroma output tree
    pub data_path: Utf8PathBuf,
    /// Eigenvector counts to check
    pub num_vecs: Vec<u32>,
    /// Configuration ids to check
    pub cfgs: CfgRange,
    /// Files live in `<dir>/numvec<n>/` rather than directly in `<dir>`
    pub per_nvec_dirs: bool,
    /// Directories replacing `data_path/<kind dir>`
    pub overrides: BTreeMap<AuditKind, Utf8PathBuf>,
}

impl AuditOptions {
    pub fn new(data_path: impl Into<Utf8PathBuf>, num_vecs: Vec<u32>, cfgs: CfgRange) -> Self {
        Self {
            data_path: data_path.into(),
            num_vecs,
            cfgs,
            per_nvec_dirs: false,
            overrides: BTreeMap::new(),
        }
    }

    pub fn directory(&self, kind: AuditKind) -> Utf8PathBuf {
        self.overrides
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| self.data_path.join(kind.data_dir()))
    }
}

/// Check one kind for every eigenvector count and configuration.
pub fn audit_kind(kind: AuditKind, options: &AuditOptions) -> KindReport {
    let directory = options.directory(kind);
    let mut report = KindReport {
        kind,
        directory: directory.clone(),
        checked: 0,
        missing_sdb: Vec::new(),
        missing_h5: Vec::new(),
    };

    for &nvec in &options.num_vecs {
        let dir = if options.per_nvec_dirs {
            directory.join(format!("numvec{}", nvec))
        } else {
            directory.clone()
        };
        if !dir.is_dir() {
            tracing::warn!("{} directory {} does not exist", kind, dir);
        }

        for cfg in options.cfgs.ids() {
            let stem = kind.file_stem(nvec, &pad_cfg_id(cfg));
            report.checked += 1;
            check(&dir, &stem, "sdb", &mut report.missing_sdb);
            check(&dir, &stem, "h5", &mut report.missing_h5);
        }
    }

    tracing::debug!(
        "{}: checked {}, missing {} sdb and {} h5",
        kind,
        report.checked,
        report.missing_sdb.len(),
        report.missing_h5.len()
    );
    report
}

fn check(dir: &Utf8Path, stem: &str, extension: &str, missing: &mut Vec<Utf8PathBuf>) {
    let path = dir.join(format!("{}.{}", stem, extension));
    if !path.is_file() {
        missing.push(path);
    }
}

/// Audit several kinds.
pub fn audit(kinds: &[AuditKind], options: &AuditOptions) -> AuditReport {
    let reports = kinds.iter().map(|kind| audit_kind(*kind, options));
    AuditReport::new(reports.collect())
}

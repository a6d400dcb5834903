use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output family checked by the auditor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Meson,
    Peram,
    PeramStrange,
}

impl AuditKind {
    pub const ALL: [AuditKind; 3] = [AuditKind::Meson, AuditKind::Peram, AuditKind::PeramStrange];

    /// File stem for an eigenvector count and (padded) configuration id.
    pub fn file_stem(&self, nvec: u32, cfg_id: &str) -> String {
        match self {
            AuditKind::Meson => format!("meson-{}_cfg{}", nvec, cfg_id),
            AuditKind::Peram => format!("peram_{}_cfg{}", nvec, cfg_id),
            AuditKind::PeramStrange => format!("peram_strange_{}_cfg{}", nvec, cfg_id),
        }
    }

    /// Directory under the data path holding this family.
    pub fn data_dir(&self) -> &'static str {
        match self {
            AuditKind::Meson => "meson_sdb",
            AuditKind::Peram => "perams_sdb",
            AuditKind::PeramStrange => "perams_strange_sdb",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditKind::Meson => "meson",
            AuditKind::Peram => "peram",
            AuditKind::PeramStrange => "peram_strange",
        })
    }
}

impl FromStr for AuditKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| {
                format!(
                    "Unknown file type: {} (expected meson, peram, peram_strange or all)",
                    s
                )
            })
    }
}

/// Parse a kind name, expanding `all` to every kind.
pub fn parse_kinds(s: &str) -> Result<Vec<AuditKind>, String> {
    if s == "all" {
        Ok(AuditKind::ALL.to_vec())
    } else {
        Ok(vec![s.parse()?])
    }
}

/// Missing files of one kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindReport {
    pub kind: AuditKind,

    /// Directory that was searched (before any `numvec<n>` subdirectory).
    pub directory: Utf8PathBuf,

    /// Number of (nvec, cfg) pairs checked.
    pub checked: usize,

    pub missing_sdb: Vec<Utf8PathBuf>,

    pub missing_h5: Vec<Utf8PathBuf>,
}

impl KindReport {
    pub fn is_complete(&self) -> bool {
        self.missing_sdb.is_empty() && self.missing_h5.is_empty()
    }
}

/// Result of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// When the audit ran.
    pub generated_at: DateTime<Utc>,

    pub kinds: Vec<KindReport>,
}

impl AuditReport {
    pub fn new(kinds: Vec<KindReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            kinds,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.kinds.iter().all(KindReport::is_complete)
    }

    /// Total number of missing files.
    pub fn missing_count(&self) -> usize {
        self.kinds
            .iter()
            .map(|k| k.missing_sdb.len() + k.missing_h5.len())
            .sum()
    }

    /// Human-readable listing, one section per kind.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for report in &self.kinds {
            out.push_str(&format!("Processing type: {}\n", report.kind));
            let sections = [("SDB", &report.missing_sdb), ("HDF5", &report.missing_h5)];
            for (label, missing) in sections {
                if missing.is_empty() {
                    let line = format!("All {} files are present for {}.\n", label, report.kind);
                    out.push_str(&line);
                } else {
                    out.push_str(&format!("\nMissing {} files for {}:\n", label, report.kind));
                    for path in missing {
                        out.push_str(path.as_str());
                        out.push('\n');
                    }
                }
            }
        }
        out
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!(parse_kinds("all").unwrap().len(), 3);
        let kinds = parse_kinds("peram_strange").unwrap();
        assert_eq!(kinds, vec![AuditKind::PeramStrange]);
        assert!(parse_kinds("disco").is_err());
    }

    #[test]
    fn test_file_stems() {
        assert_eq!(AuditKind::Meson.file_stem(96, "11"), "meson-96_cfg11");
        assert_eq!(AuditKind::Peram.file_stem(64, "1991"), "peram_64_cfg1991");
        let stem = AuditKind::PeramStrange.file_stem(64, "05");
        assert_eq!(stem, "peram_strange_64_cfg05");
    }

    #[test]
    fn test_text_report() {
        let report = AuditReport::new(vec![KindReport {
            kind: AuditKind::Meson,
            directory: "/data/meson_sdb".into(),
            checked: 2,
            missing_sdb: vec![],
            missing_h5: vec!["/data/meson_sdb/meson-96_cfg21.h5".into()],
        }]);
        let text = report.to_text();
        assert!(text.contains("All SDB files are present for meson."));
        assert!(
            text.contains("Missing HDF5 files for meson:\n/data/meson_sdb/meson-96_cfg21.h5\n")
        );
        assert!(!report.is_complete());
        assert_eq!(report.missing_count(), 1);
    }

    #[test]
    fn test_json_report() {
        let report = AuditReport::new(vec![]);
        let json = report.to_json().unwrap();
        let parsed: AuditReport = serde_json::from_str(&json).unwrap();
        assert!(parsed.kinds.is_empty());
        assert!(parsed.is_complete());
    }
}

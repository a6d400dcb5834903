use crate::types::AuditReport;
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Last audit report of a data tree, kept next to the data.
pub struct ReportStore {
    path: Utf8PathBuf,
}

impl ReportStore {
    /// Create a store for the given data directory.
    ///
    /// The report is stored at `.exolaunch/audit.json` within the data directory.
    pub fn new(data_path: &Utf8Path) -> Self {
        let path = data_path.join(".exolaunch").join("audit.json");
        Self { path }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Load the previous report, if any.
    pub fn load(&self) -> Result<Option<AuditReport>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Save a report, creating parent directories if needed.
    pub fn save(&self, report: &AuditReport) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, report.to_json()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuditKind, KindReport};
    use tempfile::TempDir;

    #[test]
    fn test_store_load_nonexistent() {
        let temp = TempDir::new().unwrap();
        let store = ReportStore::new(Utf8Path::from_path(temp.path()).unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_store_save_and_load() {
        let temp = TempDir::new().unwrap();
        let data = Utf8Path::from_path(temp.path()).unwrap();
        let store = ReportStore::new(data);

        let report = AuditReport::new(vec![KindReport {
            kind: AuditKind::PeramStrange,
            directory: data.join("perams_strange_sdb"),
            checked: 1,
            missing_sdb: vec![data.join("perams_strange_sdb/peram_strange_64_cfg11.sdb")],
            missing_h5: vec![],
        }]);
        store.save(&report).unwrap();
        assert!(store.path().exists());

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.kinds, report.kinds);
        assert_eq!(loaded.generated_at, report.generated_at);
    }
}

//! Removal of generated inputs and scripts.

use crate::task::TaskError;
use camino::{Utf8Path, Utf8PathBuf};
use std::str::FromStr;

/// Families of generated files, by file name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanKind {
    Eigs,
    Peram,
    PeramClover,
    Meson,
    Meson2,
    Disco,
}

impl CleanKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            CleanKind::Eigs => "eigs",
            CleanKind::Peram => "peram",
            CleanKind::PeramClover => "peramclov",
            CleanKind::Meson => "meson",
            CleanKind::Meson2 => "meson2",
            CleanKind::Disco => "disco",
        }
    }

    fn matches(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(self.prefix())
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|_| file_name.ends_with(".ini.xml") || file_name.ends_with(".sh"))
    }
}

impl FromStr for CleanKind {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eigs" => Ok(CleanKind::Eigs),
            "peram" => Ok(CleanKind::Peram),
            "peramclov" => Ok(CleanKind::PeramClover),
            "meson" => Ok(CleanKind::Meson),
            "meson2" => Ok(CleanKind::Meson2),
            "disco" => Ok(CleanKind::Disco),
            _ => Err(TaskError::InvalidOption(format!(
                "unknown file kind '{}': expected eigs, peram, peramclov, meson, meson2 or disco",
                s
            ))),
        }
    }
}

fn subdirs(dir: &Utf8Path, prefix: &str) -> Result<Vec<Utf8PathBuf>, TaskError> {
    let mut dirs = Vec::new();
    for entry in dir.read_dir_utf8().map_err(TaskError::io(dir))? {
        let entry = entry.map_err(TaskError::io(dir))?;
        if entry.file_name().starts_with(prefix) && entry.path().is_dir() {
            dirs.push(entry.path().to_owned());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Delete `<kind>_*.ini.xml` and `<kind>_*.sh` from `base/cnfg*/` and
/// `base/cnfg*/numvec*/`. Returns the removed files.
///
/// A file that cannot be removed is logged and left in place.
pub fn clean(kind: CleanKind, base: &Utf8Path) -> Result<Vec<Utf8PathBuf>, TaskError> {
    let mut targets = Vec::new();
    for cfg_dir in subdirs(base, "cnfg")? {
        targets.extend(subdirs(&cfg_dir, "numvec")?);
        targets.push(cfg_dir);
    }

    let mut removed = Vec::new();
    for dir in targets {
        let mut files = Vec::new();
        for entry in dir.read_dir_utf8().map_err(TaskError::io(&dir))? {
            let entry = entry.map_err(TaskError::io(&dir))?;
            if entry.path().is_file() && kind.matches(entry.file_name()) {
                files.push(entry.path().to_owned());
            }
        }
        files.sort();

        for file in files {
            match std::fs::remove_file(&file) {
                Ok(()) => {
                    tracing::info!("Removed {}", file);
                    removed.push(file);
                }
                Err(e) => tracing::warn!("Failed to remove {}: {}", file, e),
            }
        }
    }
    Ok(removed)
}

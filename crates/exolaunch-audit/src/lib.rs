//! Output completeness checks for exolaunch.
//!
//! Verifies that every expected SDB/HDF5 pair exists for each eigenvector
//! count and configuration.

pub mod audit;
pub mod store;
pub mod types;

pub use audit::{AuditOptions, audit, audit_kind};
pub use store::{ReportStore, StoreError};
pub use types::{AuditKind, AuditReport, KindReport, parse_kinds};

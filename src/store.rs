use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::catalog::Catalog;
use crate::domain::BatchReport;
use crate::error::NichesError;

pub const DEFAULT_STORE_DIR: &str = ".niche-harvest";

#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotPaths {
    pub report: String,
    pub catalog: String,
}

impl Store {
    pub fn new() -> Result<Self, NichesError> {
        let cwd =
            std::env::current_dir().map_err(|err| NichesError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(cwd.join(DEFAULT_STORE_DIR))
            .map_err(|_| NichesError::Filesystem("invalid store path".to_string()))?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn ensure_root(&self) -> Result<(), NichesError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| NichesError::Filesystem(err.to_string()))
    }

    pub fn run_stem(report: &BatchReport) -> String {
        let stamp: String = report
            .started_at
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '-' })
            .collect();
        if stamp.is_empty() {
            "run".to_string()
        } else {
            format!("run-{stamp}")
        }
    }

    pub fn write_snapshot(
        &self,
        report: &BatchReport,
        catalog: &Catalog,
    ) -> Result<SnapshotPaths, NichesError> {
        self.ensure_root()?;
        let stem = Self::run_stem(report);
        let report_path = self.root.join(format!("{stem}.report.json"));
        let catalog_path = self.root.join(format!("{stem}.catalog.json"));
        write_json_atomic(&report_path, report)?;
        write_json_atomic(&catalog_path, catalog)?;
        tracing::info!(path = %report_path, "snapshot written");
        Ok(SnapshotPaths {
            report: report_path.to_string(),
            catalog: catalog_path.to_string(),
        })
    }

    pub fn read_report(path: &Utf8Path) -> Result<BatchReport, NichesError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| NichesError::Filesystem(format!("{path}: {err}")))?;
        serde_json::from_str(&content).map_err(|err| NichesError::Filesystem(err.to_string()))
    }
}

pub fn write_json_atomic<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), NichesError> {
    let parent = path
        .parent()
        .ok_or_else(|| NichesError::Filesystem("invalid destination path".to_string()))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| NichesError::Filesystem(err.to_string()))?;
    let content =
        serde_json::to_vec_pretty(value).map_err(|err| NichesError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix("niche-harvest")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| NichesError::Filesystem(err.to_string()))?;
    temp.write_all(&content)
        .map_err(|err| NichesError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| NichesError::Filesystem(err.to_string()))?;
    Ok(())
}

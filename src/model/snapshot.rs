//! Reading and writing plan snapshot files.
//!
//! Snapshots are JSON by default; `.yaml` and `.yml` files are read and
//! written as YAML.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{FitplanError, Result, SnapshotError};

use super::plan::FullPlan;

/// Serialization format of a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// JSON document.
    Json,
    /// YAML document.
    Yaml,
}

impl SnapshotFormat {
    /// Picks the format from the file extension, defaulting to JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Parses a plan snapshot from a string.
///
/// # Errors
///
/// Returns an error if the content is not a valid plan document.
pub fn parse_plan(content: &str, format: SnapshotFormat, source: &Path) -> Result<FullPlan> {
    let parsed: std::result::Result<FullPlan, String> = match format {
        SnapshotFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        SnapshotFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
    };

    parsed.map_err(|message| {
        FitplanError::Snapshot(SnapshotError::Unreadable {
            path: source.to_path_buf(),
            message,
        })
    })
}

/// Loads a plan snapshot from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_plan_file(path: impl AsRef<Path>) -> Result<FullPlan> {
    let path = path.as_ref();
    info!("Loading plan snapshot from: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| {
        FitplanError::Snapshot(SnapshotError::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    })?;

    let plan = parse_plan(&content, SnapshotFormat::from_path(path), path)?;
    debug!("Loaded plan {} with {} weeks", plan.id, plan.weeks.len());
    Ok(plan)
}

/// Writes a plan snapshot to a file.
///
/// # Errors
///
/// Returns an error if the plan cannot be serialized or the file written.
pub fn save_plan_file(path: impl AsRef<Path>, plan: &FullPlan) -> Result<()> {
    let path = path.as_ref();

    let content = match SnapshotFormat::from_path(path) {
        SnapshotFormat::Json => serde_json::to_string_pretty(plan).map_err(|e| e.to_string()),
        SnapshotFormat::Yaml => serde_yaml::to_string(plan).map_err(|e| e.to_string()),
    }
    .map_err(|message| FitplanError::Snapshot(SnapshotError::Unwritable { message }))?;

    std::fs::write(path, content)?;
    info!("Wrote plan snapshot to: {}", path.display());
    Ok(())
}

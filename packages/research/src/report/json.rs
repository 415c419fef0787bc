//! JSON export of a report.

use std::path::Path;

use crate::error::ReportError;
use crate::types::report::Report;

/// Pretty-printed JSON for a report.
pub fn to_json(report: &Report) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write the report as JSON, creating parent directories as needed.
pub async fn write_json(report: &Report, path: &Path) -> Result<(), ReportError> {
    let json = to_json(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, json).await?;
    Ok(())
}

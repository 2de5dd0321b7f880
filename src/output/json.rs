use super::write_atomic;
use crate::models::ResultSet;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub fn to_json(result: &ResultSet) -> Result<String> {
    serde_json::to_string_pretty(result).context("Failed to serialize result set")
}

/// Replace `path` with the pretty-printed result set.
pub fn write_result_set(path: &Path, result: &ResultSet) -> Result<()> {
    let body = to_json(result)?;
    write_atomic(path, &body)?;
    info!("Wrote {:?}", path);
    Ok(())
}

//! Bulk import and export of pupi as json
use anyhow::{Context, Result};
use libpupi::{
    Database,
    pupo::{PupoData, PupoInput},
};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use tokio::fs;
use tracing::info;

/// Files can hold either a bare list of pupi (as written by `export`) or the
/// `{"pupi": [...]}` document accepted by the admin seed endpoint
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportFile {
    List(Vec<Value>),
    Seed { pupi: Vec<Value> },
}

/// Validate every record in a json document. Ids in the document are ignored.
pub(crate) fn parse_records(json: &str) -> Result<Vec<PupoData>> {
    let records = match serde_json::from_str::<ImportFile>(json)
        .context("Expected a json array of pupi or an object with a 'pupi' array")?
    {
        ImportFile::List(records) => records,
        ImportFile::Seed { pupi } => pupi,
    };
    records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            serde_json::from_value::<PupoInput>(record)
                .map_err(libpupi::Error::from)
                .and_then(PupoInput::validate)
                .with_context(|| format!("Invalid pupo at position {}", i + 1))
        })
        .collect()
}

pub(crate) async fn import(db: &Database, file: &Path) -> Result<String> {
    let json = fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let pupi = parse_records(&json)?;
    let imported = db.insert_bulk(pupi).await?;
    let total = db.count_pupi().await?;
    info!(imported, total, "Imported pupi");
    Ok(format!(
        "Imported {imported} pupi from {} ({total} in database)",
        file.display()
    ))
}

pub(crate) async fn export(db: &Database, file: Option<&Path>) -> Result<String> {
    let pupi = db.list_pupi().await?;
    let json = serde_json::to_string_pretty(&pupi)?;
    match file {
        Some(path) => {
            fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(format!("Exported {} pupi to {}", pupi.len(), path.display()))
        }
        None => Ok(json),
    }
}

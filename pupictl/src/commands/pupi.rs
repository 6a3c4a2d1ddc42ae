//! Commands that manage individual pupi
use crate::output::{
    self, OutputFormat,
    rows::{PupoRow, PupoRowFull},
};
use anyhow::{Context, Result, anyhow};
use libpupi::{Database, pupo::PupoInput};
use tracing::debug;

pub(crate) async fn list(db: &Database, format: OutputFormat) -> Result<String> {
    let pupi = db.list_pupi().await?;
    output::format_seq(pupi.iter().map(PupoRow::new), format)
}

pub(crate) async fn show(db: &Database, id: i64, format: OutputFormat) -> Result<String> {
    match db.get_pupo(id).await? {
        Some(pupo) => output::format_one(PupoRowFull::new(&pupo), format),
        None => Err(anyhow!("Pupo {id} not found")),
    }
}

pub(crate) async fn add(db: &Database, input: PupoInput) -> Result<String> {
    let data = input.validate().context("Invalid pupo")?;
    let pupo = db.create_pupo(data).await?;
    debug!(id = pupo.id, name = %pupo.name, "added pupo");
    Ok(format!("Added pupo '{}' to database with id {}", pupo.name, pupo.id))
}

pub(crate) async fn modify(db: &Database, id: i64, patch: PupoInput) -> Result<String> {
    if patch.is_empty() {
        return Err(anyhow!("Nothing to modify"));
    }
    match db.update_pupo(id, patch).await.context("Failed to modify pupo")? {
        Some(pupo) => Ok(format!("Modified pupo '{}'", pupo.name)),
        None => Err(anyhow!("Pupo {id} not found")),
    }
}

pub(crate) async fn remove(db: &Database, id: i64) -> Result<String> {
    match db.delete_pupo(id).await? {
        true => Ok(format!("Removed pupo {id}")),
        false => Err(anyhow!("Pupo {id} not found")),
    }
}

use crate::output::{self, OutputFormat, rows::VoteRow};
use anyhow::Result;
use libpupi::Database;

/// Vote totals for every pupo
pub(crate) async fn list(db: &Database, format: OutputFormat) -> Result<String> {
    let pupi = db.list_pupi().await?;
    let counts = db.vote_counts().await?;
    output::format_seq(VoteRow::from_counts(&pupi, &counts), format)
}

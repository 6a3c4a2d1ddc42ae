//! This is a command-line tool to manage the pupi map database via [libpupi]
use crate::cli::Cli;
use anyhow::Result;
use clap::Parser;
use libpupi::Database;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod output;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Cli::parse();
    let url = args
        .database
        .or_else(|| std::env::var("DATABASE_URL").ok());
    let db = Database::open_url(url.as_deref()).await?;

    let result = commands::run(args.command, &db).await;
    db.close().await;
    println!("{}", result?);
    Ok(())
}

//! Handlers for the pupictl subcommands. Each handler returns the text that
//! should be printed.
use crate::cli::Commands;
use anyhow::Result;
use libpupi::Database;
use libpupi::pupo::PupoInput;

pub(crate) mod pupi;
pub(crate) mod transfer;
pub(crate) mod votes;

pub(crate) async fn run(command: Commands, db: &Database) -> Result<String> {
    match command {
        // opening the database already applied any pending migrations
        Commands::Migrate => Ok(format!(
            "Database is up to date ({} backend, {} pupi)",
            db.backend(),
            db.count_pupi().await?
        )),
        Commands::List { output } => pupi::list(db, output.format).await,
        Commands::Show { id, output } => pupi::show(db, id, output.format).await,
        Commands::Add {
            name,
            description,
            lat,
            lng,
            image,
            artist,
            theme,
            address,
        } => {
            let input = PupoInput {
                name: Some(name),
                description: Some(description),
                lat: Some(lat),
                lng: Some(lng),
                image: Some(image),
                artist: Some(artist),
                theme: Some(theme),
                address,
            };
            pupi::add(db, input).await
        }
        Commands::Modify {
            id,
            name,
            description,
            lat,
            lng,
            image,
            artist,
            theme,
            address,
        } => {
            let patch = PupoInput {
                name,
                description,
                lat,
                lng,
                image,
                artist,
                theme,
                address,
            };
            pupi::modify(db, id, patch).await
        }
        Commands::Remove { id } => pupi::remove(db, id).await,
        Commands::Import { file } => transfer::import(db, &file).await,
        Commands::Export { file } => transfer::export(db, file.as_deref()).await,
        Commands::Votes { output } => votes::list(db, output.format).await,
    }
}

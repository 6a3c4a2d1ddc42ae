use crate::output::OutputFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub(crate) struct Cli {
    /// Database url, e.g. `sqlite://data/pupi.db`, `postgres://...` or
    /// `pupi.json`. Defaults to the `DATABASE_URL` environment variable.
    #[arg(short, long)]
    pub database: Option<String>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub(crate) struct OutputOptions {
    #[arg(short, long = "output", value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    #[command(about = "Create the database and bring its schema up to date")]
    Migrate,
    #[command(about = "List all pupi")]
    List {
        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(about = "Show all details about a pupo")]
    Show {
        id: i64,
        #[command(flatten)]
        output: OutputOptions,
    },
    #[command(about = "Add a new pupo to the map")]
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
        #[arg(long)]
        image: String,
        #[arg(long)]
        artist: String,
        #[arg(long)]
        theme: String,
        #[arg(long)]
        address: Option<String>,
    },
    #[command(
        about = "Modify properties of a pupo",
        group(
            clap::ArgGroup::new("modify")
                .required(true)
                .multiple(true)
                .args(&["name", "description", "lat", "lng", "image", "artist", "theme", "address"]),
        ))]
    Modify {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lng: Option<f64>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    #[command(about = "Remove a pupo and its votes from the database")]
    Remove { id: i64 },
    #[command(about = "Import pupi from a json file")]
    Import {
        /// A json array of pupi, or an object with a `pupi` array
        file: PathBuf,
    },
    #[command(about = "Export all pupi as json")]
    Export {
        /// Write to this file instead of standard output
        file: Option<PathBuf>,
    },
    #[command(about = "Show the number of votes for each pupo")]
    Votes {
        #[command(flatten)]
        output: OutputOptions,
    },
}

use colored::Colorize;
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use trivia_api::libtrivia::db;
use trivia_api::libtrivia::error::StoreError;
use trivia_api::libtrivia::interchange::{self, TriviaJson};

#[derive(Parser, Debug)]
#[command(name = "trivia-io")]
#[command(version, about = "Import or export trivia categories and questions as JSON", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, default_value = "info")]
    log_level: String,
    #[arg(short, long, default_value = "false")]
    refresh_db: bool,
    #[arg(short, long, value_name = "FILE", env = "TRIVIA_DB_PATH", default_value = "trivia.db")]
    db: PathBuf,

    json: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the JSON file into the database
    Import,
    /// Write the database contents to the JSON file
    Export,
}

fn run(args: &Args) -> Result<(), String> {
    let pool = db::create_or_open(&args.db).map_err(|e| format!("Unable to open Database: {e}"))?;
    let mut conn = pool
        .get()
        .map_err(|e| format!("Unable to open Database: {}", StoreError::from(e)))?;

    match args.command {
        Commands::Import => {
            let json = std::fs::read_to_string(&args.json)
                .map_err(|e| format!("Cannot read {:?}: {e}", args.json))?;
            let content: TriviaJson =
                serde_json::from_str(&json).map_err(|e| format!("Malformed JSON: {e}!"))?;
            info!(
                "{}",
                format!(
                    "Importing data... ({} Categories, {} Questions)",
                    content.categories.len(),
                    content.questions.len()
                )
                .blue()
            );

            let summary = interchange::import(&mut conn, &content, args.refresh_db)
                .map_err(|e| format!("Import failed, nothing was written: {e}"))?;
            info!(
                "{}",
                format!(
                    "├ {} Categories, {} Questions imported",
                    summary.categories, summary.questions
                )
                .green()
            );
            if summary.skipped > 0 {
                error!(
                    "{}",
                    format!("├ ✘ {} Questions skipped (see errors above)", summary.skipped).red()
                );
            }
        }
        Commands::Export => {
            let content = interchange::export(&conn).map_err(|e| format!("Export failed: {e}"))?;
            let json = serde_json::to_string_pretty(&content)
                .map_err(|e| format!("Cannot encode JSON: {e}"))?;
            std::fs::write(&args.json, json)
                .map_err(|e| format!("Cannot write {:?}: {e}", args.json))?;
            info!(
                "{}",
                format!(
                    "Exported {} Categories and {} Questions to {:?}",
                    content.categories.len(),
                    content.questions.len(),
                    args.json
                )
                .green()
            );
        }
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();
    info!(
        "{}",
        format!("File at {:?} and Database at {:?}", args.json, args.db).cyan()
    );

    if let Err(message) = run(&args) {
        error!("{}", message.red());
        std::process::exit(1);
    }
}

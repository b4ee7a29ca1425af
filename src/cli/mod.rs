use anyhow::Result;
use clap::{Parser, Subcommand};
use std::env;

pub mod init;
pub mod job;
pub mod migrate;
pub mod serve;

use job::JobId;

#[derive(Subcommand)]
enum Command {
    /// Initialize the database
    Init {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Migrate the db schema
    Migrate {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Run a periodic job once
    Job {
        #[arg(long, value_enum)]
        id: JobId,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    let storage_path = env::var("MAILBRIDGE_STORAGE_PATH").unwrap_or("./".to_string());
    let db_path = format!("{}/db", storage_path);

    // Handle each sub command
    match args.command {
        Some(Command::Init { db }) => {
            init::run(db, &db_path).await?;
        }
        Some(Command::Migrate { db }) => {
            migrate::run(db, &db_path).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await;
        }
        Some(Command::Job { id }) => {
            job::run(id).await?;
        }
        None => {}
    }

    Ok(())
}

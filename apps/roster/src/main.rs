//! Roster binary entry point.

use clap::Parser;
use roster::api::run_server;
use roster::cli::{
    Cli, Commands, cmd_create_user, cmd_import, cmd_init, cmd_list, cmd_reset, cmd_stats,
    open_roster,
};
use roster::config::init_tracing;
use roster::roster_core::{MemoryStore, Roster};
use std::process::ExitCode;
use tracing::{error, info};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), BoxError> {
    let db = cli.db;
    match cli.command {
        Commands::Serve(args) => {
            let config = args.to_config()?;
            let roster = if args.ephemeral {
                info!("running with an in-memory store; data is lost on exit");
                Roster::new(MemoryStore::new()).with_policy(config.policy)
            } else {
                info!(db = %db.display(), "opening database");
                open_roster(&db, config.policy)?
            };
            run_server(roster, config).await?;
        }
        Commands::Init { force } => cmd_init(&db, force)?,
        Commands::Import {
            file,
            format,
            replace,
        } => {
            cmd_import(&db, &file, format.as_deref(), replace, cli.json)?;
        }
        Commands::CreateUser {
            username,
            password,
            mssv,
            iterations,
        } => cmd_create_user(&db, &username, &password, &mssv, iterations)?,
        Commands::List => {
            cmd_list(&db, cli.json)?;
        }
        Commands::Stats => {
            cmd_stats(&db, cli.json)?;
        }
        Commands::Reset => {
            cmd_reset(&db, cli.json)?;
        }
    }
    Ok(())
}

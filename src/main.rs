mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use relaybox::config::Config;
use relaybox::observability;
use relaybox::service::FilesService;
use serde::Serialize;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    observability::init_tracing(&config.telemetry.log_level);

    let service = FilesService::from_config(&config)?;
    let outcome = run(&service, cli.command).await;
    service.shutdown().await?;
    outcome
}

async fn run(service: &FilesService, command: Commands) -> Result<(), AnyError> {
    match command {
        Commands::Upload(args) => print_json(&service.upload_files(args.urls).await?),
        Commands::List(args) => print_json(&service.find_all(args.page, args.limit)?),
        Commands::Get(args) => print_json(&service.find_one(&args.id)?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AnyError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

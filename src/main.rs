//! Dialogue Miner CLI entry point.

use clap::Parser;

use dialogue_miner::cli::{commands, handle_error, Cli, Commands};
use dialogue_miner::infrastructure::config::ConfigLoader;
use dialogue_miner::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, &config, cli.json).await,
        Commands::Simulate(args) => commands::simulate::execute(args, &config, cli.json).await,
        Commands::Batch(args) => commands::batch::execute(args, &config, cli.json).await,
        Commands::Inbox(args) => commands::inbox::execute(args, &config, cli.json).await,
        Commands::Ingest(args) => commands::ingest::execute(args, &config, cli.json).await,
        Commands::Taxonomy(args) => commands::taxonomy::execute(args, &config, cli.json).await,
        Commands::Coverage(args) => commands::coverage::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}

use clap::Parser;
use tracing_subscriber::EnvFilter;

use taxon_db::cli;
use taxon_db::web;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Initialize logging based on verbosity flag; RUST_LOG wins when set
    let default_filter = if cli.verbose {
        "taxon_db=debug,info"
    } else if matches!(cli.command, cli::Commands::Serve(_)) {
        "taxon_db=info"
    } else {
        "taxon_db=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        cli::Commands::Serve(args) => {
            web::server::run(args)?;
        }
        cli::Commands::Ranks(args) => {
            cli::ranks::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Check(args) => {
            cli::check::run(args, cli.format, cli.verbose)?;
        }
        cli::Commands::Tree(args) => {
            cli::tree::run(args, cli.format, cli.verbose)?;
        }
    }

    Ok(())
}

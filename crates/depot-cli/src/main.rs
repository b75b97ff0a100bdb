//! depot - browse and manage packages across backends

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use depot_cli::cmd;
use depot_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        cmd::completions::completions(shell);
        return Ok(());
    }

    let mut context = cmd::open_context(cli.config.as_deref(), &cli.backends).await?;
    let json = cli.json;

    match cli.command {
        Commands::Backends => cmd::backends::backends(&context, json),
        Commands::List(args) => cmd::list::list(&mut context, &args, json).await,
        Commands::Search { query, view } => {
            cmd::search::search(&mut context, &query, &view, json).await
        }
        Commands::Info { package } => cmd::info::info(&context, &package, json),
        Commands::Install {
            packages,
            addons,
            remove_addons,
        } => cmd::install::install(&mut context, &packages, &addons, &remove_addons).await,
        Commands::Remove { packages } => cmd::remove::remove(&mut context, &packages).await,
        Commands::Update { check } => cmd::update::update(&mut context, check, json).await,
        Commands::Completions { .. } => Ok(()),
    }
}

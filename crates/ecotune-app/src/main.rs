use anyhow::Result;
use clap::Parser;
use ecotune_app::{Cli, Command, commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match &cli.command {
        Command::Optimize(args) => {
            commands::optimize(args)?;
        }
        Command::Run(args) => {
            commands::run(args)?;
        }
        Command::Params => commands::params(),
    }
    Ok(())
}

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

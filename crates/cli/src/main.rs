mod commands;
mod config;
mod error;

use clap::Parser;

use crate::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = config::Args::parse();
    let settings = config::load(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "budget_cli={level},budget_client={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context::open(&settings)?;
    commands::run(args.command, &ctx).await
}

//! Curriculum CLI: import course outlines into a local course database.
//!
//! Parses outline documents, reconciles them against previously imported
//! courses (keeping identifiers stable), and exports stored courses back to
//! the outline format.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}

//! Email Processor Entry Point

use clap::Parser;
use core_config::tracing::install_color_eyre;
use eyre::Result;
use nearmiss_email_processor::cli::Cli;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Install color-eyre first for colored error output
    install_color_eyre();

    let cli = Cli::parse();
    nearmiss_email_processor::run(cli).await
}

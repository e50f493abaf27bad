use clap::Parser;
use kubescan::cli::Cli;
use std::process;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(false) => {}
        Ok(true) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    // Initialize logging
    cli.init_logging();

    kubescan::run_command(cli.command, cli.config.as_deref()).await
}

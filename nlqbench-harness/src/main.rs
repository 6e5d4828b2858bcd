use clap::Parser;
use nlqbench_harness::cli::{self, Cli};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    if let Err(e) = cli::run(cli).await {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

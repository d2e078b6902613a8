use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod describe;

/// Describe pipeline runs and exercise their lifecycle handlers.
#[derive(Debug, Parser)]
#[command(name = "flowrun", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Build the run descriptor for a script and print its public properties
    Describe(describe::DescribeArgs),
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Describe(args) => describe::run(args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

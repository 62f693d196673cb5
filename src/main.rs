use clap::Parser;
use servertime_alarm::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    servertime_alarm::run(Cli::parse()).await
}

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    time_of_death::run(time_of_death::Cli::parse()).await
}

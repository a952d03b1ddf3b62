use clap::Parser;
use courtside::app;
use courtside::cli::Cli;
use courtside::telemetry::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_filter);
    app::run(cli).await
}

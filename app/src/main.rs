use clap::Parser;
use docent::Command;
use docent_core::{telemetry, ClientSettings, DocentClient};
use std::time::Duration;
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "docent", version, about = "Upload documents, read their analysis and chat about them")]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Overrides the configured API base address.
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Overrides the configured request deadline, in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing(telemetry::default_filter())?;

    let cli = Cli::parse();
    let mut settings = ClientSettings::load().map_err(|err| anyhow::anyhow!(err.user_message()))?;
    if let Some(base_url) = cli.base_url {
        settings = settings.with_base_url(base_url);
    }
    if let Some(timeout_ms) = cli.timeout_ms.filter(|ms| *ms > 0) {
        settings = settings.with_timeout(Duration::from_millis(timeout_ms));
    }

    let runtime = Runtime::new()?;
    let client = DocentClient::from_settings(&settings);
    let mut stdout = std::io::stdout();
    runtime.block_on(docent::run(&client, cli.command, &mut stdout))
}

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use docent_core::state::SubmitOutcome;
use docent_core::{
    files::PDF_MEDIA_TYPE, telemetry, ClientSettings, CredentialStore, DocentClient,
    MockTransport, UploadFile,
};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "xtask", version, about = "Automation helpers for Docent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a lightweight smoke test that exercises the Docent core against a scripted backend.
    Smoke,
}

fn main() -> Result<()> {
    telemetry::init_tracing(EnvFilter::new("info"))?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Smoke => smoke_test(),
    }
}

fn smoke_test() -> Result<()> {
    let runtime = Runtime::new()?;
    let mock = MockTransport::new();
    mock.push_json(
        200,
        json!({"user": {"id": "smoke", "email": "smoke@example.com", "name": "Smoke Test"}}),
    )
    .push_json(
        200,
        json!({"doc_id": "doc-smoke", "meta": {"filename": "smoke.pdf"}, "summary": ["ok"]}),
    )
    .push_json(200, json!({"response": "pong"}));

    let client = DocentClient::with_transport(
        &ClientSettings::default(),
        CredentialStore::in_memory(),
        Arc::new(mock.clone()),
    );

    runtime.block_on(async {
        let profile = client.session.login("smoke@example.com", "smoke").await?;
        let file = UploadFile::new("smoke.pdf", PDF_MEDIA_TYPE, b"%PDF-1.7".to_vec());
        let record = client.files.upload_document(Some(&file), &profile.id).await?;
        let session = client.chat_session(record.id);
        if session.submit("ping from xtask").await != SubmitOutcome::Answered {
            bail!("chat round did not produce an answer");
        }
        info!(
            "turns" = session.transcript().len(),
            "requests" = mock.requests().len(),
            "smoke test completed"
        );
        Ok::<(), anyhow::Error>(())
    })
}

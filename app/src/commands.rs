use crate::render;
use anyhow::{anyhow, Result};
use clap::Subcommand;
use docent_core::state::{IgnoredReason, SubmitOutcome};
use docent_core::{ChatSession, DocentClient, ExternalIdentity, UploadFile};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in and store the session token.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in with an identity from an outside provider.
    LoginExternal {
        #[arg(long, default_value = "google")]
        provider: String,
        #[arg(long, default_value = "user@gmail.com")]
        email: String,
        #[arg(long, default_value = "Google User")]
        name: String,
    },
    /// Forget the stored token.
    Logout,
    /// Replace the stored token with a fresh one.
    Refresh,
    /// Report whether a token is stored.
    Whoami,
    /// Upload a PDF for analysis.
    Upload {
        file: PathBuf,
        #[arg(long)]
        user: String,
    },
    /// List the user's documents.
    Documents {
        #[arg(long)]
        user: String,
    },
    /// Print the analysis of one or more documents.
    Summary {
        #[arg(required = true)]
        documents: Vec<String>,
    },
    /// Chat about a document, one question per line.
    Chat {
        document: String,
        #[arg(long)]
        user: String,
    },
}

pub async fn run<W: Write>(client: &DocentClient, command: Command, out: &mut W) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let profile = client.session.login(&email, &password).await?;
            writeln!(out, "{}", render::profile_line(&profile))?;
        }
        Command::Register {
            name,
            email,
            password,
        } => {
            let profile = client.session.register(&name, &email, &password).await?;
            writeln!(out, "{}", render::profile_line(&profile))?;
        }
        Command::LoginExternal {
            provider,
            email,
            name,
        } => {
            let identity = ExternalIdentity::new(provider, email, name);
            let profile = client.session.login_with_external_identity(identity);
            writeln!(out, "{}", render::profile_line(&profile))?;
        }
        Command::Logout => {
            client.session.logout();
            writeln!(out, "Signed out.")?;
        }
        Command::Refresh => {
            client.session.refresh_token();
            writeln!(out, "Token refreshed.")?;
        }
        Command::Whoami => match client.session.verify_token() {
            Ok(()) => writeln!(out, "A session token is stored.")?,
            Err(err) => writeln!(out, "{err}")?,
        },
        Command::Upload { file, user } => {
            let upload = UploadFile::from_path(&file)?;
            let record = client.files.upload_document(Some(&upload), &user).await?;
            writeln!(out, "Uploaded {} as {}", record.name, record.id)?;
        }
        Command::Documents { user } => {
            let records = client.files.list_user_documents(&user).await?;
            if records.is_empty() {
                writeln!(out, "No documents yet.")?;
            }
            for record in &records {
                writeln!(out, "{}", render::document_line(record))?;
            }
        }
        Command::Summary { documents } => {
            // Independent calls; results are printed in request order.
            let fetches = documents
                .iter()
                .map(|id| client.documents.get_summary(id));
            let results = futures::future::join_all(fetches).await;
            let mut failures = 0;
            for (id, result) in documents.iter().zip(results) {
                match result {
                    Ok(summary) => write!(out, "{}", render::summary_block(&summary))?,
                    Err(err) => {
                        failures += 1;
                        writeln!(out, "{id}: {err}")?;
                    }
                }
            }
            if failures == documents.len() {
                return Err(anyhow!("no summaries could be loaded"));
            }
        }
        Command::Chat { document, user } => {
            client.session.resume(&user)?;
            let (summary, session) = client.open_chat(document).await?;
            write!(out, "{}", render::summary_block(&summary))?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            chat_loop(&session, stdin, out).await?;
        }
    }
    Ok(())
}

/// Feeds each input line to the session and prints the turns it produced.
pub async fn chat_loop<R, W>(session: &ChatSession, reader: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    for turn in session.transcript() {
        writeln!(out, "{}", render::turn_line(&turn))?;
    }
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let seen = session.transcript().len();
        match session.submit(line).await {
            SubmitOutcome::Ignored(IgnoredReason::EmptyMessage) => continue,
            SubmitOutcome::Ignored(reason) => {
                tracing::debug!(?reason, "submission ignored");
                continue;
            }
            SubmitOutcome::Answered | SubmitOutcome::Apologized => {}
        }
        for turn in session.transcript().iter().skip(seen + 1) {
            writeln!(out, "{}", render::turn_line(turn))?;
        }
    }
    Ok(())
}

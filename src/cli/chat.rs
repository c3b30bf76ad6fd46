use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc;

use quill::agent::{CallControl, ChatRequest, Orchestrator, Termination};
use quill::config::QuillConfig;
use quill::filter::CategoryFilter;
use quill::journal::{OwnerId, SqliteEntryStore};
use quill::model::openai::OpenAiClient;
use quill::model::Turn;
use quill::session::Session;

#[derive(Args)]
pub struct ChatArgs {
    /// Owner whose journal the conversation operates on
    #[arg(long)]
    pub owner: String,
    /// Restrict the conversation to one category ("all" for none)
    #[arg(long)]
    pub category: Option<String>,
    /// Print the reply as it is generated
    #[arg(long)]
    pub stream: bool,
    /// The message to send
    pub message: String,
}

/// Run one orchestration call from the terminal. Ctrl-c cancels it.
pub async fn chat(config: &QuillConfig, args: ChatArgs) -> Result<()> {
    let owner = OwnerId::new(args.owner.trim());
    anyhow::ensure!(!owner.is_empty(), "--owner must not be empty");
    let filter = CategoryFilter::parse(args.category.as_deref())
        .map_err(|e| anyhow::anyhow!("invalid --category: {e}"))?;

    let conn = quill::db::open_database(config.resolved_db_path())?;
    let store = Arc::new(SqliteEntryStore::from_connection(conn));
    let model =
        Arc::new(OpenAiClient::from_config(&config.model).context("failed to build model client")?);
    let orchestrator = Orchestrator::new(model, store, config.agent.clone());

    let session = Session::new(owner, "cli");
    let request = ChatRequest::new(vec![Turn::user(args.message)]).with_filter(filter);

    let control = CallControl::new();
    let cancel = control.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = if args.stream {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
            let mut stdout = std::io::stdout();
            while let Some(chunk) = rx.recv().await {
                let _ = write!(stdout, "{chunk}");
                let _ = stdout.flush();
            }
        });
        let result = orchestrator
            .orchestrate_streaming(Some(&session), request, control, tx)
            .await;
        printer.await.context("stream printer failed")?;
        println!();
        result
    } else {
        orchestrator
            .orchestrate(Some(&session), request, control)
            .await
    };

    match result {
        Ok(outcome) => {
            if !args.stream {
                println!("{}", outcome.reply);
            }
            for record in &outcome.records {
                tracing::info!(
                    round = record.round,
                    capability = %record.result.name,
                    success = record.result.is_success(),
                    "{}",
                    record.result.message()
                );
            }
            if outcome.termination == Termination::StepBudget {
                eprintln!("(stopped after {} rounds)", outcome.rounds);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e.user_message());
            Err(e.into())
        }
    }
}

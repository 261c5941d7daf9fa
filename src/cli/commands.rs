//! Implementations of the non-server subcommands.

use super::output::Output;
use crate::chat::{AnswerMode, ChatEngine};
use crate::rag::monitor::ChangeReport;
use crate::rag::{FileMonitor, IndexOutcome, RagService, RebuildReason};
use crate::session::SessionManager;
use crate::types::Result;
use crate::utils::toml_config::FoodieConfig;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const EXIT_COMMANDS: [&str; 4] = ["quit", "exit", "退出", "q"];

/// Whether a console input line ends the question loop.
pub fn is_exit_command(input: &str) -> bool {
    let input = input.trim().to_lowercase();
    EXIT_COMMANDS.contains(&input.as_str())
}

fn describe_reason(reason: &RebuildReason) -> String {
    match reason {
        RebuildReason::Forced => "forced".to_string(),
        RebuildReason::FilesChanged(changes) => format!("{} file(s) changed", changes.len()),
        RebuildReason::ModelChanged { stored } => format!(
            "embedding model changed (was {})",
            stored.as_deref().unwrap_or("unknown")
        ),
        RebuildReason::Unreadable => "stored index was unreadable".to_string(),
    }
}

/// Print what an index sync did.
pub fn report_outcome(outcome: &IndexOutcome, output: &Output) {
    match outcome {
        IndexOutcome::Created { documents, chunks } => output.success(&format!(
            "Index created: {documents} documents, {chunks} chunks"
        )),
        IndexOutcome::Rebuilt {
            reason,
            documents,
            chunks,
        } => {
            if let RebuildReason::FilesChanged(changes) = reason {
                for change in changes {
                    output.change(&change.to_string());
                }
            }
            output.success(&format!(
                "Index rebuilt ({}): {documents} documents, {chunks} chunks",
                describe_reason(reason)
            ));
        }
        IndexOutcome::Loaded { chunks } => {
            output.success(&format!("No document changes, index loaded ({chunks} chunks)"))
        }
        IndexOutcome::Unchanged { chunks } => {
            output.info(&format!("Index is up to date ({chunks} chunks)"))
        }
    }
}

/// `index [--force]`
pub async fn run_index(rag: &RagService, force: bool, output: &Output) -> Result<IndexOutcome> {
    output.header("Document index");
    output.kv("data", &rag.monitor().data_dir().display().to_string());
    output.kv("storage", &rag.storage_dir().display().to_string());

    let outcome = if force {
        rag.rebuild().await?
    } else {
        rag.initialize().await?
    };
    report_outcome(&outcome, output);
    Ok(outcome)
}

/// `monitor`: read-only; the hash cache is left untouched.
pub fn run_monitor(monitor: &FileMonitor, output: &Output) -> ChangeReport {
    output.header("Document changes");
    output.kv("data", &monitor.data_dir().display().to_string());
    output.kv("cache", &monitor.cache_file().display().to_string());

    let report = monitor.check_changes();
    if report.has_changes() {
        output.warning(&format!("{} change(s) since the last build", report.changes.len()));
        for change in &report.changes {
            output.change(&change.to_string());
        }
        output.hint("Rebuild the index with:");
        output.command("foodie-server index");
    } else {
        output.success(&format!("No changes ({} files tracked)", report.current.len()));
    }
    report
}

/// `config`
pub fn print_config(config: &FoodieConfig, output: &Output) -> Result<()> {
    output.header("Effective configuration");
    output.raw(&config.to_toml_string()?);
    Ok(())
}

/// Counts of a finished question loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AskSummary {
    pub answered: usize,
    pub failed: usize,
}

/// `ask`: question loop over `input` with one conversation memory.
///
/// Ends on an exit command or end of input. Failed questions are reported and
/// the loop continues.
pub async fn run_ask<R>(
    engine: &ChatEngine,
    sessions: &SessionManager,
    input: R,
    top_k: usize,
    output: &Output,
) -> Result<AskSummary>
where
    R: AsyncBufRead + Unpin,
{
    let session_id = sessions.create_session();
    let mut summary = AskSummary::default();
    let mut lines = input.lines();

    output.header("RAG 查詢系統已準備完成！");
    output.info("輸入你的問題，輸入 'quit' 或 'exit' 退出");

    loop {
        output.prompt("問題>");
        let Some(line) = lines.next_line().await? else {
            output.newline();
            break;
        };

        let question = line.trim();
        if is_exit_command(question) {
            output.info("感謝使用 RAG 查詢系統！");
            break;
        }
        if question.is_empty() {
            output.info("請輸入一個問題...");
            continue;
        }

        output.info(&format!("[查詢] 正在搜尋: {question}"));
        match engine
            .respond(sessions, &session_id, question, AnswerMode::Rag, top_k)
            .await
        {
            Ok(answer) => {
                output.answer(&answer);
                summary.answered += 1;
            }
            Err(e) => {
                output.error(&format!("發生錯誤: {e}"));
                output.info("請重新輸入問題...");
                summary.failed += 1;
            }
        }
    }

    sessions.delete_session(&session_id);
    Ok(summary)
}

mod common;

use common::mocks::{KeywordEmbedder, MockLLMClient};
use common::{POLICY_TEXT, test_config, write_policy};
use foodie::chat::ChatEngine;
use foodie::cli::commands::{self, AskSummary};
use foodie::cli::output::Output;
use foodie::rag::{FileChange, IndexOutcome, RagService, RebuildReason};
use foodie::session::SessionManager;
use std::fs;
use std::sync::Arc;

fn rag_service(config: &foodie::FoodieConfig) -> Arc<RagService> {
    Arc::new(RagService::new(config, Arc::new(KeywordEmbedder)).unwrap())
}

#[tokio::test]
async fn test_document_edit_triggers_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    write_policy(&config);

    let rag = rag_service(&config);
    assert!(matches!(
        rag.initialize().await.unwrap(),
        IndexOutcome::Created { documents: 1, .. }
    ));

    fs::write(config.rag.data_dir.join("shipping.md"), "運費 說明").unwrap();
    fs::write(config.rag.data_dir.join("policy.txt"), "鞋子 退貨 七天").unwrap();

    let outcome = rag.refresh().await.unwrap();
    let IndexOutcome::Rebuilt {
        reason: RebuildReason::FilesChanged(changes),
        documents,
        ..
    } = outcome
    else {
        panic!("expected a rebuild, got {outcome:?}");
    };
    assert_eq!(documents, 2);
    assert!(changes.contains(&FileChange::Added("shipping.md".to_string())));
    assert!(changes.contains(&FileChange::Modified("policy.txt".to_string())));

    // Cache was refreshed by the rebuild
    assert!(!rag.monitor().check_changes().has_changes());
}

#[tokio::test]
async fn test_deleted_document_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    write_policy(&config);

    let rag = rag_service(&config);
    rag.initialize().await.unwrap();
    fs::remove_file(config.rag.data_dir.join("policy.txt")).unwrap();

    let report = commands::run_monitor(rag.monitor(), &Output::no_color());
    assert_eq!(report.changes, vec![FileChange::Deleted("policy.txt".to_string())]);

    // Monitoring is read-only
    assert!(rag.monitor().check_changes().has_changes());
}

#[tokio::test]
async fn test_unsupported_files_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    write_policy(&config);
    fs::write(config.rag.data_dir.join("logo.png"), [0u8, 1, 2]).unwrap();

    let rag = rag_service(&config);
    let outcome = rag.initialize().await.unwrap();
    assert_eq!(outcome.chunks(), 1);

    let cached = rag.monitor().load_cached_hashes();
    assert_eq!(cached.keys().collect::<Vec<_>>(), vec!["policy.txt"]);
}

#[tokio::test]
async fn test_run_index_force() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    write_policy(&config);

    let rag = rag_service(&config);
    let output = Output::no_color();
    commands::run_index(&rag, false, &output).await.unwrap();

    let outcome = commands::run_index(&rag, true, &output).await.unwrap();
    assert!(matches!(
        outcome,
        IndexOutcome::Rebuilt {
            reason: RebuildReason::Forced,
            ..
        }
    ));
}

#[tokio::test]
async fn test_retrieve_ranks_matching_chunk_first() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    write_policy(&config);
    fs::write(config.rag.data_dir.join("menu.txt"), "餐點 餐點 餐點").unwrap();

    let rag = rag_service(&config);
    rag.initialize().await.unwrap();

    let hits = rag.retrieve("我想退貨", 2).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].text, POLICY_TEXT);
    assert!(hits[0].score > hits[1].score);
}

#[tokio::test]
async fn test_ask_loop() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    write_policy(&config);

    let rag = rag_service(&config);
    rag.initialize().await.unwrap();
    let llm = MockLLMClient::new("七天內可以退貨");
    let engine = ChatEngine::new(Arc::new(llm.clone()), rag);
    let sessions = SessionManager::default();

    let input: &[u8] = "\n鞋子可以退貨嗎\n那運費呢\nquit\n沒有被問到\n".as_bytes();
    let summary = commands::run_ask(&engine, &sessions, input, 5, &Output::no_color())
        .await
        .unwrap();

    assert_eq!(
        summary,
        AskSummary {
            answered: 2,
            failed: 0
        }
    );
    // Second question was condensed against the first exchange
    assert_eq!(llm.prompts().len(), 3);
    assert_eq!(sessions.session_count(), 0);
}

#[tokio::test]
async fn test_ask_loop_survives_errors_and_eof() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&dir);
    write_policy(&config);

    let rag = rag_service(&config);
    rag.initialize().await.unwrap();
    let engine = ChatEngine::new(Arc::new(MockLLMClient::failing()), rag);
    let sessions = SessionManager::default();

    let input: &[u8] = "退貨\n換貨".as_bytes();
    let summary = commands::run_ask(&engine, &sessions, input, 5, &Output::no_color())
        .await
        .unwrap();
    assert_eq!(
        summary,
        AskSummary {
            answered: 0,
            failed: 2
        }
    );
}

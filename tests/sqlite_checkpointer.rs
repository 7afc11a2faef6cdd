//! SQLite checkpointer durability tests.

#![cfg(feature = "sqlite")]

mod common;

use chrono::Utc;
use common::{AppendItem, chat_schema};
use serde_json::json;
use std::sync::Arc;
use threadflow::graph::GraphBuilder;
use threadflow::runtime::{
    Checkpoint, Checkpointer, CheckpointerError, InvokeOptions, SqliteCheckpointer,
};
use threadflow::state::GraphState;
use threadflow::types::NodeId;

fn db_url(dir: &tempfile::TempDir) -> String {
    format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("checkpoints.db").display()
    )
}

fn checkpoint(thread_id: &str, seq: u64) -> Checkpoint {
    Checkpoint {
        thread_id: thread_id.to_string(),
        seq,
        state: GraphState::builder()
            .with_value("log", json!([format!("step-{seq}")]))
            .build(),
        next_node: NodeId::node("next"),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteCheckpointer::connect(&db_url(&dir)).await.unwrap();

    store.save(checkpoint("t1", 1)).await.unwrap();
    store.save(checkpoint("t1", 2)).await.unwrap();

    let latest = store.load_latest("t1").await.unwrap().unwrap();
    assert_eq!(latest.seq, 2);
    assert_eq!(latest.next_node, NodeId::node("next"));
    assert_eq!(latest.state.get("log"), Some(&json!(["step-2"])));

    let first = store.load_seq("t1", 1).await.unwrap().unwrap();
    assert_eq!(first.state.get("log"), Some(&json!(["step-1"])));
    assert!(store.load_latest("unknown").await.unwrap().is_none());
}

#[tokio::test]
async fn checkpoints_survive_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = db_url(&dir);

    {
        let store = SqliteCheckpointer::connect(&url).await.unwrap();
        store.save(checkpoint("durable", 1)).await.unwrap();
    }

    let store = SqliteCheckpointer::connect(&url).await.unwrap();
    let restored = store.load_latest("durable").await.unwrap().unwrap();
    assert_eq!(restored.seq, 1);
    assert_eq!(restored.state.get("log"), Some(&json!(["step-1"])));
}

#[tokio::test]
async fn non_monotonic_saves_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteCheckpointer::connect(&db_url(&dir)).await.unwrap();

    store.save(checkpoint("t1", 2)).await.unwrap();
    let err = store.save(checkpoint("t1", 2)).await.unwrap_err();
    assert!(matches!(
        err,
        CheckpointerError::NonMonotonic {
            attempted: 2,
            last: 2,
            ..
        }
    ));
    let err = store.save(checkpoint("t1", 1)).await.unwrap_err();
    assert!(matches!(err, CheckpointerError::NonMonotonic { .. }));
}

#[tokio::test]
async fn list_threads_is_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteCheckpointer::connect(&db_url(&dir)).await.unwrap();

    store.save(checkpoint("zeta", 1)).await.unwrap();
    store.save(checkpoint("alpha", 1)).await.unwrap();
    assert_eq!(store.list_threads().await.unwrap(), vec!["alpha", "zeta"]);
}

#[tokio::test]
async fn app_runs_against_sqlite_and_resumes_after_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let url = db_url(&dir);

    let build = |store: Arc<dyn Checkpointer>| {
        GraphBuilder::new()
            .with_state_schema(chat_schema())
            .add_node(
                "first",
                AppendItem {
                    field: "log",
                    value: json!("first"),
                },
            )
            .add_node(
                "second",
                AppendItem {
                    field: "log",
                    value: json!("second"),
                },
            )
            .set_entry_point("first")
            .add_edge("first", "second")
            .set_finish_point("second")
            .compile()
            .unwrap()
            .with_checkpointer(store)
    };

    // Run one step, then drop the app and its pool.
    {
        let store = Arc::new(SqliteCheckpointer::connect(&url).await.unwrap());
        let app = build(store);
        app.invoke_with_options(
            GraphState::new(),
            InvokeOptions::new()
                .with_thread_id("restartable")
                .with_max_steps(1),
        )
        .await
        .unwrap_err();
    }

    // A fresh process picks the thread up where it stopped.
    let store = Arc::new(SqliteCheckpointer::connect(&url).await.unwrap());
    let app = build(store);
    let report = app
        .invoke_with_report(
            GraphState::new(),
            InvokeOptions::new().with_thread_id("restartable"),
        )
        .await
        .unwrap();
    assert_eq!(report.visited, vec!["second"]);
    assert_eq!(report.state.get("log"), Some(&json!(["first", "second"])));
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{running_ok, stopped_ok, MockConnector, ScriptAction};
use tokio::sync::mpsc;

fn agent(name: &str) -> AgentRef {
    AgentRef { name: name.into(), address: format!("{}:9000", name) }
}

async fn collect_updates(
    connector: MockConnector,
    agent_name: &str,
    cancel: CancellationToken,
) -> Vec<StatusReport> {
    let (tx, mut rx) = mpsc::channel(16);
    run_session(
        JobId::new(1),
        agent(agent_name),
        JobConfig::default(),
        Arc::new(connector),
        tx,
        None,
        cancel,
    )
    .await;

    let mut reports = Vec::new();
    while let Some(update) = rx.recv().await {
        assert_eq!(update.job_id, JobId::new(1));
        reports.push(update.status);
    }
    reports
}

#[tokio::test]
async fn relays_reports_in_order() {
    let connector = MockConnector::new();
    connector.script("a", vec![running_ok(0), stopped_ok(0)]);

    let reports = collect_updates(connector, "a", CancellationToken::new()).await;
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].run_status, RunStatus::Running);
    assert_eq!(reports[1].run_status, RunStatus::Stopped);
    assert_eq!(reports[1].health_status, Health::Ok);
}

#[tokio::test]
async fn silent_close_still_yields_a_terminal_update() {
    let connector = MockConnector::new();
    connector.script("a", vec![running_ok(0), ScriptAction::CloseStream]);

    let reports = collect_updates(connector, "a", CancellationToken::new()).await;
    let last = reports.last().unwrap();
    assert_eq!(last.run_status, RunStatus::Stopped);
    // Health is left to the merge rule, not forced to error.
    assert_eq!(last.health_status, Health::Same);
}

#[tokio::test]
async fn transport_error_is_terminal_error() {
    let connector = MockConnector::new();
    connector.script(
        "a",
        vec![running_ok(0), ScriptAction::TransportError("connection reset".into())],
    );

    let reports = collect_updates(connector, "a", CancellationToken::new()).await;
    let last = reports.last().unwrap();
    assert_eq!(last.run_status, RunStatus::Stopped);
    assert_eq!(last.health_status, Health::Error);
    assert!(last.error_messages.contains("connection reset"));
}

#[tokio::test]
async fn connect_failure_is_terminal_error() {
    let connector = MockConnector::new();
    connector.fail_connect("a", "nobody home");

    let reports = collect_updates(connector, "a", CancellationToken::new()).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].run_status, RunStatus::Stopped);
    assert_eq!(reports[0].health_status, Health::Error);
    assert!(reports[0].error_messages.contains("nobody home"));
}

#[tokio::test]
async fn cancellation_concludes_a_live_job() {
    let connector = MockConnector::new();
    // A report that would take far longer than the test.
    connector.script("a", vec![running_ok(0), running_ok(60_000)]);

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel_clone.cancel();
    });

    let reports = collect_updates(connector, "a", cancel).await;
    let last = reports.last().unwrap();
    assert_eq!(last.run_status, RunStatus::Stopped);
    assert_eq!(last.health_status, Health::Error);
    assert!(last.error_messages.contains("cancelled"));
}

#[tokio::test]
async fn idle_timeout_concludes_a_stalled_agent() {
    let connector = MockConnector::new();
    connector.script("a", vec![running_ok(0), running_ok(60_000)]);

    let (tx, mut rx) = mpsc::channel(16);
    run_session(
        JobId::new(1),
        agent("a"),
        JobConfig::default(),
        Arc::new(connector),
        tx,
        Some(std::time::Duration::from_millis(50)),
        CancellationToken::new(),
    )
    .await;

    let mut reports = Vec::new();
    while let Some(update) = rx.recv().await {
        reports.push(update.status);
    }
    let last = reports.last().unwrap();
    assert_eq!(last.run_status, RunStatus::Stopped);
    assert_eq!(last.health_status, Health::Error);
    assert!(last.error_messages.contains("no report from"));
}

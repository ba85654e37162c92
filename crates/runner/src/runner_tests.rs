// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{running_ok, stopped_ok, MockConnector};
use convoy_core::RunStatus;
use std::time::Duration;

fn registry(names: &[&str]) -> HashMap<String, AgentRef> {
    names
        .iter()
        .map(|n| {
            (n.to_string(), AgentRef { name: n.to_string(), address: format!("{}:9000", n) })
        })
        .collect()
}

async fn next_record(handle: &mut RunnerHandle) -> JobRecord {
    tokio::time::timeout(Duration::from_secs(5), handle.records.recv())
        .await
        .expect("timed out waiting for record")
        .expect("record stream closed")
}

#[tokio::test]
async fn publishes_created_record_then_session_updates() {
    let connector = MockConnector::new();
    connector.script("a", vec![running_ok(0), stopped_ok(0)]);

    let cancel = CancellationToken::new();
    let mut handle = JobRunner::spawn(
        RunnerConfig::new(registry(&["a"])),
        Arc::new(connector),
        cancel.clone(),
    );

    handle
        .jobs
        .send(JobRequest { job_id: JobId::new(7), agent_name: "a".into(), cfg: JobConfig::default() })
        .await
        .unwrap();

    let created = next_record(&mut handle).await;
    assert_eq!(created.job_id, JobId::new(7));
    assert_eq!(created.status.run_status, RunStatus::Startup);

    let running = next_record(&mut handle).await;
    assert_eq!(running.status.run_status, RunStatus::Running);

    let stopped = next_record(&mut handle).await;
    assert_eq!(stopped.status.run_status, RunStatus::Stopped);
    assert_eq!(stopped.status.health_status, convoy_core::Health::Ok);

    cancel.cancel();
}

#[tokio::test]
async fn unknown_agent_yields_synthetic_terminal_record() {
    let connector = MockConnector::new();
    let cancel = CancellationToken::new();
    let mut handle = JobRunner::spawn(
        RunnerConfig::new(registry(&["a"])),
        Arc::new(connector),
        cancel.clone(),
    );

    handle
        .jobs
        .send(JobRequest { job_id: JobId::new(1), agent_name: "zz".into(), cfg: JobConfig::default() })
        .await
        .unwrap();

    let record = next_record(&mut handle).await;
    assert_eq!(record.status.run_status, RunStatus::Stopped);
    assert_eq!(record.status.health_status, convoy_core::Health::Error);
    assert!(record.status.error_messages.contains("unknown agent name: zz"));

    cancel.cancel();
}

#[tokio::test]
async fn duplicate_job_id_is_fatal() {
    let connector = MockConnector::new();
    connector.script("a", vec![running_ok(60_000)]);

    let cancel = CancellationToken::new();
    let mut handle = JobRunner::spawn(
        RunnerConfig::new(registry(&["a"])),
        Arc::new(connector),
        cancel.clone(),
    );

    let req = JobRequest { job_id: JobId::new(3), agent_name: "a".into(), cfg: JobConfig::default() };
    handle.jobs.send(req.clone()).await.unwrap();
    let _ = next_record(&mut handle).await;
    handle.jobs.send(req).await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), handle.errors.recv())
        .await
        .expect("timed out waiting for runner error")
        .expect("error channel closed");
    assert_eq!(err, RunnerError::DuplicateJobId(JobId::new(3)));

    cancel.cancel();
}

#[tokio::test]
async fn fallback_allocator_assigns_ids() {
    let connector = MockConnector::new();
    connector.script("a", vec![stopped_ok(0)]);

    let cancel = CancellationToken::new();
    let mut handle = JobRunner::spawn(
        RunnerConfig::new(registry(&["a"])),
        Arc::new(connector),
        cancel.clone(),
    );

    handle
        .jobs
        .send(JobRequest { job_id: JobId::UNASSIGNED, agent_name: "a".into(), cfg: JobConfig::default() })
        .await
        .unwrap();

    let record = next_record(&mut handle).await;
    assert!(record.job_id.is_assigned());

    cancel.cancel();
}

#[tokio::test]
async fn refresh_republishes_current_records() {
    let connector = MockConnector::new();
    connector.script("a", vec![running_ok(60_000)]);

    let cancel = CancellationToken::new();
    let mut handle = JobRunner::spawn(
        RunnerConfig::new(registry(&["a"])),
        Arc::new(connector),
        cancel.clone(),
    );

    for id in 1..=2u64 {
        handle
            .jobs
            .send(JobRequest { job_id: JobId::new(id), agent_name: "a".into(), cfg: JobConfig::default() })
            .await
            .unwrap();
        let _ = next_record(&mut handle).await;
    }

    // Refresh all: both records republished in ID order.
    handle.refresh.send(JobId::UNASSIGNED).await.unwrap();
    let first = next_record(&mut handle).await;
    let second = next_record(&mut handle).await;
    assert_eq!(first.job_id, JobId::new(1));
    assert_eq!(second.job_id, JobId::new(2));

    // Refresh one.
    handle.refresh.send(JobId::new(2)).await.unwrap();
    let only = next_record(&mut handle).await;
    assert_eq!(only.job_id, JobId::new(2));

    cancel.cancel();
}

#[tokio::test]
async fn cancellation_drains_sessions_then_closes_stream() {
    let connector = MockConnector::new();
    connector.script("a", vec![running_ok(0), running_ok(60_000)]);

    let cancel = CancellationToken::new();
    let mut handle = JobRunner::spawn(
        RunnerConfig::new(registry(&["a"])),
        Arc::new(connector.clone()),
        cancel.clone(),
    );

    handle
        .jobs
        .send(JobRequest { job_id: JobId::new(1), agent_name: "a".into(), cfg: JobConfig::default() })
        .await
        .unwrap();
    let _ = next_record(&mut handle).await;

    cancel.cancel();

    // Drain everything until the runner closes the stream. The cancelled
    // session must have surfaced a terminal record first.
    let mut last_status = None;
    while let Ok(Some(record)) =
        tokio::time::timeout(Duration::from_secs(5), handle.records.recv()).await
    {
        last_status = Some(record.status);
    }
    let last = last_status.expect("expected at least one drained record");
    assert_eq!(last.run_status, RunStatus::Stopped);
    assert_eq!(connector.active_sessions(), 0);
}

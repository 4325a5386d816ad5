/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */


//! Publish and commit cycles through `BatchProcessor` and `OutboxRepository`.

use std::sync::Arc;

use outbox_relay::dal::{query_provider_for, QueryProvider, DEFAULT_OUTBOX_TABLE, OUTBOX_COLUMNS};
use outbox_relay::relay::{BatchProcessor, NO_TOPIC_REASON};
use outbox_relay::{BackendType, BatchSource, OutboxRepository, RepositorySettings, Sizer};
use serial_test::serial;

use crate::fixtures::{get_fixture, ScriptedPublisher, TestFixture};

async fn run_cycle(fixture: &TestFixture, publisher: Arc<ScriptedPublisher>, max_attempts: u32) {
    run_cycle_with(Arc::new(fixture.repository(50, max_attempts)), publisher).await;
}

/// Delegates to the backend's provider but swaps in a statement that always
/// fails for the chosen commit step.
#[derive(Debug)]
struct FailingStatements {
    inner: Box<dyn QueryProvider>,
    fail_success_update: bool,
    fail_errored_update: bool,
}

const FAILING_SQL: &str = "UPDATE missing_outbox_table SET push_attempts = 0";

impl QueryProvider for FailingStatements {
    fn backend(&self) -> BackendType {
        self.inner.backend()
    }

    fn table(&self) -> &str {
        self.inner.table()
    }

    fn batch_creation_sql(&self, batch_size: usize) -> String {
        self.inner.batch_creation_sql(batch_size)
    }

    fn batch_fetch_sql(&self) -> String {
        self.inner.batch_fetch_sql()
    }

    fn message_errored_update_sql(&self, max_push_attempts: u32) -> String {
        if self.fail_errored_update {
            return FAILING_SQL.to_string();
        }
        self.inner.message_errored_update_sql(max_push_attempts)
    }

    fn messages_success_update_sql(&self, id_count: usize) -> String {
        if self.fail_success_update {
            return FAILING_SQL.to_string();
        }
        self.inner.messages_success_update_sql(id_count)
    }

    fn delete_published_messages_sql(&self) -> String {
        self.inner.delete_published_messages_sql()
    }

    fn queue_size_sql(&self) -> String {
        self.inner.queue_size_sql()
    }

    fn total_size_sql(&self) -> String {
        self.inner.total_size_sql()
    }

    fn optimize_table_sql(&self) -> String {
        self.inner.optimize_table_sql()
    }
}

fn failing_repository(
    fixture: &TestFixture,
    fail_success_update: bool,
    fail_errored_update: bool,
) -> Arc<OutboxRepository> {
    let queries = FailingStatements {
        inner: query_provider_for(fixture.backend(), DEFAULT_OUTBOX_TABLE, OUTBOX_COLUMNS),
        fail_success_update,
        fail_errored_update,
    };
    Arc::new(OutboxRepository::new(
        fixture.database(),
        Box::new(queries),
        RepositorySettings {
            batch_size: 50,
            max_push_attempts: 3,
        },
    ))
}

async fn run_cycle_with(repository: Arc<OutboxRepository>, publisher: Arc<ScriptedPublisher>) {
    let processor = BatchProcessor::new(publisher, repository.clone());
    let batch = repository.get_batch().await.expect("Failed to claim batch");
    processor.process_batch(batch).await;
}

#[tokio::test]
#[serial]
async fn test_failed_success_update_rolls_back_errored_updates() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 2).await;
    let publisher = ScriptedPublisher::failing([ids[0]]);

    run_cycle_with(failing_repository(&fixture, true, false), publisher).await;

    for id in ids {
        let row = fixture.row(id).await;
        assert_eq!(row.push_attempts, 0, "row {} kept an update", id);
        assert!(!row.completed);
        assert!(!row.errored);
        assert_eq!(row.error_reason, None);
    }
}

#[tokio::test]
#[serial]
async fn test_failed_errored_update_still_commits_successes() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 2).await;
    let publisher = ScriptedPublisher::failing([ids[0]]);

    run_cycle_with(failing_repository(&fixture, false, true), publisher).await;

    let failed = fixture.row(ids[0]).await;
    assert_eq!(failed.push_attempts, 0);
    assert!(!failed.completed);
    assert_eq!(failed.error_reason, None);

    let delivered = fixture.row(ids[1]).await;
    assert_eq!(delivered.push_attempts, 1);
    assert!(delivered.completed);
}

#[tokio::test]
#[serial]
async fn test_successful_cycle_completes_every_row() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 2).await;
    let publisher = ScriptedPublisher::failing([]);

    run_cycle(&fixture, publisher.clone(), 3).await;

    assert_eq!(publisher.attempts(), ids);
    for id in ids {
        let row = fixture.row(id).await;
        assert!(row.completed);
        assert_eq!(row.push_attempts, 1);
        assert!(!row.errored);
        assert_eq!(row.error_reason, None);
    }
    assert_eq!(fixture.repository(50, 3).queue_size().await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_failed_rows_are_released_for_retry() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 3).await;
    let publisher = ScriptedPublisher::failing([ids[0], ids[2]]);

    run_cycle(&fixture, publisher, 3).await;

    for id in [ids[0], ids[2]] {
        let row = fixture.row(id).await;
        assert!(row
            .error_reason
            .as_deref()
            .unwrap()
            .contains(&format!("broker rejected message {}", id)));
        assert!(!row.completed);
        assert!(!row.claimed);
        assert!(!row.started);
        assert!(!row.errored);
        assert_eq!(row.push_attempts, 1);
    }
    let delivered = fixture.row(ids[1]).await;
    assert!(delivered.completed);
    assert_eq!(delivered.error_reason, None);

    // Released rows are claimable again straight away.
    let retry = fixture.repository(50, 3).get_batch().await.unwrap();
    let retried: Vec<i64> = retry.messages.iter().map(|m| m.id).collect();
    assert_eq!(retried, vec![ids[0], ids[2]]);
}

#[tokio::test]
#[serial]
async fn test_last_allowed_attempt_marks_row_errored() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 1).await;
    fixture.set_push_attempts(ids[0], 2).await;
    let publisher = ScriptedPublisher::failing([ids[0]]);

    run_cycle(&fixture, publisher, 3).await;

    let row = fixture.row(ids[0]).await;
    assert!(row.errored);
    assert_eq!(row.push_attempts, 3);
    assert!(row.error_reason.is_some());
    assert!(fixture
        .repository(50, 3)
        .get_batch()
        .await
        .unwrap_err()
        .is_no_events());
}

#[tokio::test]
#[serial]
async fn test_attempts_count_every_disposition() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 1).await;
    let publisher = ScriptedPublisher::failing([ids[0]]);

    run_cycle(&fixture, publisher.clone(), 5).await;
    run_cycle(&fixture, publisher.clone(), 5).await;
    let row = fixture.row(ids[0]).await;
    assert_eq!(row.push_attempts, 2);
    assert!(!row.errored);

    publisher.succeed_from_now_on();
    run_cycle(&fixture, publisher.clone(), 5).await;

    let row = fixture.row(ids[0]).await;
    assert_eq!(row.push_attempts, 3);
    assert!(row.completed);
    assert!(!row.errored);
    assert_eq!(row.error_reason, None);
    assert_eq!(publisher.attempts(), vec![ids[0]; 3]);
}

#[tokio::test]
#[serial]
async fn test_row_without_topic_fails_locally() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let id = fixture.insert("", "{}").await;
    let publisher = ScriptedPublisher::failing([]);

    run_cycle(&fixture, publisher.clone(), 3).await;

    assert!(publisher.attempts().is_empty());
    let row = fixture.row(id).await;
    assert_eq!(row.error_reason.as_deref(), Some(NO_TOPIC_REASON));
    assert_eq!(row.push_attempts, 1);
}

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


//! Claim behaviour of `OutboxRepository::get_batch`.

use std::collections::HashSet;
use std::sync::Arc;

use outbox_relay::BatchSource;
use serial_test::serial;
use tokio::sync::Barrier;

use crate::fixtures::get_fixture;

#[tokio::test]
#[serial]
async fn test_claim_returns_rows_in_id_order_under_one_batch() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 3).await;
    let repository = fixture.repository(10, 3);

    let batch = repository.get_batch().await.expect("Failed to claim batch");

    let claimed: Vec<i64> = batch.messages.iter().map(|m| m.id).collect();
    assert_eq!(claimed, ids);
    assert!(batch
        .messages
        .iter()
        .all(|m| m.batch_id == Some(batch.id) && m.push_started_at.is_some()));
    assert_eq!(batch.messages[0].payload, b"{\"n\":0}".to_vec());

    for row in fixture.rows().await {
        assert!(row.claimed && row.started && !row.completed);
        assert_eq!(row.push_attempts, 0);
    }
}

#[tokio::test]
#[serial]
async fn test_batch_size_limits_claim() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 5).await;
    let repository = fixture.repository(2, 3);

    let first = repository.get_batch().await.unwrap();
    let second = repository.get_batch().await.unwrap();
    let third = repository.get_batch().await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(third.len(), 1);
    assert_eq!(third.messages[0].id, ids[4]);
    assert!(repository.get_batch().await.unwrap_err().is_no_events());
}

#[tokio::test]
#[serial]
async fn test_empty_outbox_reports_no_events() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let repository = fixture.repository(10, 3);

    let err = repository.get_batch().await.unwrap_err();
    assert!(err.is_no_events(), "unexpected error: {}", err);
}

#[tokio::test]
#[serial]
async fn test_concurrent_claims_are_disjoint() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    const NUM_ROWS: usize = 60;
    const NUM_CLAIMERS: usize = 8;
    fixture.insert_many("product", NUM_ROWS).await;

    let barrier = Arc::new(Barrier::new(NUM_CLAIMERS));
    let mut handles = Vec::new();
    for _ in 0..NUM_CLAIMERS {
        let repository = fixture.repository(4, 3);
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            let mut claimed = Vec::new();
            loop {
                match repository.get_batch().await {
                    Ok(batch) => claimed.extend(batch.messages.iter().map(|m| m.id)),
                    Err(e) if e.is_no_events() => break,
                    Err(e) => tracing::debug!(error = %e, "claim failed under contention"),
                }
            }
            claimed
        }));
    }

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for id in handle.await.unwrap() {
            total += 1;
            assert!(seen.insert(id), "row {} was claimed by two batches", id);
        }
    }
    assert_eq!(total, NUM_ROWS);
}

#[tokio::test]
#[serial]
async fn test_stale_claim_is_reclaimed() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 2).await;
    let repository = fixture.repository(10, 3);

    let first = repository.get_batch().await.unwrap();
    assert_eq!(first.len(), 2);

    // A fresh claim is still owned by its batch.
    fixture.abandon_claim(ids[0], 5).await;
    assert!(repository.get_batch().await.unwrap_err().is_no_events());

    fixture.abandon_claim(ids[0], 20).await;
    let reclaimed = repository.get_batch().await.unwrap();
    assert_eq!(reclaimed.messages.len(), 1);
    assert_eq!(reclaimed.messages[0].id, ids[0]);
    assert_ne!(reclaimed.id, first.id);
}

#[tokio::test]
#[serial]
async fn test_errored_rows_are_never_claimed() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 2).await;
    fixture.mark_errored(ids[0]).await;
    fixture.mark_errored(ids[1]).await;
    fixture.abandon_claim(ids[1], 60).await;
    let repository = fixture.repository(10, 3);

    assert!(repository.get_batch().await.unwrap_err().is_no_events());
}

#[tokio::test]
#[serial]
async fn test_missing_headers_default_to_empty_object() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let id = fixture.insert_without_headers("product").await;

    let batch = fixture
        .repository(10, 3)
        .get_batch()
        .await
        .expect("Failed to claim batch");

    assert_eq!(batch.messages[0].id, id);
    assert_eq!(batch.messages[0].headers, b"{}".to_vec());
}

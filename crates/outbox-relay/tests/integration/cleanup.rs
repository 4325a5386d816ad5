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


//! Deletion of published rows and the size counters.

use std::time::Duration;

use outbox_relay::jobs::{run_cleanup, DEFAULT_CLEANUP_AGE};
use outbox_relay::{Pinger, Sizer};
use serial_test::serial;

use crate::fixtures::get_fixture;

#[tokio::test]
#[serial]
async fn test_cleanup_removes_only_old_published_rows() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let ids = fixture.insert_many("product", 4).await;
    fixture.mark_published(ids[0], 120).await;
    fixture.mark_published(ids[1], 90).await;
    fixture.mark_published(ids[2], 5).await;
    let repository = fixture.repository(10, 3);

    let deleted = run_cleanup(&repository, DEFAULT_CLEANUP_AGE).await.unwrap();

    assert_eq!(deleted, 2);
    let remaining: Vec<i64> = fixture.rows().await.iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec![ids[2], ids[3]]);
    assert_eq!(repository.total_size().await.unwrap(), 2);
    assert_eq!(repository.queue_size().await.unwrap(), 1);
}

#[tokio::test]
#[serial]
async fn test_cleanup_with_nothing_to_delete() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    fixture.insert_many("product", 2).await;
    let repository = fixture.repository(10, 3);

    let deleted = run_cleanup(&repository, Duration::from_secs(60)).await.unwrap();

    assert_eq!(deleted, 0);
    assert_eq!(repository.total_size().await.unwrap(), 2);
}

#[tokio::test]
#[serial]
async fn test_ping_and_optimize() {
    let Some(fixture) = get_fixture().await else {
        return;
    };
    let repository = fixture.repository(10, 3);

    repository.ping().await.expect("ping should succeed");
    outbox_relay::jobs::run_optimize(&repository)
        .await
        .expect("optimize should succeed");
}

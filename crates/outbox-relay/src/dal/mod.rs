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

//! Data access layer for the outbox table.
//!
//! The relay pipeline and the surrounding jobs only see the narrow traits
//! declared here. [`OutboxRepository`] implements all of them against a live
//! database; tests substitute in-memory doubles.

pub mod outbox;
pub mod query_provider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::RepositoryError;
use crate::models::Batch;

pub use outbox::{OutboxRepository, RepositorySettings, STALE_CLAIM_AFTER};
pub use query_provider::{
    query_provider_for, MysqlQueryProvider, PostgresQueryProvider, QueryProvider,
    DEFAULT_OUTBOX_TABLE, OUTBOX_COLUMNS,
};

/// Hands out exclusively claimed batches.
#[async_trait]
pub trait BatchSource: Send + Sync {
    /// Claims and returns the next batch.
    ///
    /// Returns [`RepositoryError::NoEvents`] when nothing is claimable.
    async fn get_batch(&self) -> Result<Batch, RepositoryError>;
}

/// Persists the outcome of a publish cycle.
#[async_trait]
pub trait BatchCommitter: Send + Sync {
    /// Records every message's disposition. Failures are logged, not returned.
    async fn commit_batch(&self, batch: &Batch);
}

/// Row counts for the size gauges.
#[async_trait]
pub trait Sizer: Send + Sync {
    /// Rows not yet published.
    async fn queue_size(&self) -> Result<u64, RepositoryError>;

    /// All rows in the table.
    async fn total_size(&self) -> Result<u64, RepositoryError>;
}

/// Storage liveness check used by the health endpoint.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Removes rows that were published before a cut-off.
#[async_trait]
pub trait PublishedDeleter: Send + Sync {
    async fn delete_published(&self, older_than: DateTime<Utc>) -> Result<u64, RepositoryError>;
}

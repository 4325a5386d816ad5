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

//! Outbox repository: the claim/commit engine.
//!
//! # Claiming
//!
//! A batch is claimed with one atomic `UPDATE` that stamps a fresh batch id
//! on up to `batch_size` claimable rows, followed by a `SELECT` of the rows
//! carrying that id. A row is claimable when it was never attempted, or when
//! its claim is older than [`STALE_CLAIM_AFTER`] without completing. Errored
//! rows are never claimable. The `UPDATE` is the only mutual-exclusion
//! primitive: any number of relays may poll the same table.
//!
//! # Committing
//!
//! Each batch is committed in one transaction. Failed messages get the error
//! update one by one; a failure there is logged and the remaining rows are
//! still processed. Successful messages get one bulk update; if that fails,
//! the whole transaction is rolled back.

mod claiming;
mod commit;
pub(crate) mod rows;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::RunQueryDsl;
use tracing::info;

use super::{
    query_provider_for, BatchCommitter, BatchSource, Pinger, PublishedDeleter, QueryProvider,
    Sizer, OUTBOX_COLUMNS,
};
use crate::database::Database;
use crate::error::RepositoryError;
use crate::models::Batch;
use rows::CountRow;

/// Age after which an uncompleted claim may be taken over by another batch.
pub const STALE_CLAIM_AFTER: Duration = Duration::from_secs(10 * 60);

/// Tunables of the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositorySettings {
    /// Upper bound of rows claimed per batch.
    pub batch_size: usize,
    /// Failed attempts after which a row is marked errored for good.
    pub max_push_attempts: u32,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            batch_size: 250,
            max_push_attempts: 3,
        }
    }
}

/// Repository over one outbox table.
#[derive(Clone, Debug)]
pub struct OutboxRepository {
    database: Database,
    queries: Arc<dyn QueryProvider>,
    settings: RepositorySettings,
}

impl OutboxRepository {
    pub fn new(
        database: Database,
        queries: Box<dyn QueryProvider>,
        settings: RepositorySettings,
    ) -> Self {
        Self {
            database,
            queries: Arc::from(queries),
            settings,
        }
    }

    /// Repository for `table` using the query provider of the database's backend.
    pub fn for_table(database: Database, table: &str, settings: RepositorySettings) -> Self {
        let queries = query_provider_for(database.backend(), table, OUTBOX_COLUMNS);
        Self::new(database, queries, settings)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn settings(&self) -> RepositorySettings {
        self.settings
    }

    pub fn table(&self) -> &str {
        self.queries.table()
    }

    /// Deletes rows published at or before `older_than`.
    pub async fn delete_published_before(
        &self,
        older_than: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let sql = self.queries.delete_published_messages_sql();

        let deleted = crate::dispatch_backend!(
            self.database.backend(),
            {
                let conn = self.database.get_postgres_connection().await?;
                conn.interact(move |conn| {
                    diesel::sql_query(sql)
                        .bind::<diesel::sql_types::Timestamptz, _>(older_than)
                        .execute(conn)
                })
                .await
                .map_err(|e| RepositoryError::Connection(e.to_string()))?
                .map_err(RepositoryError::from)
            },
            {
                let conn = self.database.get_mysql_connection().await?;
                conn.interact(move |conn| {
                    diesel::sql_query(sql)
                        .bind::<diesel::sql_types::Datetime, _>(older_than.naive_utc())
                        .execute(conn)
                })
                .await
                .map_err(|e| RepositoryError::Connection(e.to_string()))?
                .map_err(RepositoryError::from)
            }
        )?;

        Ok(deleted as u64)
    }

    /// Runs the backend's table maintenance statement.
    pub async fn optimize_table(&self) -> Result<(), RepositoryError> {
        let sql = self.queries.optimize_table_sql();
        info!(table = %self.table(), statement = %sql, "optimizing outbox table");

        crate::dispatch_backend!(
            self.database.backend(),
            {
                let conn = self.database.get_postgres_connection().await?;
                conn.interact(move |conn| diesel::sql_query(sql).execute(conn))
                    .await
                    .map_err(|e| RepositoryError::Connection(e.to_string()))??;
                Ok(())
            },
            {
                // OPTIMIZE TABLE returns a result set, so it is loaded rather than executed.
                let conn = self.database.get_mysql_connection().await?;
                let report = conn
                    .interact(move |conn| diesel::sql_query(sql).load::<rows::OptimizeRow>(conn))
                    .await
                    .map_err(|e| RepositoryError::Connection(e.to_string()))??;
                for line in report {
                    info!(msg_type = %line.msg_type, "{}", line.msg_text);
                }
                Ok(())
            }
        )
    }

    async fn count(&self, sql: String) -> Result<u64, RepositoryError> {
        let row: CountRow = crate::dispatch_backend!(
            self.database.backend(),
            {
                let conn = self.database.get_postgres_connection().await?;
                conn.interact(move |conn| diesel::sql_query(sql).get_result::<CountRow>(conn))
                    .await
                    .map_err(|e| RepositoryError::Connection(e.to_string()))?
                    .map_err(RepositoryError::from)
            },
            {
                let conn = self.database.get_mysql_connection().await?;
                conn.interact(move |conn| diesel::sql_query(sql).get_result::<CountRow>(conn))
                    .await
                    .map_err(|e| RepositoryError::Connection(e.to_string()))?
                    .map_err(RepositoryError::from)
            }
        )?;

        Ok(row.count.max(0) as u64)
    }

    /// Cut-off before which an uncompleted claim counts as abandoned.
    pub(crate) fn stale_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::seconds(STALE_CLAIM_AFTER.as_secs() as i64)
    }
}

#[async_trait]
impl BatchSource for OutboxRepository {
    async fn get_batch(&self) -> Result<Batch, RepositoryError> {
        self.claim_batch().await
    }
}

#[async_trait]
impl BatchCommitter for OutboxRepository {
    async fn commit_batch(&self, batch: &Batch) {
        self.commit(batch).await
    }
}

#[async_trait]
impl Sizer for OutboxRepository {
    async fn queue_size(&self) -> Result<u64, RepositoryError> {
        self.count(self.queries.queue_size_sql()).await
    }

    async fn total_size(&self) -> Result<u64, RepositoryError> {
        self.count(self.queries.total_size_sql()).await
    }
}

#[async_trait]
impl Pinger for OutboxRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        self.database.ping().await
    }
}

#[async_trait]
impl PublishedDeleter for OutboxRepository {
    async fn delete_published(&self, older_than: DateTime<Utc>) -> Result<u64, RepositoryError> {
        self.delete_published_before(older_than).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stale_cutoff_is_ten_minutes_back() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let cutoff = OutboxRepository::stale_cutoff(now);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 5, 1, 11, 50, 0).unwrap());
    }

    #[test]
    fn test_default_settings() {
        let settings = RepositorySettings::default();
        assert_eq!(settings.batch_size, 250);
        assert_eq!(settings.max_push_attempts, 3);
    }

    #[cfg(feature = "postgres")]
    #[tokio::test]
    async fn test_repository_uses_backend_query_provider() {
        let database = Database::new("postgres://relay@localhost:5432/outbox", 1).unwrap();
        let repo = OutboxRepository::for_table(database, "orders_outbox", RepositorySettings::default());
        assert_eq!(repo.table(), "orders_outbox");
        assert_eq!(
            repo.queries.backend(),
            crate::database::BackendType::Postgres
        );
    }
}

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

//! Batch claiming.
//!
//! Both backends run the same two round trips: the claim `UPDATE`, which
//! reports how many rows were stamped, then the fetch of the stamped rows.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use tracing::debug;
use uuid::Uuid;

use super::OutboxRepository;
use crate::error::RepositoryError;
use crate::models::{Batch, Message};

impl OutboxRepository {
    /// Claims the next batch, or returns [`RepositoryError::NoEvents`].
    pub(super) async fn claim_batch(&self) -> Result<Batch, RepositoryError> {
        let batch_id = Uuid::new_v4();
        let stale_cutoff = Self::stale_cutoff(Utc::now());
        let claim_sql = self.queries.batch_creation_sql(self.settings.batch_size);
        let fetch_sql = self.queries.batch_fetch_sql();

        let messages = crate::dispatch_backend!(
            self.database.backend(),
            {
                self.claim_postgres(batch_id, stale_cutoff, claim_sql, fetch_sql)
                    .await
            },
            {
                self.claim_mysql(batch_id, stale_cutoff, claim_sql, fetch_sql)
                    .await
            }
        )?;

        debug!(
            batch_id = %batch_id,
            num_messages = messages.len(),
            "claimed outbox batch"
        );

        Ok(Batch::new(batch_id, messages))
    }

    #[cfg(feature = "postgres")]
    async fn claim_postgres(
        &self,
        batch_id: Uuid,
        stale_cutoff: DateTime<Utc>,
        claim_sql: String,
        fetch_sql: String,
    ) -> Result<Vec<Message>, RepositoryError> {
        use super::rows::PgOutboxRow;
        use diesel::sql_types::{Bool, Timestamptz, Uuid as SqlUuid};

        let conn = self.database.get_postgres_connection().await?;

        let claimed = conn
            .interact(move |conn| {
                diesel::sql_query(claim_sql)
                    .bind::<SqlUuid, _>(batch_id)
                    .bind::<Timestamptz, _>(stale_cutoff)
                    .bind::<Bool, _>(false)
                    .execute(conn)
            })
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?
            .map_err(|e| RepositoryError::Claim(e.to_string()))?;

        if claimed == 0 {
            return Err(RepositoryError::NoEvents);
        }

        let rows = conn
            .interact(move |conn| {
                diesel::sql_query(fetch_sql)
                    .bind::<SqlUuid, _>(batch_id)
                    .load::<PgOutboxRow>(conn)
            })
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?
            .map_err(|e| RepositoryError::Fetch(e.to_string()))?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    #[cfg(feature = "mysql")]
    async fn claim_mysql(
        &self,
        batch_id: Uuid,
        stale_cutoff: DateTime<Utc>,
        claim_sql: String,
        fetch_sql: String,
    ) -> Result<Vec<Message>, RepositoryError> {
        use super::rows::MysqlOutboxRow;
        use diesel::sql_types::{Bool, Datetime, Text};

        let conn = self.database.get_mysql_connection().await?;
        let token = batch_id.to_string();
        let fetch_token = token.clone();

        let claimed = conn
            .interact(move |conn| {
                diesel::sql_query(claim_sql)
                    .bind::<Text, _>(token)
                    .bind::<Datetime, _>(stale_cutoff.naive_utc())
                    .bind::<Bool, _>(false)
                    .execute(conn)
            })
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?
            .map_err(|e| RepositoryError::Claim(e.to_string()))?;

        if claimed == 0 {
            return Err(RepositoryError::NoEvents);
        }

        let rows = conn
            .interact(move |conn| {
                diesel::sql_query(fetch_sql)
                    .bind::<Text, _>(fetch_token)
                    .load::<MysqlOutboxRow>(conn)
            })
            .await
            .map_err(|e| RepositoryError::Connection(e.to_string()))?
            .map_err(|e| RepositoryError::Fetch(e.to_string()))?;

        Ok(rows.into_iter().map(Message::from).collect())
    }
}

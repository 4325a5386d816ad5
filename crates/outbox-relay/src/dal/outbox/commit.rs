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

//! Batch commit.
//!
//! Every errored-row update runs inside its own savepoint. A failing row is
//! rolled back to that savepoint and logged, which keeps the enclosing
//! transaction usable on PostgreSQL, where any failed statement would
//! otherwise poison the rest of the transaction.

use tracing::{debug, error, warn};
use uuid::Uuid;

use super::OutboxRepository;
use crate::models::Batch;

/// Everything the blocking commit needs, detached from the batch.
#[derive(Debug)]
struct CommitPlan {
    batch_id: Uuid,
    errored: Vec<(i64, String)>,
    success_ids: Vec<i64>,
    errored_sql: String,
    success_sql: String,
}

impl CommitPlan {
    fn new(repo: &OutboxRepository, batch: &Batch) -> Self {
        let errored: Vec<(i64, String)> = batch
            .failed_messages()
            .map(|m| (m.id, m.error_reason.clone().unwrap_or_default()))
            .collect();
        let success_ids = batch.successful_ids();

        Self {
            batch_id: batch.id,
            errored,
            errored_sql: repo
                .queries
                .message_errored_update_sql(repo.settings.max_push_attempts),
            success_sql: repo.queries.messages_success_update_sql(success_ids.len()),
            success_ids,
        }
    }
}

#[derive(Debug)]
enum CommitOutcome {
    Committed { errored_failures: usize },
    BeginFailed(diesel::result::Error),
    RolledBack(diesel::result::Error),
    CommitFailed(diesel::result::Error),
}

impl CommitOutcome {
    fn from_transaction(
        result: Result<usize, diesel::result::Error>,
        began: bool,
        success_failed: bool,
    ) -> Self {
        match result {
            Ok(errored_failures) => CommitOutcome::Committed { errored_failures },
            Err(e) if !began => CommitOutcome::BeginFailed(e),
            Err(e) if success_failed => CommitOutcome::RolledBack(e),
            Err(e) => CommitOutcome::CommitFailed(e),
        }
    }
}

/// Runs the commit transaction on one backend connection.
///
/// Expands to the same body for every backend; only the boxed query's
/// backend type differs.
macro_rules! run_commit {
    ($conn:expr, $plan:expr, $backend:ty) => {{
        use diesel::connection::Connection;
        use diesel::sql_types::{BigInt, Text};
        use diesel::RunQueryDsl;

        let plan = $plan;
        let mut began = false;
        let mut success_failed = false;

        let result = $conn.transaction::<_, diesel::result::Error, _>(|conn| {
            began = true;

            let mut errored_failures = 0;
            for (id, reason) in &plan.errored {
                let update = conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    diesel::sql_query(plan.errored_sql.as_str())
                        .bind::<Text, _>(reason.clone())
                        .bind::<BigInt, _>(*id)
                        .execute(conn)
                });
                if let Err(e) = update {
                    errored_failures += 1;
                    error!(
                        batch_id = %plan.batch_id,
                        message_id = id,
                        error = %e,
                        "error occurred updating the errored outbox message"
                    );
                }
            }

            if !plan.success_ids.is_empty() {
                let mut query = diesel::sql_query(plan.success_sql.as_str()).into_boxed::<$backend>();
                for id in &plan.success_ids {
                    query = query.bind::<BigInt, _>(*id);
                }
                if let Err(e) = query.execute(conn) {
                    success_failed = true;
                    return Err(e);
                }
            }

            Ok(errored_failures)
        });

        CommitOutcome::from_transaction(result, began, success_failed)
    }};
}

impl OutboxRepository {
    /// Writes each message's disposition in one transaction.
    pub(super) async fn commit(&self, batch: &Batch) {
        debug!(
            batch_id = %batch.id,
            num_messages = batch.len(),
            "starting batch commit"
        );

        let plan = CommitPlan::new(self, batch);
        let batch_id = plan.batch_id;

        let outcome: Result<CommitOutcome, crate::error::RepositoryError> = crate::dispatch_backend!(
            self.database.backend(),
            {
                match self.database.get_postgres_connection().await {
                    Ok(conn) => conn
                        .interact(move |conn| run_commit!(conn, plan, diesel::pg::Pg))
                        .await
                        .map_err(|e| crate::error::RepositoryError::Connection(e.to_string())),
                    Err(e) => Err(e),
                }
            },
            {
                match self.database.get_mysql_connection().await {
                    Ok(conn) => conn
                        .interact(move |conn| run_commit!(conn, plan, diesel::mysql::Mysql))
                        .await
                        .map_err(|e| crate::error::RepositoryError::Connection(e.to_string())),
                    Err(e) => Err(e),
                }
            }
        );

        match outcome {
            Ok(CommitOutcome::Committed { errored_failures }) => {
                if errored_failures > 0 {
                    warn!(
                        batch_id = %batch_id,
                        errored_failures,
                        "batch committed with errored-message updates skipped"
                    );
                } else {
                    debug!(batch_id = %batch_id, "batch committed");
                }
            }
            Ok(CommitOutcome::BeginFailed(e)) => {
                error!(
                    batch_id = %batch_id,
                    error = %e,
                    "error occurred starting a DB transaction to commit the batch"
                );
            }
            Ok(CommitOutcome::RolledBack(e)) => {
                error!(
                    batch_id = %batch_id,
                    error = %e,
                    "error occurred updating successful outbox messages, batch rolled back"
                );
            }
            Ok(CommitOutcome::CommitFailed(e)) => {
                error!(
                    batch_id = %batch_id,
                    error = %e,
                    "error occurred committing transaction for batch"
                );
            }
            Err(e) => {
                error!(
                    batch_id = %batch_id,
                    error = %e,
                    "could not obtain a connection to commit the batch"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_classification() {
        let err = || diesel::result::Error::NotFound;

        assert!(matches!(
            CommitOutcome::from_transaction(Ok(2), true, false),
            CommitOutcome::Committed { errored_failures: 2 }
        ));
        assert!(matches!(
            CommitOutcome::from_transaction(Err(err()), false, false),
            CommitOutcome::BeginFailed(_)
        ));
        assert!(matches!(
            CommitOutcome::from_transaction(Err(err()), true, true),
            CommitOutcome::RolledBack(_)
        ));
        assert!(matches!(
            CommitOutcome::from_transaction(Err(err()), true, false),
            CommitOutcome::CommitFailed(_)
        ));
    }
}

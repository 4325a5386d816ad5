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


//! Deletion of published outbox rows.

use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::dal::PublishedDeleter;
use crate::error::RepositoryError;

/// Age past which published rows are removed when no age is given.
pub const DEFAULT_CLEANUP_AGE: Duration = Duration::from_secs(60 * 60);

/// Deletes rows whose publish completed more than `older_than` ago.
///
/// Returns the number of rows deleted.
pub async fn run_cleanup(
    deleter: &dyn PublishedDeleter,
    older_than: Duration,
) -> Result<u64, RepositoryError> {
    let age = chrono::Duration::from_std(older_than)
        .map_err(|e| RepositoryError::Setup(format!("cleanup age out of range: {}", e)))?;
    let cutoff = Utc::now() - age;

    info!(%cutoff, "deleting published outbox messages");
    let deleted = deleter.delete_published(cutoff).await?;
    info!(deleted, %cutoff, "published outbox messages deleted");

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDeleter {
        cutoffs: Mutex<Vec<DateTime<Utc>>>,
    }

    #[async_trait]
    impl PublishedDeleter for RecordingDeleter {
        async fn delete_published(
            &self,
            older_than: DateTime<Utc>,
        ) -> Result<u64, RepositoryError> {
            self.cutoffs.lock().unwrap().push(older_than);
            Ok(12)
        }
    }

    struct FailingDeleter;

    #[async_trait]
    impl PublishedDeleter for FailingDeleter {
        async fn delete_published(&self, _: DateTime<Utc>) -> Result<u64, RepositoryError> {
            Err(RepositoryError::Connection("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn test_cleanup_uses_cutoff_relative_to_now() {
        let deleter = RecordingDeleter::default();
        let before = Utc::now();

        let deleted = run_cleanup(&deleter, DEFAULT_CLEANUP_AGE).await.unwrap();

        let after = Utc::now();
        assert_eq!(deleted, 12);
        let cutoffs = deleter.cutoffs.lock().unwrap();
        assert_eq!(cutoffs.len(), 1);
        assert!(cutoffs[0] >= before - chrono::Duration::hours(1));
        assert!(cutoffs[0] <= after - chrono::Duration::hours(1));
    }

    #[tokio::test]
    async fn test_cleanup_propagates_repository_errors() {
        let err = run_cleanup(&FailingDeleter, Duration::from_secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Connection(_)));
    }
}

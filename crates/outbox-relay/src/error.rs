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

//! Error types for the outbox relay.
//!
//! Storage failures, broker failures and configuration failures each have
//! their own enum so callers can tell a normal empty outbox apart from a
//! broken database connection, and a bad header payload apart from a broker
//! outage.

use thiserror::Error;

use crate::database::BackendType;

/// Errors raised by the outbox repository.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The claim statement matched no rows. This is the normal idle
    /// condition of an empty outbox, not a failure.
    #[error("no events in the batch")]
    NoEvents,

    /// The claim UPDATE failed.
    #[error("error creating a batch of events in repository: {0}")]
    Claim(String),

    /// Reading back the claimed rows failed.
    #[error("error fetching created event batch in repository: {0}")]
    Fetch(String),

    /// A connection could not be taken from the pool, or the pooled
    /// connection's worker thread failed.
    #[error("database connection error: {0}")]
    Connection(String),

    /// Any other statement failure (counts, deletes, maintenance).
    #[error("database query error: {0}")]
    Query(#[from] diesel::result::Error),

    /// The backend was selected at runtime but its support was not compiled in.
    #[error("database backend '{0}' is not enabled in this build")]
    BackendUnavailable(BackendType),

    /// The database could not be reached or set up.
    #[error("database setup error: {0}")]
    Setup(String),
}

impl RepositoryError {
    /// Whether this is the "no events" sentinel rather than a real failure.
    pub fn is_no_events(&self) -> bool {
        matches!(self, RepositoryError::NoEvents)
    }
}

/// Errors raised while publishing a message to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("error unmarshalling message headers for publishing to Kafka: {0}")]
    InvalidHeaders(#[source] serde_json::Error),

    #[error("error choosing a partition for topic '{topic}': {reason}")]
    Partition { topic: String, reason: String },

    #[error("error reading metadata for topic '{topic}': {reason}")]
    Metadata { topic: String, reason: String },

    #[error("error producing message in Kafka: {0}")]
    Send(String),

    #[error("could not start kafka producer: {0}")]
    Client(String),
}

/// Errors raised while validating relay configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the DB_DRIVER provided ({0}) is not supported")]
    UnsupportedDriver(String),

    #[error("at least one database name must be configured")]
    NoDatabases,

    #[error("at least one Kafka host must be configured when polling is enabled")]
    NoKafkaHosts,

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("invalid outbox table name: '{0}'")]
    InvalidTableName(String),

    #[error("could not build a connection URL for host '{host}': {reason}")]
    InvalidUrl { host: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_events_is_distinguishable() {
        assert!(RepositoryError::NoEvents.is_no_events());
        assert!(!RepositoryError::Claim("boom".into()).is_no_events());
        assert!(!RepositoryError::Fetch("boom".into()).is_no_events());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = RepositoryError::Claim("deadlock".into());
        assert_eq!(
            err.to_string(),
            "error creating a batch of events in repository: deadlock"
        );

        let err = PublishError::Send("broker down".into());
        assert!(err.to_string().contains("broker down"));
    }
}

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


//! # Outbox Relay
//!
//! Moves rows from a transactional outbox table into Kafka topics.
//!
//! Applications write messages into the outbox inside their own
//! transactions. The relay claims batches of unpublished rows, publishes
//! each message, and records per-message success or failure back in the
//! table. Failed messages are retried until they reach the configured
//! attempt limit, after which they are marked errored and left alone.
//!
//! ## Components
//!
//! - [`dal::OutboxRepository`]: claim and commit against Postgres or MySQL.
//! - [`relay::Poller`] and [`relay::BatchProcessor`]: the polling pipeline,
//!   assembled by [`relay::Relay`].
//! - [`kafka::KafkaPublisher`]: message to record translation, composite
//!   key partitioning, and the rdkafka transport (`kafka` feature).
//! - [`size_observer`]: queue and table size gauges.
//! - [`jobs`]: cleanup of published rows and table optimization.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use outbox_relay::{Database, KafkaPublisher, KafkaSender, OutboxRepository, Relay};
//!
//! let database = Database::connect(&config.databases[0].connection_url()?, 10).await?;
//! database.run_migrations().await?;
//! let repository = Arc::new(OutboxRepository::for_table(
//!     database,
//!     "kafka_outbox",
//!     config.repository_settings(),
//! ));
//! let publisher = Arc::new(KafkaPublisher::new(KafkaSender::new(&config.kafka)?));
//!
//! let relay = Relay::start(repository.clone(), repository, publisher, config.relay_settings());
//! // ...
//! relay.shutdown().await;
//! ```

pub mod config;
pub mod dal;
pub mod database;
pub mod error;
pub mod jobs;
pub mod kafka;
pub mod logging;
pub mod models;
pub mod relay;
pub mod size_observer;

pub use config::{DatabaseConfig, KafkaConfig, RelayConfig};
pub use dal::{
    BatchCommitter, BatchSource, OutboxRepository, Pinger, PublishedDeleter, RepositorySettings,
    Sizer,
};
pub use database::{BackendType, Database};
pub use error::{ConfigError, PublishError, RepositoryError};
#[cfg(feature = "kafka")]
pub use kafka::KafkaSender;
pub use kafka::{KafkaPublisher, Publisher, RecordSender};
pub use logging::init_logging;
pub use models::{Batch, Message};
pub use relay::{Relay, RelaySettings};
pub use size_observer::{observe_sizes, SizeGauges};

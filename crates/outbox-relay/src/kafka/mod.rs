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

//! Kafka publishing adapter.
//!
//! [`KafkaPublisher`] turns an outbox [`Message`](crate::models::Message)
//! into an [`OutboundRecord`] and hands it to a [`RecordSender`]. With the
//! `kafka` feature, [`KafkaSender`] is the rdkafka transport.

pub mod message_key;
pub mod partitioner;
#[cfg(feature = "kafka")]
pub mod producer;
pub mod publisher;
pub mod record;

pub use message_key::MessageKey;
pub use partitioner::{fnv1a_32, HashPartitioner, OutboxPartitioner, Partitioner};
#[cfg(feature = "kafka")]
pub use producer::KafkaSender;
pub use publisher::{record_headers, KafkaPublisher, Publisher, RecordSender};
pub use record::{OutboundRecord, RecordHeader, RecordKey};

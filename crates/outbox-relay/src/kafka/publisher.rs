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

//! Translation of outbox messages into broker records.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::value::RawValue;
use tracing::{debug, error};

use super::{MessageKey, OutboundRecord, RecordHeader, RecordKey};
use crate::error::PublishError;
use crate::models::Message;

/// Publishes single outbox messages.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Sends the message and waits for the broker's acknowledgement.
    async fn publish_message(&self, message: &Message) -> Result<(), PublishError>;

    /// Flushes anything still buffered. Called once on shutdown.
    async fn close(&self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// Transport that delivers a prepared record to the broker.
#[async_trait]
pub trait RecordSender: Send + Sync {
    /// Sends the record, returning the partition it was written to.
    async fn send(&self, record: OutboundRecord) -> Result<i32, PublishError>;

    async fn flush(&self) -> Result<(), PublishError> {
        Ok(())
    }
}

/// [`Publisher`] on top of any [`RecordSender`].
#[derive(Debug, Clone)]
pub struct KafkaPublisher<S> {
    sender: S,
}

impl<S: RecordSender> KafkaPublisher<S> {
    pub fn new(sender: S) -> Self {
        Self { sender }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }
}

#[async_trait]
impl<S: RecordSender> Publisher for KafkaPublisher<S> {
    async fn publish_message(&self, message: &Message) -> Result<(), PublishError> {
        let headers = record_headers(&message.headers).map_err(|e| {
            let err = PublishError::InvalidHeaders(e);
            error!(message_id = message.id, topic = %message.topic, error = %err, "dropping publish attempt");
            err
        })?;

        let key = if message.has_key() {
            Some(RecordKey::Message(MessageKey::new(
                message.key.clone().unwrap_or_default(),
                message.partition_key.clone().unwrap_or_default(),
            )))
        } else {
            None
        };

        let record = OutboundRecord {
            topic: message.topic.clone(),
            key,
            headers,
            value: message.payload.clone(),
        };

        match self.sender.send(record).await {
            Ok(partition) => {
                debug!(
                    message_id = message.id,
                    topic = %message.topic,
                    partition,
                    "produced message in Kafka"
                );
                Ok(())
            }
            Err(e) => {
                error!(message_id = message.id, topic = %message.topic, error = %e, "publish failed");
                Err(e)
            }
        }
    }

    async fn close(&self) -> Result<(), PublishError> {
        self.sender.flush().await
    }
}

/// Decodes a JSON object of header fields.
///
/// Empty input, `null` and `{}` yield no headers. String values are
/// unescaped; numbers keep their exact textual form; any other value becomes
/// a header without a value.
pub fn record_headers(raw: &[u8]) -> Result<Vec<RecordHeader>, serde_json::Error> {
    if raw.is_empty() || raw == b"{}" {
        return Ok(Vec::new());
    }

    let fields: Option<BTreeMap<String, Box<RawValue>>> = serde_json::from_slice(raw)?;

    fields
        .unwrap_or_default()
        .into_iter()
        .map(|(key, value)| -> Result<RecordHeader, serde_json::Error> {
            let text = value.get();
            let value = match text.as_bytes().first() {
                Some(b'"') => Some(serde_json::from_str::<String>(text)?.into_bytes()),
                Some(b'-' | b'0'..=b'9') => Some(text.as_bytes().to_vec()),
                _ => None,
            };
            Ok(RecordHeader::new(key, value))
        })
        .collect()
}

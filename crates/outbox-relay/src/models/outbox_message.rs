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

//! Outbox Message Model
//!
//! Domain structures for rows of the outbox table and the batches they are
//! claimed in. A batch only lives for one poll, publish and commit cycle; its
//! identifier is also written to every claimed row's `batch_id` column,
//! where it acts as the claim token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single outbox row.
///
/// `error_reason` is in-memory disposition state: it starts empty when the
/// row is claimed and is filled in by the batch processor when publishing
/// fails. The repository decides between the success and the error update
/// based on it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Storage-assigned identifier, immutable after creation.
    pub id: i64,
    /// Claim token of the batch currently owning this row.
    pub batch_id: Option<Uuid>,
    pub push_started_at: Option<DateTime<Utc>>,
    /// Only ever set by a successful publish.
    pub push_completed_at: Option<DateTime<Utc>>,
    pub topic: String,
    /// Opaque JSON payload, sent as the record value.
    pub payload: Vec<u8>,
    /// JSON object of header fields, or empty.
    pub headers: Vec<u8>,
    pub push_attempts: i32,
    pub errored: bool,
    pub error_reason: Option<String>,
    pub key: Option<String>,
    pub partition_key: Option<String>,
}

impl Message {
    /// Whether this message carries a record key. An empty key counts as no key.
    pub fn has_key(&self) -> bool {
        self.key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Records a failed publish attempt on this message.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.error_reason = Some(reason.into());
    }

    pub fn is_failed(&self) -> bool {
        self.error_reason.is_some()
    }
}

/// A group of messages claimed together under one batch identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    /// Messages in claim (id) order.
    pub messages: Vec<Message>,
}

impl Batch {
    pub fn new(id: Uuid, messages: Vec<Message>) -> Self {
        Self { id, messages }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Ids of the messages that have no recorded failure.
    pub fn successful_ids(&self) -> Vec<i64> {
        self.messages
            .iter()
            .filter(|m| !m.is_failed())
            .map(|m| m.id)
            .collect()
    }

    /// Messages that carry a failure reason.
    pub fn failed_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_failed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: i64) -> Message {
        Message {
            id,
            topic: "product".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_key_is_no_key() {
        let mut msg = message(1);
        assert!(!msg.has_key());

        msg.key = Some(String::new());
        assert!(!msg.has_key());

        msg.key = Some("sku-1".to_string());
        assert!(msg.has_key());
    }

    #[test]
    fn test_batch_splits_successes_and_failures() {
        let mut second = message(2);
        second.fail("broker unavailable");
        let batch = Batch::new(Uuid::new_v4(), vec![message(1), second, message(3)]);

        assert_eq!(batch.successful_ids(), vec![1, 3]);
        let failed: Vec<i64> = batch.failed_messages().map(|m| m.id).collect();
        assert_eq!(failed, vec![2]);
        assert_eq!(batch.len(), 3);
    }
}

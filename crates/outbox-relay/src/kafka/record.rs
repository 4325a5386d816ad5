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

//! Broker-neutral record produced from an outbox message.

use super::MessageKey;

/// Record key as seen by partitioners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    /// Composite key built from an outbox row.
    Message(MessageKey),
    /// Plain key bytes.
    Raw(Vec<u8>),
}

impl RecordKey {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RecordKey::Message(mk) => mk.as_bytes(),
            RecordKey::Raw(bytes) => bytes,
        }
    }
}

/// A single record header. A `None` value is sent as a null header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    pub key: String,
    pub value: Option<Vec<u8>>,
}

impl RecordHeader {
    pub fn new(key: impl Into<String>, value: Option<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Everything the transport needs to produce one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: Option<RecordKey>,
    pub headers: Vec<RecordHeader>,
    pub value: Vec<u8>,
}

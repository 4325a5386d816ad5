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

/// Composite record key.
///
/// `key` is what the broker stores on the record and uses for log
/// compaction. `partition_key` only steers partition selection; when it is
/// empty, `key` is used for that too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MessageKey {
    pub key: String,
    pub partition_key: String,
}

impl MessageKey {
    pub fn new(key: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            partition_key: partition_key.into(),
        }
    }

    /// The value hashed to pick a partition.
    pub fn key_for_partitioning(&self) -> &str {
        if self.partition_key.is_empty() {
            &self.key
        } else {
            &self.partition_key
        }
    }

    /// Wire encoding of the record key: the literal `key`.
    pub fn as_bytes(&self) -> &[u8] {
        self.key.as_bytes()
    }
}

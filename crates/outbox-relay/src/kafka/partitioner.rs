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

//! Partition selection.
//!
//! [`HashPartitioner`] reproduces the classic FNV-1a hash-mod-n assignment,
//! so relays written against other client libraries that share a topic put
//! the same key on the same partition. [`OutboxPartitioner`] feeds it the
//! partition key of composite outbox keys.

use rand::Rng;

use super::{OutboundRecord, RecordKey};
use crate::error::PublishError;

/// Chooses the partition a record is written to.
pub trait Partitioner: Send + Sync {
    /// Returns a partition in `0..num_partitions`.
    ///
    /// The record is borrowed mutably so wrapping partitioners can adjust
    /// the key while delegating; it must be left as it was received.
    fn partition(
        &self,
        record: &mut OutboundRecord,
        num_partitions: i32,
    ) -> Result<i32, PublishError>;

    /// Whether the returned partition must be used even if it is currently
    /// unavailable.
    fn requires_consistency(&self) -> bool;
}

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Hashes the key bytes; records without a key go to a random partition.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashPartitioner;

impl Partitioner for HashPartitioner {
    fn partition(
        &self,
        record: &mut OutboundRecord,
        num_partitions: i32,
    ) -> Result<i32, PublishError> {
        if num_partitions <= 0 {
            return Err(PublishError::Partition {
                topic: record.topic.clone(),
                reason: format!("topic reports {} partitions", num_partitions),
            });
        }

        let Some(key) = record.key.as_ref() else {
            return Ok(rand::thread_rng().gen_range(0..num_partitions));
        };

        let partition = (fnv1a_32(key.as_bytes()) as i32) % num_partitions;
        Ok(if partition < 0 { -partition } else { partition })
    }

    fn requires_consistency(&self) -> bool {
        true
    }
}

/// Resolves composite keys to their partition key before hashing.
#[derive(Debug, Clone, Default)]
pub struct OutboxPartitioner<P = HashPartitioner> {
    inner: P,
}

impl OutboxPartitioner<HashPartitioner> {
    pub fn new() -> Self {
        Self {
            inner: HashPartitioner,
        }
    }
}

impl<P: Partitioner> OutboxPartitioner<P> {
    pub fn with_inner(inner: P) -> Self {
        Self { inner }
    }
}

impl<P: Partitioner> Partitioner for OutboxPartitioner<P> {
    fn partition(
        &self,
        record: &mut OutboundRecord,
        num_partitions: i32,
    ) -> Result<i32, PublishError> {
        let resolved = match record.key.as_ref() {
            Some(RecordKey::Message(mk)) => mk.key_for_partitioning().as_bytes().to_vec(),
            _ => return self.inner.partition(record, num_partitions),
        };

        let original = record.key.replace(RecordKey::Raw(resolved));
        let result = self.inner.partition(record, num_partitions);
        record.key = original;
        result
    }

    fn requires_consistency(&self) -> bool {
        true
    }
}

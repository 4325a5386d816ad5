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

//! rdkafka-backed [`RecordSender`].
//!
//! The partition of every record is computed here with
//! [`OutboxPartitioner`] rather than by librdkafka, so that composite keys
//! are partitioned by their partition key. Partition counts come from
//! cluster metadata and are cached per topic until a send fails.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, info, warn};

use super::{OutboundRecord, OutboxPartitioner, Partitioner, RecordSender};
use crate::config::KafkaConfig;
use crate::error::PublishError;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
const FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

/// Produces records through an rdkafka [`FutureProducer`].
pub struct KafkaSender {
    producer: FutureProducer,
    partitioner: Box<dyn Partitioner>,
    partition_counts: RwLock<HashMap<String, i32>>,
}

impl std::fmt::Debug for KafkaSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSender")
            .field("cached_topics", &self.partition_counts.read().len())
            .finish()
    }
}

impl KafkaSender {
    pub fn new(config: &KafkaConfig) -> Result<Self, PublishError> {
        let producer: FutureProducer = client_config(config)
            .create()
            .map_err(|e| PublishError::Client(e.to_string()))?;

        info!(brokers = %config.hosts.join(","), tls = config.tls_enable, "kafka producer created");

        Ok(Self {
            producer,
            partitioner: Box::new(OutboxPartitioner::new()),
            partition_counts: RwLock::new(HashMap::new()),
        })
    }

    async fn partition_count(&self, topic: &str) -> Result<i32, PublishError> {
        if let Some(count) = self.partition_counts.read().get(topic) {
            return Ok(*count);
        }

        let producer = self.producer.clone();
        let topic_name = topic.to_string();
        let count = tokio::task::spawn_blocking(move || -> Result<i32, String> {
            let metadata = producer
                .client()
                .fetch_metadata(Some(&topic_name), Timeout::After(METADATA_TIMEOUT))
                .map_err(|e| e.to_string())?;
            let topic_metadata = metadata
                .topics()
                .iter()
                .find(|t| t.name() == topic_name)
                .ok_or_else(|| "topic missing from metadata".to_string())?;
            if let Some(err) = topic_metadata.error() {
                return Err(format!("{:?}", err));
            }
            Ok(topic_metadata.partitions().len() as i32)
        })
        .await
        .map_err(|e| PublishError::Metadata {
            topic: topic.to_string(),
            reason: e.to_string(),
        })?
        .map_err(|reason| PublishError::Metadata {
            topic: topic.to_string(),
            reason,
        })?;

        debug!(topic, partitions = count, "fetched topic metadata");
        self.partition_counts.write().insert(topic.to_string(), count);
        Ok(count)
    }
}

fn client_config(config: &KafkaConfig) -> ClientConfig {
    let client_id = std::env::var("HOSTNAME").unwrap_or_else(|_| "outbox-relay".to_string());

    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", config.hosts.join(","))
        .set("client.id", client_id)
        .set("compression.type", "gzip")
        .set("acks", "all")
        .set("retry.backoff.ms", "2000")
        .set("message.timeout.ms", SEND_TIMEOUT.as_millis().to_string());

    if config.tls_enable {
        client.set("security.protocol", "ssl");
        if config.tls_skip_verify_peer {
            client.set("enable.ssl.certificate.verification", "false");
        }
    }

    client
}

#[async_trait]
impl RecordSender for KafkaSender {
    async fn send(&self, mut record: OutboundRecord) -> Result<i32, PublishError> {
        let num_partitions = self.partition_count(&record.topic).await?;
        let partition = self.partitioner.partition(&mut record, num_partitions)?;

        let headers = record
            .headers
            .iter()
            .fold(OwnedHeaders::new(), |headers, header| {
                headers.insert(Header {
                    key: &header.key,
                    value: header.value.as_deref(),
                })
            });

        let key = record.key.as_ref().map(|k| k.as_bytes().to_vec());
        let mut future_record: FutureRecord<'_, [u8], [u8]> = FutureRecord::to(&record.topic)
            .payload(record.value.as_slice())
            .partition(partition)
            .headers(headers);
        if let Some(key) = key.as_deref() {
            future_record = future_record.key(key);
        }

        match self
            .producer
            .send(future_record, Timeout::After(SEND_TIMEOUT))
            .await
        {
            Ok(_) => Ok(partition),
            Err((e, _)) => {
                warn!(topic = %record.topic, error = %e, "send failed, dropping cached partition count");
                self.partition_counts.write().remove(&record.topic);
                Err(PublishError::Send(e.to_string()))
            }
        }
    }

    async fn flush(&self) -> Result<(), PublishError> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(FLUSH_TIMEOUT)))
            .await
            .map_err(|e| PublishError::Client(e.to_string()))?
            .map_err(|e| PublishError::Client(e.to_string()))
    }
}

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

//! Batch processor: publishes every message of a batch, then commits the
//! batch exactly once.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info};

use crate::dal::BatchCommitter;
use crate::kafka::Publisher;
use crate::models::Batch;

/// Failure reason recorded for messages without a topic.
pub const NO_TOPIC_REASON: &str = "this message has no topic";

/// Receiving half of the batch queue, shared by all workers of a relay.
pub type SharedBatchReceiver = Arc<Mutex<mpsc::Receiver<Batch>>>;

#[derive(Clone)]
pub struct BatchProcessor {
    publisher: Arc<dyn Publisher>,
    committer: Arc<dyn BatchCommitter>,
}

impl BatchProcessor {
    pub fn new(publisher: Arc<dyn Publisher>, committer: Arc<dyn BatchCommitter>) -> Self {
        Self {
            publisher,
            committer,
        }
    }

    /// Publishes the batch's messages in order and commits their outcome.
    ///
    /// Empty batches are skipped without a commit.
    pub async fn process_batch(&self, mut batch: Batch) {
        if batch.is_empty() {
            debug!(batch_id = %batch.id, "skipping empty batch");
            return;
        }

        for message in batch.messages.iter_mut() {
            if message.topic.is_empty() {
                error!(message_id = message.id, "a message without a topic was detected in the outbox");
                message.fail(NO_TOPIC_REASON);
                continue;
            }

            debug!(message_id = message.id, topic = %message.topic, "sending message to Kafka publisher");
            if let Err(e) = self.publisher.publish_message(message).await {
                debug!(message_id = message.id, error = %e, "error encountered whilst publishing a batch message to Kafka");
                message.fail(e.to_string());
            }
        }

        self.committer.commit_batch(&batch).await;
    }

    /// Worker loop: takes batches off the shared queue until shutdown or
    /// until the queue is closed.
    ///
    /// A shutdown signal abandons the batch in hand; its rows become
    /// claimable again once their claim goes stale.
    pub async fn run(
        &self,
        worker_id: usize,
        queue: SharedBatchReceiver,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        debug!(worker_id, "batch processor started");

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(worker_id, "batch processor shutdown requested");
                    return;
                }
                batch = async { queue.lock().await.recv().await } => batch,
            };

            let Some(batch) = next else {
                info!(worker_id, "batch queue closed, batch processor stopping");
                return;
            };

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(worker_id, "batch processor shutdown requested mid-batch");
                    return;
                }
                _ = self.process_batch(batch) => {}
            }
        }
    }
}

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

//! Relay runtime: one poller and a pool of batch processors per database.
//!
//! ```text
//! BatchSource --> Poller --> [bounded queue] --> BatchProcessor xN --> Publisher
//!                                                      |
//!                                                      +--> BatchCommitter
//! ```
//!
//! All tasks of a relay share one broadcast shutdown channel.

pub mod poller;
pub mod processor;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::dal::{BatchCommitter, BatchSource};
use crate::kafka::Publisher;

pub use poller::Poller;
pub use processor::{BatchProcessor, SharedBatchReceiver, NO_TOPIC_REASON};

/// Capacity of the queue between the poller and the processors.
pub const BATCH_QUEUE_CAPACITY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// Number of batch processor workers.
    pub write_concurrency: usize,
    /// Back-off between polls that found nothing to claim.
    pub poll_interval: Duration,
    pub queue_capacity: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            write_concurrency: 1,
            poll_interval: Duration::from_millis(500),
            queue_capacity: BATCH_QUEUE_CAPACITY,
        }
    }
}

struct RuntimeHandles {
    poller_handle: Option<JoinHandle<()>>,
    worker_handles: Vec<JoinHandle<()>>,
    shutdown_sender: Option<broadcast::Sender<()>>,
}

/// A running relay for one outbox table.
pub struct Relay {
    publisher: Arc<dyn Publisher>,
    runtime_handles: RwLock<RuntimeHandles>,
}

impl Relay {
    /// Spawns the poller and `write_concurrency` workers.
    pub fn start(
        source: Arc<dyn BatchSource>,
        committer: Arc<dyn BatchCommitter>,
        publisher: Arc<dyn Publisher>,
        settings: RelaySettings,
    ) -> Self {
        info!(
            write_concurrency = settings.write_concurrency,
            poll_interval_ms = settings.poll_interval.as_millis() as u64,
            "starting outbox relay polling"
        );

        let (shutdown_tx, poller_shutdown_rx) = broadcast::channel(1);
        let (batch_tx, batch_rx) = mpsc::channel(settings.queue_capacity.max(1));
        let queue: SharedBatchReceiver = Arc::new(Mutex::new(batch_rx));

        let poller = Poller::new(source, settings.poll_interval);
        let poller_handle = tokio::spawn(async move {
            poller.run(batch_tx, poller_shutdown_rx).await;
        });

        let processor = BatchProcessor::new(publisher.clone(), committer);
        let worker_handles = (0..settings.write_concurrency.max(1))
            .map(|worker_id| {
                let processor = processor.clone();
                let queue = queue.clone();
                let shutdown = shutdown_tx.subscribe();
                tokio::spawn(async move {
                    processor.run(worker_id, queue, shutdown).await;
                })
            })
            .collect();

        Self {
            publisher,
            runtime_handles: RwLock::new(RuntimeHandles {
                poller_handle: Some(poller_handle),
                worker_handles,
                shutdown_sender: Some(shutdown_tx),
            }),
        }
    }

    /// Signals every task to stop, waits for them, then closes the publisher.
    pub async fn shutdown(&self) {
        let mut handles = self.runtime_handles.write().await;

        if let Some(sender) = handles.shutdown_sender.take() {
            let _ = sender.send(());
        }

        if let Some(handle) = handles.poller_handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "poller task failed");
            }
        }

        for handle in handles.worker_handles.drain(..) {
            if let Err(e) = handle.await {
                error!(error = %e, "batch processor task failed");
            }
        }

        if let Err(e) = self.publisher.close().await {
            error!(error = %e, "error closing kafka publisher during shutdown");
        }

        info!("outbox relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PublishError, RepositoryError};
    use crate::models::{Batch, Message};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    /// Hands out a fixed number of single-message batches.
    struct CountingSource {
        remaining: AtomicUsize,
        next_id: AtomicUsize,
    }

    #[async_trait]
    impl BatchSource for CountingSource {
        async fn get_batch(&self) -> Result<Batch, RepositoryError> {
            let claimed = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if claimed.is_err() {
                return Err(RepositoryError::NoEvents);
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
            Ok(Batch::new(
                Uuid::new_v4(),
                vec![Message {
                    id,
                    topic: "product".to_string(),
                    ..Default::default()
                }],
            ))
        }
    }

    #[derive(Default)]
    struct Recorder {
        committed: StdMutex<Vec<i64>>,
        closed: AtomicUsize,
    }

    #[async_trait]
    impl BatchCommitter for Recorder {
        async fn commit_batch(&self, batch: &Batch) {
            self.committed
                .lock()
                .unwrap()
                .extend(batch.messages.iter().map(|m| m.id));
        }
    }

    #[async_trait]
    impl Publisher for Recorder {
        async fn publish_message(&self, _message: &Message) -> Result<(), PublishError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), PublishError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_relay_processes_all_batches_and_shuts_down() {
        let source = Arc::new(CountingSource {
            remaining: AtomicUsize::new(20),
            next_id: AtomicUsize::new(0),
        });
        let recorder = Arc::new(Recorder::default());
        let settings = RelaySettings {
            write_concurrency: 4,
            poll_interval: Duration::from_millis(5),
            ..RelaySettings::default()
        };

        let relay = Relay::start(source, recorder.clone(), recorder.clone(), settings);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while recorder.committed.lock().unwrap().len() < 20 {
            assert!(tokio::time::Instant::now() < deadline, "relay did not drain the outbox");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tokio::time::timeout(Duration::from_secs(5), relay.shutdown())
            .await
            .expect("relay should shut down");

        let mut committed = recorder.committed.lock().unwrap().clone();
        committed.sort_unstable();
        assert_eq!(committed, (0..20).collect::<Vec<i64>>());
        assert_eq!(recorder.closed.load(Ordering::SeqCst), 1);
    }
}

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

//! Poller: claims batches and feeds them into the bounded batch queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use crate::dal::BatchSource;
use crate::models::Batch;

pub struct Poller {
    source: Arc<dyn BatchSource>,
    interval: Duration,
}

impl Poller {
    pub fn new(source: Arc<dyn BatchSource>, interval: Duration) -> Self {
        Self { source, interval }
    }

    /// Polls until shutdown is signalled or the queue is closed.
    ///
    /// Backs off for the poll interval after an empty or failed claim. After
    /// a successful hand-off the next claim starts right away.
    pub async fn run(&self, queue: mpsc::Sender<Batch>, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_ms = self.interval.as_millis() as u64, "outbox poller started");

        loop {
            match self.source.get_batch().await {
                Ok(batch) => {
                    let batch_id = batch.id;
                    let num_messages = batch.len();
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => {
                            info!(%batch_id, "poller shutdown requested while queueing a batch");
                            return;
                        }
                        sent = queue.send(batch) => {
                            if sent.is_err() {
                                info!("batch queue closed, poller stopping");
                                return;
                            }
                            debug!(%batch_id, num_messages, "batch queued");
                        }
                    }
                }
                Err(e) => {
                    if !e.is_no_events() {
                        error!(error = %e, "an unexpected error occurred when polling the outbox");
                    }
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => {
                            info!("poller shutdown requested");
                            return;
                        }
                        _ = tokio::time::sleep(self.interval) => {}
                    }
                }
            }
        }
    }
}

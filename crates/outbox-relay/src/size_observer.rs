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

//! Outbox size gauges.
//!
//! Gauges are emitted through the `metrics` facade; whichever recorder the
//! process installs (the CLI uses the Prometheus exporter) renders them.

use std::sync::Arc;
use std::time::Duration;

use metrics::{describe_gauge, gauge, Gauge};
use once_cell::sync::OnceCell;
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::dal::Sizer;

pub const QUEUE_SIZE_GAUGE: &str = "kafka_outbox_queue_size";
pub const TOTAL_SIZE_GAUGE: &str = "kafka_outbox_total_size";

/// Refresh period used by the CLI.
pub const SIZE_OBSERVE_INTERVAL: Duration = Duration::from_secs(1);

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Gauge handles for one outbox table.
#[derive(Clone)]
pub struct SizeGauges {
    queue_size: Gauge,
    total_size: Gauge,
}

impl SizeGauges {
    /// Registers both gauges, labelled with the database they observe.
    pub fn register(database: &str) -> Self {
        DESCRIBED.get_or_init(|| {
            describe_gauge!(
                QUEUE_SIZE_GAUGE,
                "Number of outbox messages not yet published to Kafka"
            );
            describe_gauge!(
                TOTAL_SIZE_GAUGE,
                "Total number of rows in the outbox table"
            );
        });

        let database = database.to_string();
        Self {
            queue_size: gauge!(QUEUE_SIZE_GAUGE, "database" => database.clone()),
            total_size: gauge!(TOTAL_SIZE_GAUGE, "database" => database),
        }
    }

    pub fn set(&self, queue_size: u64, total_size: u64) {
        self.queue_size.set(queue_size as f64);
        self.total_size.set(total_size as f64);
    }
}

/// Reads both sizes and updates the gauges every `interval` until shutdown.
///
/// A failed read leaves the previous values in place and is retried on the
/// next tick.
pub async fn observe_sizes(
    sizer: Arc<dyn Sizer>,
    gauges: SizeGauges,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        match read_sizes(sizer.as_ref()).await {
            Ok((queue_size, total_size)) => {
                debug!(queue_size, total_size, "outbox sizes observed");
                gauges.set(queue_size, total_size);
            }
            Err(e) => error!(error = %e, "failed to read outbox size"),
        }

        tokio::select! {
            biased;
            _ = shutdown.recv() => {
                debug!("size observer stopping");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn read_sizes(sizer: &dyn Sizer) -> Result<(u64, u64), crate::error::RepositoryError> {
    let queue_size = sizer.queue_size().await?;
    let total_size = sizer.total_size().await?;
    Ok((queue_size, total_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RepositoryError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Sizer for FlakySizer {
        async fn queue_size(&self) -> Result<u64, RepositoryError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(RepositoryError::Connection("pool timed out".to_string()));
            }
            Ok(4)
        }

        async fn total_size(&self) -> Result<u64, RepositoryError> {
            Ok(10)
        }
    }

    #[tokio::test]
    async fn test_observer_retries_after_errors_and_stops_on_shutdown() {
        let sizer = Arc::new(FlakySizer {
            calls: AtomicUsize::new(0),
        });
        let gauges = SizeGauges::register("orders");
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(observe_sizes(
            sizer.clone(),
            gauges,
            Duration::from_millis(5),
            shutdown_rx,
        ));

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while sizer.calls.load(Ordering::SeqCst) < 3 {
            assert!(tokio::time::Instant::now() < deadline, "observer stopped polling");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("observer should stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_sizes_reports_both_counts() {
        let sizer = FlakySizer {
            calls: AtomicUsize::new(1),
        };
        assert_eq!(read_sizes(&sizer).await.unwrap(), (4, 10));
    }
}

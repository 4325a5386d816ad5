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


//! Implementation of the default `relay` command.
//!
//! Starts one relay and one size observer per database, serves the health
//! and metrics endpoints, and runs until SIGINT or SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use outbox_relay::dal::DEFAULT_OUTBOX_TABLE;
use outbox_relay::size_observer::SIZE_OBSERVE_INTERVAL;
use outbox_relay::{
    observe_sizes, KafkaPublisher, KafkaSender, Pinger, Publisher, RelayConfig, Relay, SizeGauges,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::connect_repository;
use crate::http::{router, HttpState};

const HTTP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn run(config: RelayConfig, http_port: u16) -> Result<()> {
    info!(config = ?config, "starting service");

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install the Prometheus recorder")?;

    let publisher: Option<Arc<dyn Publisher>> = if config.polling_disabled {
        info!("polling disabled, serving health and metrics only");
        None
    } else {
        let sender = KafkaSender::new(&config.kafka).context("Failed to create Kafka producer")?;
        Some(Arc::new(KafkaPublisher::new(sender)))
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut relays = Vec::new();
    let mut observers: Vec<JoinHandle<()>> = Vec::new();
    let mut pingers: Vec<Arc<dyn Pinger>> = Vec::new();

    for database in &config.databases {
        let repository = Arc::new(connect_repository(database, &config).await?);

        if config.skip_migrations {
            info!(database = %database.name, "skipping migrations");
        } else if database.outbox_table != DEFAULT_OUTBOX_TABLE {
            warn!(
                database = %database.name,
                table = %database.outbox_table,
                "migrations only manage the default outbox table, skipping"
            );
        } else {
            repository
                .database()
                .run_migrations()
                .await
                .with_context(|| format!("Failed to migrate database '{}'", database.name))?;
        }

        pingers.push(repository.clone());
        observers.push(tokio::spawn(observe_sizes(
            repository.clone(),
            SizeGauges::register(&database.name),
            SIZE_OBSERVE_INTERVAL,
            shutdown_tx.subscribe(),
        )));

        if let Some(publisher) = &publisher {
            relays.push(Relay::start(
                repository.clone(),
                repository,
                publisher.clone(),
                config.relay_settings(),
            ));
        }
    }

    let state = Arc::new(HttpState {
        pingers,
        kafka_hosts: config.kafka.hosts.clone(),
        metrics,
    });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", http_port))
        .await
        .with_context(|| format!("Failed to bind HTTP server to port {}", http_port))?;
    info!(port = http_port, "HTTP server listening");

    let mut http_shutdown = shutdown_tx.subscribe();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                let _ = http_shutdown.recv().await;
            })
            .await
    });

    let server_failed = tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            false
        }
        result = &mut server => {
            match result {
                Ok(Ok(())) => error!("HTTP server stopped unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
                Err(e) => error!(error = %e, "HTTP server task failed"),
            }
            true
        }
    };

    let _ = shutdown_tx.send(());
    for relay in &relays {
        relay.shutdown().await;
    }
    for observer in observers {
        if let Err(e) = observer.await {
            error!(error = %e, "size observer task failed");
        }
    }
    if !server_failed
        && tokio::time::timeout(HTTP_SHUTDOWN_TIMEOUT, server).await.is_err()
    {
        error!("HTTP server did not shutdown correctly");
    }

    info!("outbox relay stopped");
    if server_failed {
        anyhow::bail!("HTTP server stopped");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

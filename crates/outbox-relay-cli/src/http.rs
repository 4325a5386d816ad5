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


//! Health and metrics endpoints.
//!
//! - `GET /healthz`: 200 when every outbox database answers a ping, 503
//!   otherwise. `?readiness=1` also requires a TCP connection to every
//!   Kafka host.
//! - `GET /metrics`: Prometheus text rendering of the process metrics.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use outbox_relay::Pinger;
use serde::Deserialize;
use tokio::net::TcpStream;
use tracing::debug;

const DIAL_TIMEOUT: Duration = Duration::from_secs(1);

pub struct HttpState {
    pub pingers: Vec<Arc<dyn Pinger>>,
    pub kafka_hosts: Vec<String>,
    pub metrics: PrometheusHandle,
}

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    readiness: Option<String>,
}

pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

async fn healthz(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<HealthQuery>,
) -> StatusCode {
    let mut healthy = check_databases(&state.pingers).await;
    if query.readiness.as_deref() == Some("1") {
        healthy = check_services(&state.kafka_hosts).await && healthy;
    }

    if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn metrics(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn check_databases(pingers: &[Arc<dyn Pinger>]) -> bool {
    let mut healthy = true;
    for pinger in pingers {
        if let Err(e) = pinger.ping().await {
            debug!(error = %e, "database is not available or there is a problem with connectivity");
            healthy = false;
        }
    }
    healthy
}

async fn check_services(hosts: &[String]) -> bool {
    let mut healthy = true;
    for host in hosts {
        debug!(host = %host, "checking connectivity");
        match tokio::time::timeout(DIAL_TIMEOUT, TcpStream::connect(host.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                debug!(host = %host, error = %e, "unable to connect");
                healthy = false;
            }
            Err(_) => {
                debug!(host = %host, "connection attempt timed out");
                healthy = false;
            }
        }
    }
    healthy
}

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


//! Command-line and environment settings.

use std::time::Duration;

use clap::Args;
use outbox_relay::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_PUBLISH_ATTEMPTS, DEFAULT_WRITE_CONCURRENCY,
};
use outbox_relay::dal::DEFAULT_OUTBOX_TABLE;
use outbox_relay::{BackendType, ConfigError, DatabaseConfig, KafkaConfig, RelayConfig};

/// Every setting can be given as a flag or through its environment variable.
#[derive(Args, Clone)]
pub struct Settings {
    /// Database host
    #[arg(long, env = "DB_HOST")]
    pub db_host: String,

    /// Database port (defaults to the driver's standard port)
    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    #[arg(long, env = "DB_USER", default_value = "")]
    pub db_user: String,

    #[arg(long, env = "DB_PASS", default_value = "", hide_env_values = true)]
    pub db_pass: String,

    /// Comma separated database names; one relay runs per database
    #[arg(long = "db-name", env = "DB_NAME", value_delimiter = ',', required = true)]
    pub db_names: Vec<String>,

    /// Database driver: postgres or mysql
    #[arg(long, env = "DB_DRIVER", default_value = "postgres")]
    pub db_driver: String,

    /// Outbox table name
    #[arg(long, env = "OUTBOX_TABLE", default_value = DEFAULT_OUTBOX_TABLE)]
    pub outbox_table: String,

    /// Comma separated Kafka bootstrap hosts
    #[arg(long = "kafka-host", env = "KAFKA_HOST", value_delimiter = ',')]
    pub kafka_hosts: Vec<String>,

    /// Attempts per message before it is marked errored
    #[arg(long, env = "KAFKA_PUBLISH_ATTEMPTS", default_value_t = DEFAULT_PUBLISH_ATTEMPTS)]
    pub kafka_publish_attempts: u32,

    /// Use TLS for Kafka and database connections
    #[arg(long = "tls-enable", env = "TLS_ENABLE")]
    pub tls_enable: bool,

    /// Skip TLS peer verification
    #[arg(long = "tls-skip-verify-peer", env = "TLS_SKIP_VERIFY_PEER")]
    pub tls_skip_verify_peer: bool,

    /// Batch processor workers per database
    #[arg(long, env = "WRITE_CONCURRENCY", default_value_t = DEFAULT_WRITE_CONCURRENCY)]
    pub write_concurrency: usize,

    /// Back-off in milliseconds after a poll that found nothing
    #[arg(long, env = "POLL_FREQUENCY_MS", default_value_t = 500)]
    pub poll_frequency_ms: u64,

    /// Maximum rows claimed per batch
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Serve health and metrics only, without relaying
    #[arg(long, env = "POLLING_DISABLED")]
    pub polling_disabled: bool,

    /// Do not run the embedded migrations on startup
    #[arg(long, env = "SKIP_MIGRATIONS")]
    pub skip_migrations: bool,

    /// Port of the health and metrics server
    #[arg(long, env = "HTTP_PORT", default_value_t = 80)]
    pub http_port: u16,

    /// Log filter, e.g. "info" or "outbox_relay=debug"
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl Settings {
    /// Validated configuration for the relay command.
    pub fn relay_config(&self) -> Result<RelayConfig, ConfigError> {
        let config = self.build()?;
        config.validate()?;
        Ok(config)
    }

    /// Validated configuration for the maintenance jobs, which never talk to Kafka.
    pub fn job_config(&self) -> Result<RelayConfig, ConfigError> {
        let mut config = self.build()?;
        config.polling_disabled = true;
        config.validate()?;
        Ok(config)
    }

    fn build(&self) -> Result<RelayConfig, ConfigError> {
        let backend = BackendType::from_driver(&self.db_driver)?;
        let port = self.db_port.unwrap_or_else(|| backend.default_port());

        let databases = non_empty(&self.db_names)
            .map(|name| {
                let mut database = DatabaseConfig::new(
                    backend,
                    &self.db_host,
                    port,
                    &self.db_user,
                    &self.db_pass,
                    name,
                );
                database.outbox_table = self.outbox_table.clone();
                database.tls_enable = self.tls_enable;
                database.tls_skip_verify_peer = self.tls_skip_verify_peer;
                database
            })
            .collect();

        let kafka = KafkaConfig {
            hosts: non_empty(&self.kafka_hosts).collect(),
            publish_attempts: self.kafka_publish_attempts,
            tls_enable: self.tls_enable,
            tls_skip_verify_peer: self.tls_skip_verify_peer,
        };

        let mut config = RelayConfig::new(databases, kafka);
        config.write_concurrency = self.write_concurrency;
        config.poll_frequency = Duration::from_millis(self.poll_frequency_ms);
        config.batch_size = self.batch_size;
        config.polling_disabled = self.polling_disabled;
        config.skip_migrations = self.skip_migrations;
        Ok(config)
    }
}

fn non_empty(values: &[String]) -> impl Iterator<Item = String> + '_ {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

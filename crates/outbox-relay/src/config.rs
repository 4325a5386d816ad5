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

//! Relay configuration.
//!
//! The binary fills these structures from flags and environment variables;
//! the library only validates them and derives runtime settings. One
//! [`DatabaseConfig`] exists per configured database name, each getting its
//! own relay.

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::dal::{RepositorySettings, DEFAULT_OUTBOX_TABLE};
use crate::database::BackendType;
use crate::error::ConfigError;
use crate::relay::RelaySettings;

pub const DEFAULT_PUBLISH_ATTEMPTS: u32 = 3;
pub const DEFAULT_WRITE_CONCURRENCY: usize = 1;
pub const DEFAULT_POLL_FREQUENCY: Duration = Duration::from_millis(500);
pub const DEFAULT_BATCH_SIZE: usize = 250;
/// The success update binds one parameter per id; both backends cap a
/// statement at 65535 bind parameters.
pub const MAX_BATCH_SIZE: usize = 65_535;

const MAX_TABLE_NAME_LENGTH: usize = 64;

/// Connection details of one outbox database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub backend: BackendType,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub outbox_table: String,
    pub tls_enable: bool,
    pub tls_skip_verify_peer: bool,
}

impl DatabaseConfig {
    pub fn new(
        backend: BackendType,
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            host: host.into(),
            port,
            user: user.into(),
            password: password.into(),
            name: name.into(),
            outbox_table: DEFAULT_OUTBOX_TABLE.to_string(),
            tls_enable: false,
            tls_skip_verify_peer: false,
        }
    }

    /// Builds the connection URL, percent-encoding the credentials.
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidUrl {
            host: self.host.clone(),
            reason,
        };

        let mut url = Url::parse(&format!("{}://{}", self.backend.scheme(), self.host))
            .map_err(|e| invalid(e.to_string()))?;
        url.set_port(Some(self.port))
            .map_err(|_| invalid("port cannot be set".to_string()))?;
        url.set_username(&self.user)
            .map_err(|_| invalid("user cannot be set".to_string()))?;
        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|_| invalid("password cannot be set".to_string()))?;
        }
        url.set_path(&self.name);

        let (param, mode) = self.tls_mode();
        url.query_pairs_mut().append_pair(param, mode);

        Ok(url.to_string())
    }

    fn tls_mode(&self) -> (&'static str, &'static str) {
        match self.backend {
            BackendType::Postgres => (
                "sslmode",
                match (self.tls_enable, self.tls_skip_verify_peer) {
                    (false, _) => "disable",
                    (true, true) => "require",
                    (true, false) => "verify-full",
                },
            ),
            BackendType::Mysql => (
                "ssl_mode",
                match (self.tls_enable, self.tls_skip_verify_peer) {
                    (false, _) => "DISABLED",
                    (true, true) => "REQUIRED",
                    (true, false) => "VERIFY_IDENTITY",
                },
            ),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_table_name(&self.outbox_table)?;
        if self.name.is_empty() {
            return Err(ConfigError::NoDatabases);
        }
        Ok(())
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("backend", &self.backend)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"xxxxx")
            .field("name", &self.name)
            .field("outbox_table", &self.outbox_table)
            .field("tls_enable", &self.tls_enable)
            .field("tls_skip_verify_peer", &self.tls_skip_verify_peer)
            .finish()
    }
}

/// Broker connection and delivery settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaConfig {
    pub hosts: Vec<String>,
    /// Attempts per message before it is marked errored.
    pub publish_attempts: u32,
    pub tls_enable: bool,
    pub tls_skip_verify_peer: bool,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            publish_attempts: DEFAULT_PUBLISH_ATTEMPTS,
            tls_enable: false,
            tls_skip_verify_peer: false,
        }
    }
}

/// Full relay configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub databases: Vec<DatabaseConfig>,
    pub kafka: KafkaConfig,
    pub write_concurrency: usize,
    pub poll_frequency: Duration,
    pub batch_size: usize,
    pub polling_disabled: bool,
    pub skip_migrations: bool,
}

impl RelayConfig {
    pub fn new(databases: Vec<DatabaseConfig>, kafka: KafkaConfig) -> Self {
        Self {
            databases,
            kafka,
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
            poll_frequency: DEFAULT_POLL_FREQUENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            polling_disabled: false,
            skip_migrations: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.databases.is_empty() {
            return Err(ConfigError::NoDatabases);
        }
        for database in &self.databases {
            database.validate()?;
        }
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "BATCH_SIZE",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "BATCH_SIZE",
                reason: format!("must not exceed {}", MAX_BATCH_SIZE),
            });
        }
        if self.write_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "WRITE_CONCURRENCY",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.kafka.publish_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "KAFKA_PUBLISH_ATTEMPTS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !self.polling_disabled && self.kafka.hosts.iter().all(|h| h.trim().is_empty()) {
            return Err(ConfigError::NoKafkaHosts);
        }
        Ok(())
    }

    pub fn repository_settings(&self) -> RepositorySettings {
        RepositorySettings {
            batch_size: self.batch_size,
            max_push_attempts: self.kafka.publish_attempts,
        }
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            write_concurrency: self.write_concurrency,
            poll_interval: self.poll_frequency,
            ..RelaySettings::default()
        }
    }
}

/// Accepts plain SQL identifiers only; the table name is interpolated into SQL.
pub fn validate_table_name(name: &str) -> Result<&str, ConfigError> {
    let valid_start = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    if !valid_start
        || name.len() > MAX_TABLE_NAME_LENGTH
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConfigError::InvalidTableName(name.to_string()));
    }

    Ok(name)
}

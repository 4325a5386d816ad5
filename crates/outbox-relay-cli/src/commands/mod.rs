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


pub mod cleanup;
pub mod optimize;
pub mod relay;

use std::process::ExitCode;

use anyhow::{Context, Result};
use outbox_relay::{Database, DatabaseConfig, OutboxRepository, RelayConfig};
use tracing::info;

/// Connects to one configured database and builds its repository.
pub async fn connect_repository(
    database: &DatabaseConfig,
    config: &RelayConfig,
) -> Result<OutboxRepository> {
    let url = database
        .connection_url()
        .with_context(|| format!("Invalid connection settings for database '{}'", database.name))?;
    let pool_size = config.write_concurrency + 2;

    info!(database = %database.name, backend = %database.backend, "connecting to database");
    let connection = Database::connect(&url, pool_size)
        .await
        .with_context(|| format!("Failed to connect to database '{}'", database.name))?;

    Ok(OutboxRepository::for_table(
        connection,
        &database.outbox_table,
        config.repository_settings(),
    ))
}

/// Collapses a count of failed databases into a process exit code.
pub fn exit_code(failures: usize) -> ExitCode {
    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

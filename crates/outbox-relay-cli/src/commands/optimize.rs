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


//! Implementation of the `optimize` command.

use std::process::ExitCode;

use anyhow::{Context, Result};
use outbox_relay::jobs::run_optimize;
use outbox_relay::{DatabaseConfig, RelayConfig};
use tracing::error;

use super::{connect_repository, exit_code};

/// Optimizes every configured outbox table and reports overall success.
pub async fn run(config: &RelayConfig) -> ExitCode {
    let mut failures = 0;
    for database in &config.databases {
        if let Err(e) = optimize_database(database, config).await {
            error!(
                database = %database.name,
                error = format!("{:#}", e),
                "an error occurred whilst optimizing the outbox table"
            );
            failures += 1;
        }
    }
    exit_code(failures)
}

async fn optimize_database(database: &DatabaseConfig, config: &RelayConfig) -> Result<()> {
    let repository = connect_repository(database, config).await?;
    run_optimize(&repository)
        .await
        .with_context(|| format!("Failed to optimize table '{}'", database.outbox_table))
}

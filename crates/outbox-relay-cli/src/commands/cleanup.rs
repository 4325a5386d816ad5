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


//! Implementation of the `cleanup` command.
//!
//! Deletes published rows from every configured outbox table.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use outbox_relay::jobs::run_cleanup;
use outbox_relay::{DatabaseConfig, RelayConfig};
use tracing::{error, info};

use super::{connect_repository, exit_code};

/// Parse a duration string like "1h", "30m", "7d" or "1h30m".
///
/// Supported units:
/// - `d` - days
/// - `h` - hours
/// - `m` - minutes
/// - `s` - seconds
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("Duration string cannot be empty"));
    }

    let mut total_secs: u64 = 0;
    let mut current_num = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
            continue;
        }
        if current_num.is_empty() {
            return Err(anyhow!(
                "Invalid duration format: expected number before '{}'",
                c
            ));
        }

        let num: u64 = current_num
            .parse()
            .with_context(|| format!("Invalid number in duration: {}", current_num))?;
        current_num.clear();

        let unit_secs = match c {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return Err(anyhow!("Unknown duration unit: '{}'. Use d, h, m, or s", c)),
        };
        total_secs = num
            .checked_mul(unit_secs)
            .and_then(|secs| total_secs.checked_add(secs))
            .ok_or_else(|| anyhow!("Duration '{}' is too large", s))?;
    }

    if !current_num.is_empty() {
        return Err(anyhow!(
            "Duration '{}' is missing a unit. Use d (days), h (hours), m (minutes), or s (seconds)",
            s
        ));
    }

    if total_secs == 0 {
        return Err(anyhow!("Duration must be greater than zero"));
    }

    Ok(Duration::from_secs(total_secs))
}

/// Run the cleanup command against every database.
///
/// A failing database does not stop the others; any failure makes the
/// process exit with status 1.
pub async fn run(config: &RelayConfig, older_than: &str) -> Result<ExitCode> {
    let age = parse_duration(older_than)
        .with_context(|| format!("Invalid duration: '{}'", older_than))?;

    let mut failures = 0;
    for database in &config.databases {
        if let Err(e) = cleanup_database(database, config, age).await {
            error!(
                database = %database.name,
                error = format!("{:#}", e),
                "an error occurred whilst deleting published outbox records"
            );
            failures += 1;
        }
    }

    Ok(exit_code(failures))
}

async fn cleanup_database(
    database: &DatabaseConfig,
    config: &RelayConfig,
    age: Duration,
) -> Result<()> {
    let repository = connect_repository(database, config).await?;
    let deleted = run_cleanup(&repository, age)
        .await
        .context("Failed to delete published outbox records")?;
    info!(database = %database.name, deleted, "deleted published outbox records");
    Ok(())
}

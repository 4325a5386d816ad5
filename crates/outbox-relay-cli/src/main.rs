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


//! Outbox relay CLI: relays outbox tables to Kafka, or runs one of the
//! maintenance jobs and exits.

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

mod commands;
mod http;
mod settings;

use settings::Settings;

/// Relays rows from transactional outbox tables to Kafka
#[derive(Parser)]
#[command(name = "outbox-relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Poll the outbox tables and publish to Kafka (the default)
    Relay,
    /// Delete published outbox rows
    Cleanup {
        /// Delete rows published longer ago than this (e.g. "1h", "30m", "7d")
        #[arg(long, default_value = "1h")]
        older_than: String,
    },
    /// Run VACUUM / OPTIMIZE TABLE on every outbox table
    Optimize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    outbox_relay::init_logging(cli.settings.log_level.as_deref());

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = format!("{:#}", e), "outbox relay failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command.unwrap_or(Commands::Relay) {
        Commands::Relay => {
            let config = cli.settings.relay_config()?;
            commands::relay::run(config, cli.settings.http_port).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Cleanup { older_than } => {
            let config = cli.settings.job_config()?;
            commands::cleanup::run(&config, &older_than).await
        }
        Commands::Optimize => {
            let config = cli.settings.job_config()?;
            Ok(commands::optimize::run(&config).await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_ARGS: [&str; 7] = [
        "outbox-relay",
        "--db-host",
        "db",
        "--db-name",
        "orders",
        "--kafka-host",
        "kafka:9092",
    ];

    #[test]
    fn test_relay_is_the_default_command() {
        let cli = Cli::try_parse_from(BASE_ARGS).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_cleanup_age_defaults_to_one_hour() {
        let args = BASE_ARGS.iter().copied().chain(["cleanup"]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Cleanup {
                older_than: "1h".to_string()
            })
        );
    }

    #[test]
    fn test_optimize_subcommand() {
        let args = BASE_ARGS.iter().copied().chain(["optimize"]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.command, Some(Commands::Optimize));
    }
}

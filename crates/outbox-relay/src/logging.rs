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


//! Process-wide tracing setup.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when neither `LOG_LEVEL` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_LEVEL: &str = "error";

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// Installs a JSON subscriber on the global registry.
///
/// The filter comes from `level` (normally `LOG_LEVEL`), then `RUST_LOG`,
/// then [`DEFAULT_LOG_LEVEL`]. Calling it again is a no-op.
pub fn init_logging(level: Option<&str>) {
    INITIALIZED.get_or_init(|| {
        let filter = build_filter(level);
        // Fails only if another subscriber is already installed, e.g. by a test harness.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init();
    });
}

fn build_filter(level: Option<&str>) -> EnvFilter {
    if let Some(level) = level.map(str::trim).filter(|l| !l.is_empty()) {
        match EnvFilter::try_new(level) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("ignoring invalid log level '{}': {}", level, e),
        }
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

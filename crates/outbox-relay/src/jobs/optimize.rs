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


//! Table maintenance for the outbox table.

use tracing::info;

use crate::dal::OutboxRepository;
use crate::error::RepositoryError;

/// Runs `VACUUM` (Postgres) or `OPTIMIZE TABLE` (MySQL) on the outbox table.
pub async fn run_optimize(repository: &OutboxRepository) -> Result<(), RepositoryError> {
    repository.optimize_table().await?;
    info!(table = %repository.table(), "outbox table optimized");
    Ok(())
}

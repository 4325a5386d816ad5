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

//! Database layer: backend selection, pooling and embedded migrations.
//!
//! Migrations create the default `kafka_outbox` table together with the
//! index used by the claim statement. Deployments with a custom outbox table
//! name manage that table themselves.

pub mod connection;

pub use connection::{redact_url, AnyPool, BackendType, Database};

#[cfg(feature = "postgres")]
pub const POSTGRES_MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!("migrations/postgres");

#[cfg(feature = "mysql")]
pub const MYSQL_MIGRATIONS: diesel_migrations::EmbeddedMigrations =
    diesel_migrations::embed_migrations!("migrations/mysql");

/// Runs one of two blocks depending on the database backend.
///
/// Arms for backends that are not compiled in collapse into a
/// [`RepositoryError::BackendUnavailable`](crate::error::RepositoryError)
/// error, so callers must return a `Result` whose error converts from it.
///
/// ```rust,ignore
/// dispatch_backend!(self.database.backend(), {
///     self.claim_postgres(batch_id).await
/// }, {
///     self.claim_mysql(batch_id).await
/// })
/// ```
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg_block:block, $mysql_block:block) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg_block,
            #[cfg(feature = "mysql")]
            $crate::database::BackendType::Mysql => $mysql_block,
            #[allow(unreachable_patterns)]
            other => Err($crate::error::RepositoryError::BackendUnavailable(other).into()),
        }
    };
}

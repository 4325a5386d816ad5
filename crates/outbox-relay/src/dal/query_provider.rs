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

//! Dialect-specific SQL text for the outbox table.
//!
//! A query provider is a pure templating strategy: given the table name and
//! the column list it renders parameterized statements, and holds no row
//! state. Bind order for each statement:
//!
//! | statement                  | binds                                   |
//! |----------------------------|-----------------------------------------|
//! | batch creation             | batch id, stale cutoff, errored (false) |
//! | batch fetch                | batch id                                |
//! | message errored update     | error reason, message id                |
//! | messages success update    | one message id per placeholder          |
//! | delete published messages  | older-than timestamp                    |

use std::fmt;

use crate::database::BackendType;

/// Columns read back when a batch is fetched, in scan order.
pub const OUTBOX_COLUMNS: &[&str] = &[
    "id",
    "batch_id",
    "push_started_at",
    "push_completed_at",
    "topic",
    "payload_json",
    "payload_headers",
    "push_attempts",
    "key",
    "partition_key",
];

/// Default outbox table created by the embedded migrations.
pub const DEFAULT_OUTBOX_TABLE: &str = "kafka_outbox";

/// Renders the statements the repository executes.
pub trait QueryProvider: Send + Sync + fmt::Debug {
    fn backend(&self) -> BackendType;

    fn table(&self) -> &str;

    /// Claims up to `batch_size` rows in id order.
    fn batch_creation_sql(&self, batch_size: usize) -> String;

    fn batch_fetch_sql(&self) -> String;

    /// Records a failure; `errored` flips once attempts reach `max_push_attempts`.
    fn message_errored_update_sql(&self, max_push_attempts: u32) -> String;

    /// Marks `id_count` messages as published in one statement.
    fn messages_success_update_sql(&self, id_count: usize) -> String;

    fn delete_published_messages_sql(&self) -> String;

    fn queue_size_sql(&self) -> String;

    fn total_size_sql(&self) -> String;

    /// Reclaims space after bulk deletes.
    fn optimize_table_sql(&self) -> String;
}

/// Builds the provider for a backend.
pub fn query_provider_for(
    backend: BackendType,
    table: impl Into<String>,
    columns: &[&str],
) -> Box<dyn QueryProvider> {
    let table = table.into();
    let columns = columns.iter().map(|c| c.to_string()).collect();
    match backend {
        BackendType::Postgres => Box::new(PostgresQueryProvider { table, columns }),
        BackendType::Mysql => Box::new(MysqlQueryProvider { table, columns }),
    }
}

/// `$n` placeholders; bounded updates go through an id sub-select.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresQueryProvider {
    pub table: String,
    pub columns: Vec<String>,
}

impl QueryProvider for PostgresQueryProvider {
    fn backend(&self) -> BackendType {
        BackendType::Postgres
    }

    fn table(&self) -> &str {
        &self.table
    }

    // SKIP LOCKED keeps a concurrent claimer from re-stamping rows that the
    // sub-select already handed to another transaction.
    fn batch_creation_sql(&self, batch_size: usize) -> String {
        format!(
            "UPDATE {table} SET batch_id = $1, push_started_at = NOW() \
             WHERE id IN (\
             SELECT id FROM {table} \
             WHERE ((batch_id IS NULL AND push_started_at IS NULL) \
             OR (batch_id IS NOT NULL AND push_completed_at IS NULL AND push_started_at < $2)) \
             AND errored = $3 \
             ORDER BY id ASC LIMIT {batch_size} \
             FOR UPDATE SKIP LOCKED)",
            table = self.table,
        )
    }

    fn batch_fetch_sql(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE batch_id = $1 ORDER BY id ASC",
            self.columns.join(", "),
            self.table
        )
    }

    fn message_errored_update_sql(&self, max_push_attempts: u32) -> String {
        format!(
            "UPDATE {} SET error_reason = $1, \
             errored = CASE WHEN push_attempts + 1 >= {} THEN TRUE ELSE FALSE END, \
             push_started_at = NULL, batch_id = NULL, push_attempts = push_attempts + 1 \
             WHERE id = $2",
            self.table, max_push_attempts
        )
    }

    fn messages_success_update_sql(&self, id_count: usize) -> String {
        let placeholders = (1..=id_count)
            .map(|i| format!("${}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET push_completed_at = NOW(), error_reason = NULL, \
             push_attempts = push_attempts + 1 WHERE id IN ({})",
            self.table, placeholders
        )
    }

    fn delete_published_messages_sql(&self) -> String {
        format!("DELETE FROM {} WHERE push_completed_at <= $1", self.table)
    }

    fn queue_size_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) AS count FROM {} WHERE push_completed_at IS NULL",
            self.table
        )
    }

    fn total_size_sql(&self) -> String {
        format!("SELECT COUNT(*) AS count FROM {}", self.table)
    }

    fn optimize_table_sql(&self) -> String {
        format!("VACUUM {}", self.table)
    }
}

/// `?` placeholders; bounded updates use `UPDATE ... LIMIT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MysqlQueryProvider {
    pub table: String,
    pub columns: Vec<String>,
}

impl MysqlQueryProvider {
    fn escaped_columns(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("`{}`", c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl QueryProvider for MysqlQueryProvider {
    fn backend(&self) -> BackendType {
        BackendType::Mysql
    }

    fn table(&self) -> &str {
        &self.table
    }

    fn batch_creation_sql(&self, batch_size: usize) -> String {
        format!(
            "UPDATE `{}` SET `batch_id` = ?, `push_started_at` = UTC_TIMESTAMP() \
             WHERE ((`batch_id` IS NULL AND `push_started_at` IS NULL) \
             OR (`batch_id` IS NOT NULL AND `push_completed_at` IS NULL AND `push_started_at` < ?)) \
             AND `errored` = ? \
             ORDER BY `id` ASC LIMIT {}",
            self.table, batch_size
        )
    }

    fn batch_fetch_sql(&self) -> String {
        format!(
            "SELECT {} FROM `{}` WHERE `batch_id` = ? ORDER BY `id` ASC",
            self.escaped_columns(),
            self.table
        )
    }

    fn message_errored_update_sql(&self, max_push_attempts: u32) -> String {
        format!(
            "UPDATE `{}` SET `error_reason` = ?, \
             `errored` = IF((`push_attempts` + 1) >= {}, 1, 0), \
             `push_started_at` = NULL, `batch_id` = NULL, `push_attempts` = `push_attempts` + 1 \
             WHERE `id` = ?",
            self.table, max_push_attempts
        )
    }

    fn messages_success_update_sql(&self, id_count: usize) -> String {
        let placeholders = vec!["?"; id_count].join(", ");
        format!(
            "UPDATE `{}` SET `push_completed_at` = UTC_TIMESTAMP(), `error_reason` = NULL, \
             `push_attempts` = `push_attempts` + 1 WHERE `id` IN ({})",
            self.table, placeholders
        )
    }

    fn delete_published_messages_sql(&self) -> String {
        format!("DELETE FROM `{}` WHERE `push_completed_at` <= ?", self.table)
    }

    fn queue_size_sql(&self) -> String {
        format!(
            "SELECT COUNT(*) AS count FROM `{}` WHERE `push_completed_at` IS NULL",
            self.table
        )
    }

    fn total_size_sql(&self) -> String {
        format!("SELECT COUNT(*) AS count FROM `{}`", self.table)
    }

    fn optimize_table_sql(&self) -> String {
        format!("OPTIMIZE TABLE `{}`", self.table)
    }
}

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

//! Row shapes for raw SQL results, one per backend.
//!
//! Field names match [`OUTBOX_COLUMNS`](crate::dal::OUTBOX_COLUMNS) because
//! `QueryableByName` maps result columns by name.

use diesel::sql_types::{BigInt, Binary, Integer, Nullable, Text};
use diesel::QueryableByName;

use crate::models::Message;

/// Single `COUNT(*) AS count` result.
#[derive(Debug, QueryableByName)]
pub(crate) struct CountRow {
    #[diesel(sql_type = BigInt)]
    pub count: i64,
}

#[cfg(feature = "postgres")]
#[derive(Debug, QueryableByName)]
pub(crate) struct PgOutboxRow {
    #[diesel(sql_type = BigInt)]
    pub id: i64,
    #[diesel(sql_type = Nullable<diesel::sql_types::Uuid>)]
    pub batch_id: Option<uuid::Uuid>,
    #[diesel(sql_type = Nullable<diesel::sql_types::Timestamptz>)]
    pub push_started_at: Option<chrono::DateTime<chrono::Utc>>,
    #[diesel(sql_type = Nullable<diesel::sql_types::Timestamptz>)]
    pub push_completed_at: Option<chrono::DateTime<chrono::Utc>>,
    #[diesel(sql_type = Text)]
    pub topic: String,
    #[diesel(sql_type = Binary)]
    pub payload_json: Vec<u8>,
    #[diesel(sql_type = Binary)]
    pub payload_headers: Vec<u8>,
    #[diesel(sql_type = Integer)]
    pub push_attempts: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub key: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub partition_key: Option<String>,
}

#[cfg(feature = "postgres")]
impl From<PgOutboxRow> for Message {
    fn from(row: PgOutboxRow) -> Self {
        Message {
            id: row.id,
            batch_id: row.batch_id,
            push_started_at: row.push_started_at,
            push_completed_at: row.push_completed_at,
            topic: row.topic,
            payload: row.payload_json,
            headers: row.payload_headers,
            push_attempts: row.push_attempts,
            errored: false,
            error_reason: None,
            key: row.key,
            partition_key: row.partition_key,
        }
    }
}

/// MySQL stores the claim token as `CHAR(36)` and timestamps as UTC `DATETIME`.
#[cfg(feature = "mysql")]
#[derive(Debug, QueryableByName)]
pub(crate) struct MysqlOutboxRow {
    #[diesel(sql_type = BigInt)]
    pub id: i64,
    #[diesel(sql_type = Nullable<Text>)]
    pub batch_id: Option<String>,
    #[diesel(sql_type = Nullable<diesel::sql_types::Datetime>)]
    pub push_started_at: Option<chrono::NaiveDateTime>,
    #[diesel(sql_type = Nullable<diesel::sql_types::Datetime>)]
    pub push_completed_at: Option<chrono::NaiveDateTime>,
    #[diesel(sql_type = Text)]
    pub topic: String,
    #[diesel(sql_type = Binary)]
    pub payload_json: Vec<u8>,
    #[diesel(sql_type = Binary)]
    pub payload_headers: Vec<u8>,
    #[diesel(sql_type = Integer)]
    pub push_attempts: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub key: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub partition_key: Option<String>,
}

#[cfg(feature = "mysql")]
impl From<MysqlOutboxRow> for Message {
    fn from(row: MysqlOutboxRow) -> Self {
        Message {
            id: row.id,
            batch_id: row
                .batch_id
                .as_deref()
                .and_then(|id| uuid::Uuid::parse_str(id).ok()),
            push_started_at: row.push_started_at.map(|t| t.and_utc()),
            push_completed_at: row.push_completed_at.map(|t| t.and_utc()),
            topic: row.topic,
            payload: row.payload_json,
            headers: row.payload_headers,
            push_attempts: row.push_attempts,
            errored: false,
            error_reason: None,
            key: row.key,
            partition_key: row.partition_key,
        }
    }
}

/// One status line of MySQL's `OPTIMIZE TABLE` result set.
#[cfg(feature = "mysql")]
#[derive(Debug, QueryableByName)]
pub(crate) struct OptimizeRow {
    #[diesel(sql_type = Text, column_name = Msg_type)]
    pub msg_type: String,
    #[diesel(sql_type = Text, column_name = Msg_text)]
    pub msg_text: String,
}

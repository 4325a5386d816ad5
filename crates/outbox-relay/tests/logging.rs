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

// Installs the global subscriber, so it lives in its own test binary where no
// other test depends on capturing logs.

use outbox_relay::init_logging;

#[test]
fn test_init_logging_is_idempotent() {
    init_logging(Some("error"));
    init_logging(Some("debug"));
    init_logging(None);

    assert!(tracing::dispatcher::has_been_set());
    tracing::error!(batch_id = "none", "logging initialised");
}

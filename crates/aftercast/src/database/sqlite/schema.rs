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

diesel::table! {
    tasks (id) {
        id -> Text,
        opcode -> Integer,
        event_id -> Text,
        stage -> Integer,
        exec_time -> BigInt,
        submit_time -> BigInt,
        submit_id -> Text,
        apparent_time -> BigInt,
        payload -> Text,
        claim_count -> Integer,
        fault_count -> Integer,
    }
}

diesel::table! {
    timeline_entries (event_id, sequence_no) {
        event_id -> Text,
        sequence_no -> BigInt,
        action_code -> Integer,
        action_time -> BigInt,
        payload -> Text,
    }
}

diesel::table! {
    relay_items (topic, relay_id) {
        topic -> Integer,
        relay_id -> Text,
        relay_time -> BigInt,
        payload -> Text,
    }
}

diesel::table! {
    log_entries (id) {
        id -> Text,
        log_time -> BigInt,
        opcode -> Integer,
        event_id -> Text,
        stage -> Integer,
        result_code -> Integer,
        payload -> Text,
        details -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(tasks, timeline_entries, relay_items, log_entries);

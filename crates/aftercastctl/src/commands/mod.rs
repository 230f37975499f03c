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

pub mod inspect;
pub mod rebuild;
pub mod submit;

use anyhow::{Context, Result};
use std::sync::Arc;

use aftercast::database::{AccessLevel, Database, RecordStore};

/// Opens a store named in the configuration.
pub async fn open_store(url: &str, access: AccessLevel) -> Result<Arc<dyn RecordStore>> {
    let database = Database::open(url, access)
        .await
        .with_context(|| format!("Failed to open store '{}'", url))?;
    Ok(database.store())
}

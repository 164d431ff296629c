// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Raw BLE scan records collected during a test.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::snippet::SnippetEvent;

/// Scan events in the order they were observed.
///
/// Nothing is deduplicated or filtered.
#[derive(Debug, Clone, Default)]
pub struct RecordList {
    records: Vec<SnippetEvent>,
}

impl RecordList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: SnippetEvent) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SnippetEvent] {
        &self.records
    }

    /// Write one compact JSON record per line, replacing `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create record file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!("Wrote {} scan records to {:?}", self.records.len(), path);
        Ok(())
    }
}

impl From<Vec<SnippetEvent>> for RecordList {
    fn from(records: Vec<SnippetEvent>) -> Self {
        Self { records }
    }
}

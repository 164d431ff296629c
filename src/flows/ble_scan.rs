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

//! BLE flow: scan for a fixed time and keep every result.

use anyhow::Result;
use tracing::{debug, info, warn};

use super::poll::{collect_until, Deadline};
use crate::config::{BleScanConfig, BluetoothConfig};
use crate::runner::TestCase;
use crate::snippet::{scan_record_services, BluetoothSnippet, SCAN_RESULT_EVENT};
use crate::storage::RecordList;

/// Run an unfiltered BLE scan for the configured budget, stop it, and write
/// every result to the record file.
pub async fn scan_and_record(bt: &BluetoothSnippet<'_>, config: &BleScanConfig) -> Result<RecordList> {
    let wait = config.wait_timeout();
    let client = bt.client();

    let name = bt.name().await?;
    info!("Scan for {}s with name \"{}\"", config.budget_secs, name);

    let scan = bt.ble_start_scan().await?;
    let deadline = Deadline::after(config.budget());
    info!("BLE scan started with callback {}", scan.callback_id());

    let scan_ref = &scan;
    let collected = collect_until(
        deadline,
        move || client.event_wait_and_get(scan_ref, SCAN_RESULT_EVENT, wait),
        |event| {
            debug!("Scan result: {:?}", event.data.get("result"));
            let services = scan_record_services(event);
            if !services.is_empty() {
                info!("Advertised services: {:?}", services);
            }
        },
    )
    .await;

    tokio::time::sleep(config.settle()).await;
    let stopped = bt.ble_stop_scan(&scan).await;
    let records = RecordList::from(collected?);
    stopped?;
    if records.is_empty() {
        warn!("BLE scan stopped without any results");
    } else {
        info!("BLE scan stopped after {} results", records.len());
    }

    records.write_to(&config.output_file)?;
    Ok(records)
}

/// BLE scan test. Passes whenever the scan runs to completion.
pub struct BleScanTest<'a> {
    bt: BluetoothSnippet<'a>,
    bluetooth: &'a BluetoothConfig,
    config: &'a BleScanConfig,
    records: Option<RecordList>,
}

impl<'a> BleScanTest<'a> {
    pub fn new(bt: BluetoothSnippet<'a>, bluetooth: &'a BluetoothConfig, config: &'a BleScanConfig) -> Self {
        Self {
            bt,
            bluetooth,
            config,
            records: None,
        }
    }

    /// Records from the last run, if it got that far.
    pub fn records(&self) -> Option<&RecordList> {
        self.records.as_ref()
    }
}

impl TestCase for BleScanTest<'_> {
    fn name(&self) -> &str {
        "test_ble_scan"
    }

    async fn setup_test(&mut self) -> Result<()> {
        self.bt.enable().await?;
        self.bt.set_name(&self.bluetooth.advertised_name).await?;
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        self.records = Some(scan_and_record(&self.bt, self.config).await?);
        Ok(())
    }

    async fn teardown_test(&mut self) -> Result<()> {
        self.bt.disable().await?;
        Ok(())
    }
}

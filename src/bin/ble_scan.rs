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

//! Scan for BLE advertisements and dump every result to a file.
//!
//! Usage: cargo run --bin ble_scan

use anyhow::Result;
use snippet_bt_e2e::config::Config;
use snippet_bt_e2e::flows::BleScanTest;
use snippet_bt_e2e::runner::{acquire_target, exit_code, init_logging, run_test};
use snippet_bt_e2e::snippet::BluetoothSnippet;
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_logging();

    let config = Config::load()?;
    info!("Configuration loaded");

    let mut device = acquire_target(&config).await?;

    let result = {
        let bt = BluetoothSnippet::new(device.snippet(&config.device.snippet_name)?);
        let mut test = BleScanTest::new(bt, &config.bluetooth, &config.ble_scan);
        let result = run_test(&mut test).await;
        if let Some(records) = test.records() {
            info!(
                "{} scan records written to {:?}",
                records.len(),
                config.ble_scan.output_file
            );
        }
        result
    };

    device.unload_snippets().await;
    Ok(exit_code(&[result]))
}

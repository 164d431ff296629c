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

//! Discover the target headset, pair, exchange data over RFCOMM and unpair.
//!
//! Usage: cargo run --bin discover_pair

use anyhow::Result;
use snippet_bt_e2e::config::Config;
use snippet_bt_e2e::flows::DiscoverPairTest;
use snippet_bt_e2e::runner::{acquire_target, exit_code, init_logging, run_test};
use snippet_bt_e2e::snippet::BluetoothSnippet;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_logging();

    let config = Config::load()?;
    info!("Configuration loaded");

    let mut device = acquire_target(&config).await?;
    if config.discovery.post_load_delay_secs > 0 {
        info!(
            "{} Waiting {}s for the snippet to settle",
            device.log_prefix(),
            config.discovery.post_load_delay_secs
        );
        tokio::time::sleep(Duration::from_secs(config.discovery.post_load_delay_secs)).await;
    }

    let result = {
        let bt = BluetoothSnippet::new(device.snippet(&config.device.snippet_name)?);
        let mut test = DiscoverPairTest::new(bt, &config.bluetooth, &config.discovery);
        run_test(&mut test).await
    };

    device.unload_snippets().await;
    Ok(exit_code(&[result]))
}

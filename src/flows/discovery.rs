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

//! Bluetooth Classic flow: discover, pair, exchange over RFCOMM, unpair.

use anyhow::Result;
use tracing::{debug, info};

use super::poll::{poll_until, Deadline};
use crate::config::{BluetoothConfig, DiscoveryConfig};
use crate::runner::{assert_true, fail, TestCase};
use crate::snippet::{
    BluetoothSnippet, BondState, DeviceInfo, RfcommData, SnippetEvent, DISCOVERY_EVENT,
    PAIRING_EVENT, RFCOMM_DATA_EVENT,
};

fn bond_state_reached(event: &SnippetEvent, wanted: &BondState) -> Option<()> {
    let device = DeviceInfo::from_event(event)?;
    debug!(
        "Bond state of {:?}: {:?}",
        device.address.as_deref().unwrap_or("?"),
        device.bond_state
    );
    (device.bond_state.as_ref() == Some(wanted)).then_some(())
}

/// Discover the target, pair with it, exchange data over RFCOMM and unpair.
///
/// Discovery, pairing and unpairing all draw on one budget that starts when
/// discovery starts.
pub async fn discover_pair_exchange(bt: &BluetoothSnippet<'_>, config: &DiscoveryConfig) -> Result<()> {
    let service = config.rfcomm_service()?;
    let wait = config.wait_timeout();
    let client = bt.client();

    let name = bt.name().await?;
    info!("Scan for {}s with name \"{}\"", config.budget_secs, name);

    let discovery = bt.start_discovery().await?;
    let deadline = Deadline::after(config.budget());
    debug!("Discovery started with callback {}", discovery);

    let discovery_ref = &discovery;
    let found = poll_until(
        deadline,
        move || client.event_wait_and_get(discovery_ref, DISCOVERY_EVENT, wait),
        |event| {
            let device = DeviceInfo::from_event(event)?;
            debug!("Discovered {:?} at {:?}", device.name, device.address);
            if device.name.as_deref() == Some(config.target_name.as_str()) {
                device.address
            } else {
                None
            }
        },
    )
    .await;
    // Discovery is cancelled whether or not the target showed up.
    let cancelled = bt.cancel_discovery(&discovery).await;
    let address = found?.matched();
    cancelled?;

    let address = match address {
        Some(address) => address,
        None => return Err(fail("Device not found")),
    };
    info!("Found {} at {}", config.target_name, address);

    let pairing = bt.pair(&address).await?;
    let pairing_ref = &pairing;
    let bonded = poll_until(
        deadline,
        move || client.event_wait_and_get(pairing_ref, PAIRING_EVENT, wait),
        |event| bond_state_reached(event, &BondState::Bonded),
    )
    .await?;
    assert_true(bonded.matched().is_some(), "Pairing failed")?;
    info!("Paired with {} ({:?} of budget left)", address, deadline.remaining());

    let channel = bt.rfcomm_connect(&address, &service).await?;
    info!("RFCOMM connected to {} on {}", address, service);
    let exchange = async {
        match client.event_wait_and_get(&channel, RFCOMM_DATA_EVENT, wait).await? {
            Some(event) => {
                let received = RfcommData::from_event(&event).unwrap_or_default();
                info!("RFCOMM data received: {:?}", received.data);
            }
            None => return Err(fail("RFCOMM data not received")),
        }
        bt.rfcomm_send(&channel, &config.rfcomm_payload).await?;
        tokio::time::sleep(config.rfcomm_settle()).await;
        Ok::<_, anyhow::Error>(())
    }
    .await;
    let disconnected = bt.rfcomm_disconnect(&channel).await;
    exchange?;
    disconnected?;
    info!("RFCOMM channel to {} closed", address);

    let unpairing = bt.unpair(&address).await?;
    let unpairing_ref = &unpairing;
    let unbonded = poll_until(
        deadline,
        move || client.event_wait_and_get(unpairing_ref, PAIRING_EVENT, wait),
        |event| bond_state_reached(event, &BondState::None),
    )
    .await?;
    assert_true(unbonded.matched().is_some(), "Unpairing failed")?;
    info!("Unpaired {}", address);

    Ok(())
}

/// Discovery-and-pair test against one target device.
pub struct DiscoverPairTest<'a> {
    bt: BluetoothSnippet<'a>,
    bluetooth: &'a BluetoothConfig,
    config: &'a DiscoveryConfig,
}

impl<'a> DiscoverPairTest<'a> {
    pub fn new(bt: BluetoothSnippet<'a>, bluetooth: &'a BluetoothConfig, config: &'a DiscoveryConfig) -> Self {
        Self {
            bt,
            bluetooth,
            config,
        }
    }
}

impl TestCase for DiscoverPairTest<'_> {
    fn name(&self) -> &str {
        "test_discover_pair"
    }

    async fn setup_test(&mut self) -> Result<()> {
        self.bt.enable().await?;
        self.bt.set_name(&self.bluetooth.advertised_name).await?;
        Ok(())
    }

    async fn run(&mut self) -> Result<()> {
        discover_pair_exchange(&self.bt, self.config).await
    }

    async fn teardown_test(&mut self) -> Result<()> {
        self.bt.disable().await?;
        Ok(())
    }
}

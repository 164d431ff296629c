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

//! Bluetooth RPCs exposed by the bundled snippet agent, and typed views of
//! the events they post.

use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::callback::CallbackHandle;
use super::client::SnippetClient;
use super::error::{Result, SnippetError};
use super::protocol::SnippetEvent;

/// Event posted for each device found during classic discovery.
pub const DISCOVERY_EVENT: &str = "onDiscoveryReceive";
/// Event posted on pairing requests and bond state changes.
pub const PAIRING_EVENT: &str = "onPairingEvent";
/// Event posted for each chunk read from an RFCOMM socket.
pub const RFCOMM_DATA_EVENT: &str = "onRfcommDataReceived";
/// Event posted for each BLE scan result.
pub const SCAN_RESULT_EVENT: &str = "onScanResult";

/// Bond state as serialized by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum BondState {
    #[serde(rename = "BOND_NONE")]
    None,
    #[serde(rename = "BOND_BONDING")]
    Bonding,
    #[serde(rename = "BOND_BONDED")]
    Bonded,
    #[serde(other)]
    Unknown,
}

/// Serialized `BluetoothDevice`.
///
/// Every field is optional: unnamed devices are routine during discovery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceInfo {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Address", default)]
    pub address: Option<String>,
    #[serde(rename = "BondState", default)]
    pub bond_state: Option<BondState>,
}

impl DeviceInfo {
    /// Device carried under `data.device`, if the event has one.
    pub fn from_event(event: &SnippetEvent) -> Option<Self> {
        event
            .data
            .get("device")
            .and_then(|device| serde_json::from_value(device.clone()).ok())
    }
}

/// Payload of an RFCOMM data event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RfcommData {
    #[serde(rename = "Address", default)]
    pub address: Option<String>,
    #[serde(rename = "UUID", default)]
    pub uuid: Option<String>,
    #[serde(rename = "Data", default)]
    pub data: Option<String>,
}

impl RfcommData {
    pub fn from_event(event: &SnippetEvent) -> Option<Self> {
        serde_json::from_value(Value::Object(event.data.clone())).ok()
    }
}

/// Service UUIDs advertised in a BLE scan record, as strings.
///
/// Empty when the event has no scan record.
pub fn scan_record_services(event: &SnippetEvent) -> Vec<String> {
    event
        .data
        .get("result")
        .and_then(|result| result.get("ScanRecord"))
        .and_then(|record| record.get("Services"))
        .and_then(Value::as_array)
        .map(|services| {
            services
                .iter()
                .map(|s| match s {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Bluetooth RPC surface of a loaded snippet agent.
pub struct BluetoothSnippet<'a> {
    client: &'a SnippetClient,
}

impl<'a> BluetoothSnippet<'a> {
    pub fn new(client: &'a SnippetClient) -> Self {
        Self { client }
    }

    /// Underlying client, for event waits.
    pub fn client(&self) -> &'a SnippetClient {
        self.client
    }

    pub async fn enable(&self) -> Result<()> {
        self.client.rpc("btEnable", vec![]).await?;
        Ok(())
    }

    pub async fn disable(&self) -> Result<()> {
        self.client.rpc("btDisable", vec![]).await?;
        Ok(())
    }

    pub async fn set_name(&self, name: &str) -> Result<()> {
        self.client.rpc("btSetName", vec![json!(name)]).await?;
        Ok(())
    }

    pub async fn name(&self) -> Result<String> {
        match self.client.rpc("btGetName", vec![]).await? {
            Value::String(name) => Ok(name),
            other => Err(SnippetError::Protocol(format!(
                "btGetName returned non-string {}",
                other
            ))),
        }
    }

    /// Start classic discovery. Posts [`DISCOVERY_EVENT`].
    pub async fn start_discovery(&self) -> Result<CallbackHandle> {
        self.client.async_rpc("boseDiscover", vec![]).await
    }

    pub async fn cancel_discovery(&self, handle: &CallbackHandle) -> Result<()> {
        self.client
            .rpc("boseCancelDiscover", vec![json!(handle.callback_id())])
            .await?;
        Ok(())
    }

    /// Bond with a previously discovered device. Posts [`PAIRING_EVENT`].
    pub async fn pair(&self, address: &str) -> Result<CallbackHandle> {
        self.client.async_rpc("bosePairDevice", vec![json!(address)]).await
    }

    /// Remove an existing bond. Posts [`PAIRING_EVENT`].
    pub async fn unpair(&self, address: &str) -> Result<CallbackHandle> {
        self.client
            .async_rpc("boseUnpairDevice", vec![json!(address)])
            .await
    }

    /// Open an RFCOMM channel to `service` on a bonded device. Posts
    /// [`RFCOMM_DATA_EVENT`] for every read from the socket.
    pub async fn rfcomm_connect(&self, address: &str, service: &Uuid) -> Result<CallbackHandle> {
        self.client
            .async_rpc(
                "boseRfcommConnect",
                vec![json!(address), json!(service.hyphenated().to_string())],
            )
            .await
    }

    pub async fn rfcomm_send(&self, handle: &CallbackHandle, data: &str) -> Result<()> {
        self.client
            .rpc("boseRfcommSend", vec![json!(handle.callback_id()), json!(data)])
            .await?;
        Ok(())
    }

    pub async fn rfcomm_disconnect(&self, handle: &CallbackHandle) -> Result<()> {
        self.client
            .rpc("boseRfcommDisconnect", vec![json!(handle.callback_id())])
            .await?;
        Ok(())
    }

    /// Start an unfiltered BLE scan with default settings. Posts
    /// [`SCAN_RESULT_EVENT`].
    pub async fn ble_start_scan(&self) -> Result<CallbackHandle> {
        self.client
            .async_rpc("bleStartScan", vec![Value::Null, Value::Null])
            .await
    }

    pub async fn ble_stop_scan(&self, handle: &CallbackHandle) -> Result<()> {
        self.client
            .rpc("bleStopScan", vec![json!(handle.callback_id())])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn event(name: &str, data: Value) -> SnippetEvent {
        let data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        SnippetEvent {
            callback_id: "1-1".to_string(),
            name: name.to_string(),
            creation_time: 0,
            data,
        }
    }

    #[test]
    fn test_device_info_from_discovery_event() {
        let ev = event(
            DISCOVERY_EVENT,
            json!({"device": {"Name": "Mathers-C1", "Address": "AA:BB:CC:DD:EE:FF", "BondState": "BOND_NONE"}}),
        );
        let device = DeviceInfo::from_event(&ev).unwrap();
        assert_eq!(device.name.as_deref(), Some("Mathers-C1"));
        assert_eq!(device.address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(device.bond_state, Some(BondState::None));
    }

    #[test]
    fn test_device_info_unnamed_device() {
        let ev = event(DISCOVERY_EVENT, json!({"device": {"Address": "11:22:33:44:55:66"}}));
        let device = DeviceInfo::from_event(&ev).unwrap();
        assert!(device.name.is_none());

        let ev = event(DISCOVERY_EVENT, json!({"other": 1}));
        assert!(DeviceInfo::from_event(&ev).is_none());
    }

    #[test]
    fn test_bond_state_unknown_value() {
        let ev = event(PAIRING_EVENT, json!({"device": {"BondState": "BOND_WEIRD"}}));
        let device = DeviceInfo::from_event(&ev).unwrap();
        assert_eq!(device.bond_state, Some(BondState::Unknown));
    }

    #[test]
    fn test_rfcomm_data() {
        let ev = event(
            RFCOMM_DATA_EVENT,
            json!({"Address": "AA:BB:CC:DD:EE:FF", "UUID": "76d871a5-adc0-4c61-9cb7-911e2027c929", "Data": "hi"}),
        );
        let data = RfcommData::from_event(&ev).unwrap();
        assert_eq!(data.data.as_deref(), Some("hi"));
    }

    #[test]
    fn test_scan_record_services() {
        let ev = event(
            SCAN_RESULT_EVENT,
            json!({"result": {"ScanRecord": {"Services": ["0000fe2c-0000-1000-8000-00805f9b34fb"]}}}),
        );
        assert_eq!(
            scan_record_services(&ev),
            vec!["0000fe2c-0000-1000-8000-00805f9b34fb".to_string()]
        );

        let ev = event(SCAN_RESULT_EVENT, json!({"result": {"ScanRecord": {"Services": []}}}));
        assert!(scan_record_services(&ev).is_empty());

        let ev = event(SCAN_RESULT_EVENT, json!({}));
        assert!(scan_record_services(&ev).is_empty());
    }
}

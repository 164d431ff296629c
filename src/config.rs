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

//! Configuration module.
//!
//! Handles loading settings for the device, the snippet session and each flow.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// Environment variable pointing at an alternative config file.
pub const CONFIG_ENV: &str = "SNIPPET_BT_E2E_CONFIG";

/// Environment variable adb itself honours for device selection.
pub const SERIAL_ENV: &str = "ANDROID_SERIAL";

/// Bundled snippet agent package.
pub const MBS_PACKAGE: &str = "com.google.android.mobly.snippet.bundled";

/// Run configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device and snippet loading settings.
    pub device: DeviceConfig,

    /// Radio settings applied before every test.
    pub bluetooth: BluetoothConfig,

    /// Snippet session settings.
    pub snippet: SnippetConfig,

    /// Classic discovery, pairing and RFCOMM flow.
    pub discovery: DiscoveryConfig,

    /// BLE scan flow.
    pub ble_scan: BleScanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial of the device to drive. Unset picks the only attached device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,

    /// adb executable.
    pub adb_path: PathBuf,

    /// Name the snippet is registered under.
    pub snippet_name: String,

    /// Package hosting the snippet agent.
    pub snippet_package: String,

    /// How long to wait for the snippet runner to report its port.
    pub launch_timeout_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: None,
            adb_path: PathBuf::from("adb"),
            snippet_name: "mbs".to_string(),
            snippet_package: MBS_PACKAGE.to_string(),
            launch_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Name the target advertises while discoverable.
    pub advertised_name: String,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            advertised_name: "LookForMe!".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetConfig {
    /// Upper bound on waiting for any single RPC response.
    pub rpc_timeout_secs: u64,
}

impl Default for SnippetConfig {
    fn default() -> Self {
        Self {
            rpc_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Delay after loading the snippet before the first test.
    pub post_load_delay_secs: u64,

    /// Budget shared by discovery, pairing and unpairing.
    pub budget_secs: u64,

    /// Timeout of each individual event wait.
    pub wait_timeout_secs: u64,

    /// Advertised name of the remote device to pair with.
    pub target_name: String,

    /// RFCOMM service record to connect to.
    pub rfcomm_uuid: String,

    /// Text sent over the RFCOMM channel.
    pub rfcomm_payload: String,

    /// Pause between sending and disconnecting.
    pub rfcomm_settle_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            post_load_delay_secs: 10,
            budget_secs: 10,
            wait_timeout_secs: 10,
            target_name: "Mathers-C1".to_string(),
            rfcomm_uuid: "76d871a5-adc0-4c61-9cb7-911e2027c929".to_string(),
            rfcomm_payload: "Helloworld".to_string(),
            rfcomm_settle_ms: 2000,
        }
    }
}

impl DiscoveryConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn rfcomm_settle(&self) -> Duration {
        Duration::from_millis(self.rfcomm_settle_ms)
    }

    pub fn rfcomm_service(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.rfcomm_uuid)
            .with_context(|| format!("invalid RFCOMM service uuid {:?}", self.rfcomm_uuid))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BleScanConfig {
    /// How long to keep collecting scan results.
    pub budget_secs: u64,

    /// Timeout of each individual event wait.
    pub wait_timeout_secs: u64,

    /// Pause before stopping the scan.
    pub settle_secs: u64,

    /// Where collected scan records are written.
    pub output_file: PathBuf,
}

impl Default for BleScanConfig {
    fn default() -> Self {
        Self {
            budget_secs: 60,
            wait_timeout_secs: 10,
            settle_secs: 5,
            output_file: PathBuf::from("record_list.txt"),
        }
    }
}

impl BleScanConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_secs(self.budget_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_secs)
    }
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snippet-bt-e2e")
            .join("config.toml")
    }

    /// Load configuration from file or create default.
    ///
    /// `SNIPPET_BT_E2E_CONFIG` overrides the path and `ANDROID_SERIAL`
    /// overrides the device serial.
    pub fn load() -> Result<Self> {
        Self::load_from(
            std::env::var_os(CONFIG_ENV).map(PathBuf::from),
            std::env::var(SERIAL_ENV).ok(),
        )
    }

    /// Load from `path` (or the default location), writing defaults there on
    /// first run, then apply a non-empty `serial` override.
    ///
    /// The serial override is never written back to the file.
    pub fn load_from(path: Option<PathBuf>, serial: Option<String>) -> Result<Self> {
        let config_path = path.unwrap_or_else(Self::default_path);

        let mut config = if config_path.exists() {
            Self::from_file(&config_path)?
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            config
        };

        if let Some(serial) = serial.filter(|s| !s.is_empty()) {
            config.device.serial = Some(serial);
        }

        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.snippet.rpc_timeout_secs)
    }
}

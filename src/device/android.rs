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

//! Controlled Android device and the snippet agents loaded onto it.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout};
use tracing::{debug, info, warn};

use super::adb::{parse_launch_line, select_device, Adb, AdbError, LaunchLine};
use crate::config::DeviceConfig;
use crate::snippet::protocol::PROTOCOL_MAJOR;
use crate::snippet::SnippetClient;

/// A snippet agent running on the device.
struct LoadedSnippet {
    package: String,
    host_port: u16,
    client: SnippetClient,
    process: Child,
    // Held so the runner never sees a closed pipe.
    _output: Lines<BufReader<ChildStdout>>,
}

/// Handle to the single device a test drives.
pub struct AndroidDevice {
    serial: String,
    debug_tag: String,
    adb: Adb,
    launch_timeout: Duration,
    snippets: HashMap<String, LoadedSnippet>,
}

impl AndroidDevice {
    /// Find the device named in `config`, or the only attached one.
    pub async fn acquire(config: &DeviceConfig) -> Result<Self> {
        let adb = Adb::new(&config.adb_path);
        let devices = adb.devices().await?;
        let serial = select_device(&devices, config.serial.as_deref())?;
        info!("Using android device {}", serial);

        Ok(Self {
            adb: adb.for_serial(&serial),
            debug_tag: serial.clone(),
            serial,
            launch_timeout: Duration::from_secs(config.launch_timeout_secs),
            snippets: HashMap::new(),
        })
    }

    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn debug_tag(&self) -> &str {
        &self.debug_tag
    }

    /// Label used in log lines for this device.
    pub fn set_debug_tag(&mut self, tag: impl Into<String>) {
        self.debug_tag = tag.into();
    }

    /// Log prefix identifying this device.
    pub fn log_prefix(&self) -> String {
        if self.debug_tag == self.serial {
            format!("[AndroidDevice|{}]", self.serial)
        } else {
            format!("[AndroidDevice|{}|{}]", self.debug_tag, self.serial)
        }
    }

    /// Launch the snippet agent in `package` and register it as `name`.
    pub async fn load_snippet(&mut self, name: &str, package: &str, rpc_timeout: Duration) -> Result<()> {
        if self.snippets.contains_key(name) {
            bail!("{} snippet name {:?} is already in use", self.log_prefix(), name);
        }

        info!("{} Launching snippet {} as {:?}", self.log_prefix(), package, name);
        let mut process = self.adb.spawn_instrument(package, "start")?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| anyhow!("snippet runner stdout was not captured"))?;
        let mut output = BufReader::new(stdout).lines();

        let device_port = tokio::time::timeout(self.launch_timeout, wait_for_port(package, &mut output))
            .await
            .map_err(|_| AdbError::SnippetLaunch {
                package: package.to_string(),
                reason: format!("no serving port reported within {:?}", self.launch_timeout),
            })??;

        let host_port = self.adb.forward(device_port).await?;
        debug!(
            "{} Forwarded host port {} to device port {}",
            self.log_prefix(),
            host_port,
            device_port
        );

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, host_port));
        let client = match SnippetClient::connect(addr, rpc_timeout).await {
            Ok(client) => client,
            Err(e) => {
                if let Err(remove) = self.adb.remove_forward(host_port).await {
                    warn!("{} Failed to remove forward for {:?}: {}", self.log_prefix(), name, remove);
                }
                return Err(e).with_context(|| format!("failed to open snippet session for {}", package));
            }
        };

        self.snippets.insert(
            name.to_string(),
            LoadedSnippet {
                package: package.to_string(),
                host_port,
                client,
                process,
                _output: output,
            },
        );
        info!("{} Snippet {:?} loaded", self.log_prefix(), name);
        Ok(())
    }

    /// Client for a loaded snippet.
    pub fn snippet(&self, name: &str) -> Result<&SnippetClient> {
        self.snippets
            .get(name)
            .map(|s| &s.client)
            .ok_or_else(|| anyhow!("{} no snippet loaded as {:?}", self.log_prefix(), name))
    }

    /// Stop every loaded snippet and remove its port forward.
    ///
    /// Failures are logged; unloading always visits every snippet.
    pub async fn unload_snippets(&mut self) {
        let prefix = self.log_prefix();
        for (name, snippet) in self.snippets.drain() {
            let LoadedSnippet {
                package,
                host_port,
                client,
                mut process,
                ..
            } = snippet;
            drop(client);

            if let Err(e) = self.adb.remove_forward(host_port).await {
                warn!("{} Failed to remove forward for {:?}: {}", prefix, name, e);
            }

            match self.adb.spawn_instrument(&package, "stop") {
                Ok(mut stop) => {
                    if let Err(e) = stop.wait().await {
                        warn!("{} Failed to stop snippet {:?}: {}", prefix, name, e);
                    }
                }
                Err(e) => warn!("{} Failed to stop snippet {:?}: {}", prefix, name, e),
            }

            if tokio::time::timeout(Duration::from_secs(5), process.wait())
                .await
                .is_err()
            {
                let _ = process.kill().await;
            }
            info!("{} Snippet {:?} unloaded", prefix, name);
        }
    }
}

/// Read runner output until it reports the port it serves on.
async fn wait_for_port<R>(package: &str, output: &mut Lines<R>) -> std::result::Result<u16, AdbError>
where
    R: AsyncBufRead + Unpin,
{
    while let Some(line) = output.next_line().await? {
        match parse_launch_line(&line) {
            Some(LaunchLine::Start { major, minor }) => {
                debug!("Snippet runner speaks protocol {}.{}", major, minor);
                if major != PROTOCOL_MAJOR {
                    return Err(AdbError::SnippetLaunch {
                        package: package.to_string(),
                        reason: format!("unsupported protocol {}.{}", major, minor),
                    });
                }
            }
            Some(LaunchLine::Serving { port }) => return Ok(port),
            None => debug!("Snippet runner: {}", line),
        }
    }
    Err(AdbError::SnippetLaunch {
        package: package.to_string(),
        reason: "runner exited before serving".to_string(),
    })
}

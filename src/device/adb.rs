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

//! Thin async wrapper around the `adb` command line.

use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::{Child, Command};
use tracing::debug;

/// Instrumentation runner that hosts snippet agents.
pub const SNIPPET_RUNNER: &str = "com.google.android.mobly.snippet.SnippetRunner";

/// Errors raised while driving adb.
#[derive(Error, Debug)]
pub enum AdbError {
    #[error("failed to run adb: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("adb {args} exited with {status}: {stderr}")]
    CommandFailed {
        args: String,
        status: String,
        stderr: String,
    },

    #[error("no android device attached")]
    NoDevice,

    #[error("device {0} is not attached")]
    DeviceNotFound(String),

    #[error("{0} android devices attached; set ANDROID_SERIAL to pick one")]
    Ambiguous(usize),

    #[error("unexpected adb output: {0}")]
    UnexpectedOutput(String),

    #[error("snippet {package} failed to launch: {reason}")]
    SnippetLaunch { package: String, reason: String },
}

/// One row of `adb devices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedDevice {
    pub serial: String,
    pub state: String,
}

impl AttachedDevice {
    /// Whether adb can talk to the device.
    pub fn is_online(&self) -> bool {
        self.state == "device"
    }
}

/// Parse the output of `adb devices`.
pub fn parse_devices(output: &str) -> Vec<AttachedDevice> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            Some(AttachedDevice {
                serial: serial.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// Pick the device to drive: `wanted` if given, otherwise the only online one.
pub fn select_device(devices: &[AttachedDevice], wanted: Option<&str>) -> Result<String, AdbError> {
    let online: Vec<&AttachedDevice> = devices.iter().filter(|d| d.is_online()).collect();

    match wanted {
        Some(serial) => online
            .iter()
            .find(|d| d.serial == serial)
            .map(|d| d.serial.clone())
            .ok_or_else(|| AdbError::DeviceNotFound(serial.to_string())),
        None => match online.as_slice() {
            [] => Err(AdbError::NoDevice),
            [only] => Ok(only.serial.clone()),
            many => Err(AdbError::Ambiguous(many.len())),
        },
    }
}

/// Status lines printed by the snippet runner while starting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchLine {
    /// `SNIPPET START, PROTOCOL <major> <minor>`
    Start { major: u32, minor: u32 },
    /// `SNIPPET SERVING, PORT <port>`
    Serving { port: u16 },
}

/// Recognize a snippet runner status line. Other output yields `None`.
pub fn parse_launch_line(line: &str) -> Option<LaunchLine> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("SNIPPET START, PROTOCOL ") {
        let mut parts = rest.split_whitespace();
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        return Some(LaunchLine::Start { major, minor });
    }
    if let Some(rest) = line.strip_prefix("SNIPPET SERVING, PORT ") {
        let port = rest.trim().parse().ok()?;
        return Some(LaunchLine::Serving { port });
    }
    None
}

/// adb bound to an optional device serial.
#[derive(Debug, Clone)]
pub struct Adb {
    program: PathBuf,
    serial: Option<String>,
}

impl Adb {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            serial: None,
        }
    }

    /// Same adb, scoped to one device.
    pub fn for_serial(&self, serial: impl Into<String>) -> Self {
        Self {
            program: self.program.clone(),
            serial: Some(serial.into()),
        }
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd
    }

    /// Run adb to completion and return its stdout.
    pub async fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        debug!("adb {}", args.join(" "));
        let output = self.command(args).output().await?;
        if !output.status.success() {
            return Err(AdbError::CommandFailed {
                args: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub async fn devices(&self) -> Result<Vec<AttachedDevice>, AdbError> {
        Ok(parse_devices(&self.run(&["devices"]).await?))
    }

    /// Forward a free host port to `device_port` and return the host port.
    pub async fn forward(&self, device_port: u16) -> Result<u16, AdbError> {
        let remote = format!("tcp:{}", device_port);
        let output = self.run(&["forward", "tcp:0", remote.as_str()]).await?;
        output
            .trim()
            .parse()
            .map_err(|_| AdbError::UnexpectedOutput(output.trim().to_string()))
    }

    pub async fn remove_forward(&self, host_port: u16) -> Result<(), AdbError> {
        let local = format!("tcp:{}", host_port);
        self.run(&["forward", "--remove", local.as_str()]).await?;
        Ok(())
    }

    /// Spawn the snippet runner for `package` with the given action
    /// (`start` or `stop`), stdout piped.
    pub fn spawn_instrument(&self, package: &str, action: &str) -> Result<Child, AdbError> {
        let component = format!("{}/{}", package, SNIPPET_RUNNER);
        let child = self
            .command(&[
                "shell", "am", "instrument", "--user", "0", "-w", "-e", "action", action, component.as_str(),
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }
}

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

//! Snippet wire protocol definitions and serialization.
//!
//! Every frame is a single JSON object terminated by `\n`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::Result;

/// Snippet protocol major version spoken by this client.
pub const PROTOCOL_MAJOR: u32 = 1;

/// RPC used to block on a callback's event queue.
pub const EVENT_WAIT_METHOD: &str = "eventWaitAndGet";

/// Uid sent when opening a fresh session.
pub const UNKNOWN_UID: i64 = -1;

/// Handshake commands. Only fresh sessions are opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeCommand {
    Initiate,
}

/// First frame sent by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    pub cmd: HandshakeCommand,
    pub uid: i64,
}

impl Handshake {
    pub fn initiate() -> Self {
        Self {
            cmd: HandshakeCommand::Initiate,
            uid: UNKNOWN_UID,
        }
    }
}

/// Agent answer to the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeReply {
    pub status: bool,
    #[serde(default)]
    pub uid: Option<i64>,
}

/// RPC request frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    pub params: Vec<Value>,
}

impl Request {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }
}

/// RPC response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub result: Value,
    /// Callback id, set only for async RPCs.
    #[serde(default)]
    pub callback: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// An event posted by the agent against a callback id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetEvent {
    #[serde(rename = "callbackId")]
    pub callback_id: String,
    pub name: String,
    #[serde(rename = "creationTime", default)]
    pub creation_time: i64,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Serialize a frame to a JSON line.
pub fn to_line<T: Serialize>(frame: &T) -> Result<String> {
    let json = serde_json::to_string(frame)?;
    Ok(format!("{}\n", json))
}

/// Parse a frame from a JSON line.
pub fn from_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T> {
    Ok(serde_json::from_str(line.trim())?)
}

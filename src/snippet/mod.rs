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

//! Snippet agent communication module.
//!
//! Speaks the line-delimited JSON RPC protocol of the on-device snippet agent.

mod bluetooth;
mod callback;
mod client;
mod error;
pub mod protocol;

pub use bluetooth::{
    scan_record_services, BluetoothSnippet, BondState, DeviceInfo, RfcommData, DISCOVERY_EVENT,
    PAIRING_EVENT, RFCOMM_DATA_EVENT, SCAN_RESULT_EVENT,
};
pub use callback::CallbackHandle;
pub use client::SnippetClient;
pub use error::{SnippetError, EVENT_TIMEOUT_MARKER};
pub use protocol::SnippetEvent;

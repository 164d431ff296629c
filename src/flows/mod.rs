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

//! End-to-end Bluetooth test flows.

mod ble_scan;
mod discovery;
pub mod poll;

pub use ble_scan::{scan_and_record, BleScanTest};
pub use discovery::{discover_pair_exchange, DiscoverPairTest};
pub use poll::{collect_until, poll_until, Deadline, PollOutcome};

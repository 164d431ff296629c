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

//! Handles for in-flight async RPCs.

use std::fmt;

/// Correlation token returned by an async RPC.
///
/// Every event wait for the operation and the matching cancel/stop call use
/// the same handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackHandle {
    callback_id: String,
    method: String,
}

impl CallbackHandle {
    pub fn new(callback_id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            callback_id: callback_id.into(),
            method: method.into(),
        }
    }

    pub fn callback_id(&self) -> &str {
        &self.callback_id
    }

    /// Name of the RPC that created this handle.
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.callback_id, self.method)
    }
}

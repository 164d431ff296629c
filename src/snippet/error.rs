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

//! Snippet client errors.

use std::time::Duration;
use thiserror::Error;

/// Marker the snippet agent puts in the error text when `eventWaitAndGet`
/// gives up without an event.
pub const EVENT_TIMEOUT_MARKER: &str = "EventSnippetException: timeout.";

/// Errors raised while talking to a snippet agent.
#[derive(Error, Debug)]
pub enum SnippetError {
    /// Socket-level failure.
    #[error("snippet transport error: {0}")]
    Io(#[from] std::io::Error),

    /// A line could not be encoded or decoded as JSON.
    #[error("snippet codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// The agent refused the `initiate` handshake.
    #[error("snippet handshake rejected")]
    HandshakeRejected,

    /// The agent closed the connection.
    #[error("snippet connection closed by remote")]
    Closed,

    /// The agent answered with something the protocol does not allow.
    #[error("snippet protocol error: {0}")]
    Protocol(String),

    /// The agent executed the call and reported a failure.
    #[error("rpc {method} failed: {message}")]
    Rpc { method: String, message: String },

    /// No response arrived within the client-side read bound.
    #[error("rpc {method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },
}

impl SnippetError {
    /// Whether this is the agent reporting an event wait that ran out of time.
    pub fn is_event_timeout(&self) -> bool {
        matches!(self, Self::Rpc { message, .. } if message.contains(EVENT_TIMEOUT_MARKER))
    }
}

pub type Result<T> = std::result::Result<T, SnippetError>;

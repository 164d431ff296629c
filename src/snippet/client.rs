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

//! Snippet RPC client over a forwarded TCP port.

use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::callback::CallbackHandle;
use super::error::{Result, SnippetError};
use super::protocol::{
    from_line, to_line, Handshake, HandshakeReply, Request, Response, SnippetEvent,
    EVENT_WAIT_METHOD,
};

struct Channel {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    // Bytes of a line whose read was cut short by a timeout are kept here.
    line_buf: Vec<u8>,
}

impl Channel {
    async fn send(&mut self, line: &str) -> Result<()> {
        debug!("Sending: {}", line.trim());
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<String> {
        if self.reader.read_until(b'\n', &mut self.line_buf).await? == 0 {
            return Err(SnippetError::Closed);
        }
        let line = String::from_utf8_lossy(&self.line_buf).into_owned();
        self.line_buf.clear();
        debug!("Received: {}", line.trim());
        Ok(line)
    }
}

/// Client for one snippet agent session.
///
/// Calls are serialized: one request/response pair is in flight at a time.
pub struct SnippetClient {
    channel: Mutex<Channel>,
    next_id: AtomicU64,
    uid: Option<i64>,
    rpc_timeout: Duration,
}

impl SnippetClient {
    /// Connect to an agent listening on `addr` and open a session.
    pub async fn connect(addr: SocketAddr, rpc_timeout: Duration) -> Result<Self> {
        info!("Connecting to snippet agent at {}", addr);
        let stream = TcpStream::connect(addr).await?;
        Self::from_stream(stream, rpc_timeout).await
    }

    /// Open a session over an already-connected stream.
    pub async fn from_stream(stream: TcpStream, rpc_timeout: Duration) -> Result<Self> {
        let (reader, writer) = stream.into_split();
        let mut channel = Channel {
            reader: BufReader::new(reader),
            writer,
            line_buf: Vec::new(),
        };

        channel.send(&to_line(&Handshake::initiate())?).await?;
        let reply: HandshakeReply = match tokio::time::timeout(rpc_timeout, channel.recv()).await {
            Ok(line) => from_line(&line?)?,
            Err(_) => {
                return Err(SnippetError::Timeout {
                    method: "initiate".to_string(),
                    timeout: rpc_timeout,
                })
            }
        };
        if !reply.status {
            return Err(SnippetError::HandshakeRejected);
        }
        info!("Snippet session established (uid {:?})", reply.uid);

        Ok(Self {
            channel: Mutex::new(channel),
            next_id: AtomicU64::new(0),
            uid: reply.uid,
            rpc_timeout,
        })
    }

    /// Session uid assigned by the agent.
    pub fn uid(&self) -> Option<i64> {
        self.uid
    }

    /// Call a synchronous RPC and return its result.
    pub async fn rpc(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let response = self.call(method, params, self.rpc_timeout).await?;
        Ok(response.result)
    }

    /// Call an async RPC and return the handle for its event stream.
    ///
    /// The agent prepends the callback id to the parameters itself.
    pub async fn async_rpc(&self, method: &str, params: Vec<Value>) -> Result<CallbackHandle> {
        let response = self.call(method, params, self.rpc_timeout).await?;
        let callback_id = response.callback.ok_or_else(|| {
            SnippetError::Protocol(format!("async rpc {} returned no callback id", method))
        })?;
        debug!("{} started callback {}", method, callback_id);
        Ok(CallbackHandle::new(callback_id, method))
    }

    /// Wait up to `timeout` for the next `event_name` event on `handle`.
    ///
    /// Returns `None` when the agent reports that the wait ran out of time.
    pub async fn event_wait_and_get(
        &self,
        handle: &CallbackHandle,
        event_name: &str,
        timeout: Duration,
    ) -> Result<Option<SnippetEvent>> {
        let params = vec![
            Value::from(handle.callback_id()),
            Value::from(event_name),
            Value::from(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)),
        ];
        // The agent blocks for up to `timeout` before answering.
        match self
            .call(EVENT_WAIT_METHOD, params, timeout.saturating_add(self.rpc_timeout))
            .await
        {
            Ok(response) => Ok(Some(serde_json::from_value(response.result)?)),
            Err(e) if e.is_event_timeout() => {
                debug!("No {} event on {} within {:?}", event_name, handle, timeout);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn call(&self, method: &str, params: Vec<Value>, read_timeout: Duration) -> Result<Response> {
        let mut channel = self.channel.lock().await;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        channel.send(&to_line(&Request::new(id, method, params))?).await?;

        let response = match tokio::time::timeout(read_timeout, Self::recv_response(&mut *channel, id)).await {
            Ok(response) => response?,
            Err(_) => {
                return Err(SnippetError::Timeout {
                    method: method.to_string(),
                    timeout: read_timeout,
                })
            }
        };

        if let Some(message) = response.error {
            return Err(SnippetError::Rpc {
                method: method.to_string(),
                message,
            });
        }

        Ok(response)
    }

    /// Read until the response to request `id` arrives.
    ///
    /// Responses to earlier requests whose client-side read already timed
    /// out are discarded.
    async fn recv_response(channel: &mut Channel, id: u64) -> Result<Response> {
        loop {
            let line = channel.recv().await?;
            let response: Response = from_line(&line)?;
            if response.id == id {
                return Ok(response);
            }
            if response.id > id {
                return Err(SnippetError::Protocol(format!(
                    "response id {} does not match request id {}",
                    response.id, id
                )));
            }
            debug!("Dropping late response to request {}", response.id);
        }
    }
}

//! In-process fake of the on-device snippet agent.

#![allow(dead_code)]

use serde_json::{json, Value};
use snippet_bt_e2e::snippet::{SnippetClient, EVENT_TIMEOUT_MARKER};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// RPC timeout used by test clients.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest the fake blocks an event wait that has nothing to deliver.
const EMPTY_WAIT: Duration = Duration::from_millis(20);

const ASYNC_METHODS: &[&str] = &[
    "boseDiscover",
    "bosePairDevice",
    "boseUnpairDevice",
    "boseRfcommConnect",
    "bleStartScan",
];

/// One RPC the fake received.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: String,
    pub params: Vec<Value>,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    events: HashMap<String, VecDeque<Value>>,
    errors: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    name: String,
    next_callback: u64,
    next_event_time: i64,
}

/// Fake snippet agent listening on a loopback port.
pub struct FakeSnippet {
    pub addr: SocketAddr,
    state: Arc<Mutex<State>>,
}

impl FakeSnippet {
    pub async fn start() -> Self {
        Self::start_with_handshake(true).await
    }

    /// Start a fake that answers the handshake with `status`.
    pub async fn start_with_handshake(status: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State {
            name: "Pixel".to_string(),
            ..Default::default()
        }));

        let server_state = state.clone();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                serve(stream, status, server_state).await;
            }
        });

        Self { addr, state }
    }

    /// Connect a client to this fake.
    pub async fn client(&self) -> SnippetClient {
        SnippetClient::connect(self.addr, RPC_TIMEOUT).await.unwrap()
    }

    /// Queue an event with payload `data` for the next wait on `name`.
    pub fn push_event(&self, name: &str, data: Value) {
        self.state
            .lock()
            .unwrap()
            .events
            .entry(name.to_string())
            .or_default()
            .push_back(data);
    }

    /// Make every call to `method` fail with `message`.
    pub fn fail_method(&self, method: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .errors
            .insert(method.to_string(), message.to_string());
    }

    /// Hold back the next response to `method` for `delay`.
    pub fn delay_response(&self, method: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(method.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.method == method).count()
    }

    /// Called methods in order, without event waits.
    pub fn actions(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.method != "eventWaitAndGet")
            .map(|c| c.method)
            .collect()
    }
}

/// Discovery event payload for a device.
pub fn discovered(name: &str, address: &str) -> Value {
    json!({"device": {"Name": name, "Address": address, "BondState": "BOND_NONE"}})
}

/// Pairing event payload with the given bond state.
pub fn bond_state(address: &str, state: &str) -> Value {
    json!({"device": {"Name": "Mathers-C1", "Address": address, "BondState": state}})
}

async fn serve(stream: TcpStream, handshake_status: bool, state: Arc<Mutex<State>>) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    if lines.next_line().await.ok().flatten().is_none() {
        return;
    }
    let reply = json!({"status": handshake_status, "uid": 1});
    if writer.write_all(format!("{}\n", reply).as_bytes()).await.is_err() || !handshake_status {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let request: Value = serde_json::from_str(&line).unwrap();
        let id = request["id"].as_u64().unwrap();
        let method = request["method"].as_str().unwrap().to_string();
        let params = request["params"].as_array().cloned().unwrap_or_default();

        let response = if method == "eventWaitAndGet" {
            wait_for_event(id, &params, &state).await
        } else {
            handle_call(id, &method, &params, &state)
        };

        let delay = state.lock().unwrap().delays.remove(&method);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if writer
            .write_all(format!("{}\n", response).as_bytes())
            .await
            .is_err()
        {
            return;
        }
    }
}

fn handle_call(id: u64, method: &str, params: &[Value], state: &Mutex<State>) -> Value {
    let mut state = state.lock().unwrap();
    state.calls.push(Call {
        method: method.to_string(),
        params: params.to_vec(),
    });

    if let Some(message) = state.errors.get(method) {
        return json!({"id": id, "result": null, "callback": null, "error": message});
    }

    let result = match method {
        "btSetName" => {
            state.name = params[0].as_str().unwrap_or_default().to_string();
            Value::Bool(true)
        }
        "btGetName" => Value::String(state.name.clone()),
        _ => Value::Null,
    };

    if ASYNC_METHODS.contains(&method) {
        state.next_callback += 1;
        let callback = format!("{}-1", state.next_callback);
        json!({"id": id, "result": result, "callback": callback, "error": null})
    } else {
        json!({"id": id, "result": result, "callback": null, "error": null})
    }
}

async fn wait_for_event(id: u64, params: &[Value], state: &Mutex<State>) -> Value {
    let callback_id = params[0].as_str().unwrap_or_default().to_string();
    let name = params[1].as_str().unwrap_or_default().to_string();
    let timeout = Duration::from_millis(params[2].as_u64().unwrap_or(0));

    let event = {
        let mut state = state.lock().unwrap();
        state.calls.push(Call {
            method: "eventWaitAndGet".to_string(),
            params: params.to_vec(),
        });
        if let Some(message) = state.errors.get("eventWaitAndGet") {
            let message = message.clone();
            return json!({"id": id, "result": null, "callback": null, "error": message});
        }
        let data = state.events.get_mut(&name).and_then(VecDeque::pop_front);
        data.map(|data| {
            state.next_event_time += 1;
            json!({
                "callbackId": callback_id,
                "name": name,
                "creationTime": state.next_event_time,
                "data": data,
            })
        })
    };

    match event {
        Some(event) => json!({"id": id, "result": event, "callback": null, "error": null}),
        None => {
            tokio::time::sleep(timeout.min(EMPTY_WAIT)).await;
            let message = format!(
                "com.google.android.mobly.snippet.event.EventSnippet${}",
                EVENT_TIMEOUT_MARKER
            );
            json!({"id": id, "result": null, "callback": null, "error": message})
        }
    }
}

//! Shared test helpers: an in-process engine speaking the framed protocol.

use serde_json::{json, Value};
use std::io::BufReader;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::protocol::framing::{self, Frame};
use crate::protocol::ProtocolClient;

/// What the fake engine answers to a request.
pub(crate) enum Reply {
    Result(Value),
    Error(i64, String),
    /// Answer after sleeping; the engine reads nothing meanwhile.
    Delayed(Duration, Value),
    /// Never answer.
    Silent,
}

/// One message the fake engine received.
#[derive(Debug, Clone)]
pub(crate) struct Received {
    pub(crate) method: String,
    pub(crate) id: Option<u64>,
    pub(crate) params: Value,
}

/// Engine side of a socket pair, served on a background thread.
pub(crate) struct FakeEngine {
    log: Arc<Mutex<Vec<Received>>>,
    socket: UnixStream,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FakeEngine {
    /// Start a fake engine and a client connected to it.
    pub(crate) fn connect<F>(language: &str, handler: F) -> (ProtocolClient, FakeEngine)
    where
        F: FnMut(&str, &Value) -> Reply + Send + 'static,
    {
        let (client_side, engine_side) = UnixStream::pair().unwrap();
        let client = ProtocolClient::from_streams(
            language,
            client_side.try_clone().unwrap(),
            client_side,
        )
        .with_shutdown_timeout(Duration::from_millis(100));

        let engine = Self::serve(engine_side, handler);
        (client, engine)
    }

    fn serve<F>(socket: UnixStream, mut handler: F) -> FakeEngine
    where
        F: FnMut(&str, &Value) -> Reply + Send + 'static,
    {
        let log = Arc::new(Mutex::new(Vec::new()));
        let control = socket.try_clone().unwrap();
        let reader = socket.try_clone().unwrap();
        let mut writer = socket;
        let thread_log = Arc::clone(&log);

        let thread = thread::spawn(move || {
            let mut reader = BufReader::new(reader);
            loop {
                let value = match framing::read_frame(&mut reader) {
                    Ok(Some(Frame::Message(value))) => value,
                    Ok(Some(Frame::Malformed(_))) => continue,
                    _ => break,
                };

                let method = value["method"].as_str().unwrap_or_default().to_string();
                let id = value.get("id").cloned();
                let params = value.get("params").cloned().unwrap_or(Value::Null);
                thread_log.lock().unwrap().push(Received {
                    method: method.clone(),
                    id: id.as_ref().and_then(Value::as_u64),
                    params: params.clone(),
                });

                if method == "exit" {
                    break;
                }
                let Some(id) = id else { continue };

                let reply = match handler(&method, &params) {
                    Reply::Result(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
                    Reply::Error(code, message) => json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": code, "message": message}
                    }),
                    Reply::Delayed(delay, result) => {
                        thread::sleep(delay);
                        json!({"jsonrpc": "2.0", "id": id, "result": result})
                    }
                    Reply::Silent => continue,
                };
                let body = serde_json::to_vec(&reply).unwrap();
                if framing::write_message(&mut writer, &body).is_err() {
                    break;
                }
            }
            let _ = writer.shutdown(Shutdown::Both);
        });

        FakeEngine {
            log,
            socket: control,
            thread: Mutex::new(Some(thread)),
        }
    }

    /// Every message received so far, in order.
    pub(crate) fn received(&self) -> Vec<Received> {
        self.log.lock().unwrap().clone()
    }

    /// Methods of every message received so far, in order.
    pub(crate) fn methods(&self) -> Vec<String> {
        self.received().into_iter().map(|r| r.method).collect()
    }

    /// Ids of the requests received so far, in order.
    pub(crate) fn request_ids(&self) -> Vec<u64> {
        self.received().into_iter().filter_map(|r| r.id).collect()
    }

    /// Params of every message with the given method.
    pub(crate) fn params_of(&self, method: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|r| r.method == method)
            .map(|r| r.params)
            .collect()
    }

    /// Drop the connection as if the engine process died.
    pub(crate) fn crash(&self) {
        let _ = self.socket.shutdown(Shutdown::Both);
    }

    /// Wait for the engine thread to finish.
    pub(crate) fn wait_closed(&self) {
        if let Some(thread) = self.thread.lock().unwrap().take() {
            let _ = thread.join();
        }
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.crash();
    }
}

//! Protocol client — one engine process, framed JSON-RPC over its stdio.
//!
//! Three threads run per client. One decodes protocol output and routes
//! responses to waiting callers, one drains stderr into the log, and one owns
//! the engine's stdin and writes every outbound frame in queue order. Callers
//! and the output reader only enqueue, so a slow engine never stalls the
//! reader. Callers block in [`ProtocolClient::send_request`] on a per-request
//! channel with an explicit ceiling; nothing waits indefinitely.
//!
//! A client that failed to spawn, or whose engine has exited, answers every
//! request with `None` straight away. It never restarts.

use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::framing::{self, Frame};
use super::message::{Incoming, NotificationMessage, ReplyMessage, RequestMessage, Response};

/// Default ceiling for the best-effort `shutdown` request.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

type PendingTable = Arc<Mutex<HashMap<u64, Sender<Response>>>>;

/// Work for the input writer thread.
#[derive(Debug)]
enum Outbound {
    /// A serialized message body, framed on write.
    Frame(Vec<u8>),
    /// Drop the engine's stdin once everything queued before it is written.
    Close,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Client side of one engine session.
pub struct ProtocolClient {
    language: String,
    /// Queue to the input writer; `None` once input is closed.
    outbox: Mutex<Option<Sender<Outbound>>>,
    pending: PendingTable,
    next_id: AtomicU64,
    /// Cleared by the output reader when the engine's stdout closes.
    transport_open: Arc<AtomicBool>,
    /// Cleared when shutdown begins.
    running: AtomicBool,
    shut_down: AtomicBool,
    child: Mutex<Option<Child>>,
    shutdown_timeout: Duration,
}

impl ProtocolClient {
    /// Spawn `command` and connect to its stdio.
    ///
    /// A spawn failure is logged and yields a non-operational client rather
    /// than an error, so the caller can carry on without this engine.
    pub fn spawn(language: &str, command: &[String]) -> Self {
        let Some((program, args)) = command.split_first() else {
            warn!(language, "no engine command configured");
            return Self::disconnected(language);
        };

        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                warn!(language, program = %program, error = %e, "failed to spawn engine");
                return Self::disconnected(language);
            }
        };

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            warn!(language, "engine spawned without piped stdio");
            let _ = child.kill();
            let _ = child.wait();
            return Self::disconnected(language);
        };

        info!(language, program = %program, pid = child.id(), "engine started");

        Self::connect(
            language,
            Box::new(stdout),
            Box::new(BufWriter::new(stdin)),
            Some(Box::new(stderr)),
            Some(child),
        )
    }

    /// Build a client over already-connected streams (no child process).
    pub fn from_streams<R, W>(language: &str, reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self::connect(language, Box::new(reader), Box::new(writer), None, None)
    }

    /// Override the ceiling used for the `shutdown` request.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    fn disconnected(language: &str) -> Self {
        Self {
            language: language.to_string(),
            outbox: Mutex::new(None),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            transport_open: Arc::new(AtomicBool::new(false)),
            running: AtomicBool::new(false),
            shut_down: AtomicBool::new(true),
            child: Mutex::new(None),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    fn connect(
        language: &str,
        output: Box<dyn Read + Send>,
        input: Box<dyn Write + Send>,
        stderr: Option<Box<dyn Read + Send>>,
        child: Option<Child>,
    ) -> Self {
        let (outbox, queue) = mpsc::channel();
        let client = Self {
            language: language.to_string(),
            outbox: Mutex::new(Some(outbox.clone())),
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            transport_open: Arc::new(AtomicBool::new(true)),
            running: AtomicBool::new(true),
            shut_down: AtomicBool::new(false),
            child: Mutex::new(child),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        };

        let writer_language = client.language.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-engine-in", client.language))
            .spawn(move || write_input(&writer_language, input, queue));
        if let Err(e) = spawned {
            warn!(language, error = %e, "failed to start engine writer");
            lock(&client.outbox).take();
        }

        let reader = OutputReader {
            language: client.language.clone(),
            pending: Arc::clone(&client.pending),
            outbox,
            transport_open: Arc::clone(&client.transport_open),
        };
        let spawned = thread::Builder::new()
            .name(format!("{}-engine-out", client.language))
            .spawn(move || reader.run(BufReader::new(output)));
        if let Err(e) = spawned {
            warn!(language, error = %e, "failed to start engine reader");
            client.transport_open.store(false, Ordering::SeqCst);
        }

        if let Some(stderr) = stderr {
            let language = client.language.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-engine-err", client.language))
                .spawn(move || drain_stderr(&language, BufReader::new(stderr)));
            if let Err(e) = spawned {
                debug!(language = %client.language, error = %e, "failed to start stderr reader");
            }
        }

        client
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Whether the engine can still be talked to.
    pub fn is_alive(&self) -> bool {
        if !self.transport_open.load(Ordering::SeqCst) {
            return false;
        }
        match lock(&self.child).as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => true,
        }
    }

    /// Alive and not shutting down.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.is_alive()
    }

    /// Number of requests currently waiting for a response.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Send a request and wait up to `timeout` for its result.
    ///
    /// Returns `None` on timeout, on a null result, on an error response, or
    /// when the engine is gone. Error responses are logged, never raised.
    pub fn send_request(&self, method: &str, params: Value, timeout: Duration) -> Option<Value> {
        if !self.running.load(Ordering::SeqCst) {
            debug!(language = %self.language, method, "request on stopped client");
            return None;
        }
        self.request(method, Some(&params), timeout)
    }

    /// Send a notification. Fire-and-forget.
    pub fn send_notification(&self, method: &str, params: Value) {
        if !self.is_running() {
            debug!(language = %self.language, method, "notification on stopped client");
            return;
        }
        if let Err(e) = self.write(&NotificationMessage::new(method, Some(&params))) {
            debug!(language = %self.language, method, error = %e, "notification write failed");
        }
    }

    fn request(&self, method: &str, params: Option<&Value>, timeout: Duration) -> Option<Value> {
        if !self.is_alive() {
            debug!(language = %self.language, method, "engine not alive");
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel();
        lock(&self.pending).insert(id, tx);

        // The reader may have closed the transport after the liveness check;
        // it clears the table after flipping the flag, so one of the two sees it.
        if !self.transport_open.load(Ordering::SeqCst) {
            lock(&self.pending).remove(&id);
            return None;
        }

        if let Err(e) = self.write(&RequestMessage::new(id, method, params)) {
            warn!(language = %self.language, method, id, error = %e, "request write failed");
            lock(&self.pending).remove(&id);
            return None;
        }

        let started = Instant::now();
        match rx.recv_timeout(timeout) {
            Ok(response) => {
                if let Some(err) = response.error {
                    warn!(language = %self.language, method, id, error = %err, "engine returned an error");
                    return None;
                }
                trace!(language = %self.language, method, id, elapsed_ms = started.elapsed().as_millis() as u64, "response received");
                response.result.filter(|result| !result.is_null())
            }
            Err(RecvTimeoutError::Timeout) => {
                lock(&self.pending).remove(&id);
                debug!(language = %self.language, method, id, timeout_ms = timeout.as_millis() as u64, "request timed out");
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                debug!(language = %self.language, method, id, "engine closed before responding");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, message: &T) -> io::Result<()> {
        match lock(&self.outbox).as_ref() {
            Some(outbox) => enqueue(outbox, message),
            None => Err(input_closed()),
        }
    }

    /// Stop the engine. Best effort and idempotent; never fails.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.running.store(false, Ordering::SeqCst);

        if self.is_alive() {
            let _ = self.request("shutdown", None, self.shutdown_timeout);
            if let Err(e) = self.write(&NotificationMessage::new("exit", None)) {
                debug!(language = %self.language, error = %e, "exit notification failed");
            }
        }

        // Closing stdin lets well-behaved engines exit on their own
        if let Some(outbox) = lock(&self.outbox).take() {
            let _ = outbox.send(Outbound::Close);
        }

        if let Some(mut child) = lock(&self.child).take() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    debug!(language = %self.language, %status, "engine already exited");
                }
                _ => {
                    if let Err(e) = child.kill() {
                        debug!(language = %self.language, error = %e, "engine kill failed");
                    }
                    if let Err(e) = child.wait() {
                        debug!(language = %self.language, error = %e, "engine reap failed");
                    }
                }
            }
        }

        info!(language = %self.language, "engine session closed");
    }
}

impl Drop for ProtocolClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn input_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "engine input closed")
}

/// Serialize `message` and hand it to the input writer. Never blocks.
fn enqueue<T: Serialize>(outbox: &Sender<Outbound>, message: &T) -> io::Result<()> {
    let body = serde_json::to_vec(message)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    outbox.send(Outbound::Frame(body)).map_err(|_| input_closed())
}

/// Input writer loop. Ends on `Close`, on the first write error, or once
/// every sender is gone; the engine's stdin is dropped on the way out.
fn write_input(language: &str, mut input: Box<dyn Write + Send>, queue: Receiver<Outbound>) {
    for outbound in queue {
        match outbound {
            Outbound::Frame(body) => {
                if let Err(e) = framing::write_message(&mut input, &body) {
                    debug!(language, error = %e, "engine input write failed");
                    return;
                }
            }
            Outbound::Close => break,
        }
    }
    debug!(language, "engine input closed");
}

/// State shared with the protocol output thread.
struct OutputReader {
    language: String,
    pending: PendingTable,
    outbox: Sender<Outbound>,
    transport_open: Arc<AtomicBool>,
}

impl OutputReader {
    fn run<R: BufRead>(self, mut reader: R) {
        loop {
            match framing::read_frame(&mut reader) {
                Ok(Some(Frame::Message(value))) => self.dispatch(value),
                Ok(Some(Frame::Malformed(e))) => {
                    debug!(language = %self.language, error = %e, "dropped malformed frame");
                }
                Ok(None) => {
                    debug!(language = %self.language, "engine output closed");
                    break;
                }
                Err(e) => {
                    debug!(language = %self.language, error = %e, "engine output read failed");
                    break;
                }
            }
        }

        self.transport_open.store(false, Ordering::SeqCst);
        // Dropping the senders wakes every caller still waiting
        lock(&self.pending).clear();
    }

    fn dispatch(&self, value: Value) {
        match Incoming::from_value(value) {
            Some(Incoming::Response(response)) => self.deliver(response),
            Some(Incoming::Request { id, method, params }) => {
                let result = reply_for(&method, params.as_ref());
                trace!(language = %self.language, method = %method, "answering engine request");
                if let Err(e) = enqueue(&self.outbox, &ReplyMessage::new(id, result)) {
                    debug!(language = %self.language, method = %method, error = %e, "reply write failed");
                }
            }
            Some(Incoming::Notification { method, params }) => {
                self.log_notification(&method, params.as_ref());
            }
            None => {
                debug!(language = %self.language, "dropped message of unknown shape");
            }
        }
    }

    fn deliver(&self, response: Response) {
        let sender = response
            .id
            .as_u64()
            .and_then(|id| lock(&self.pending).remove(&id));
        match sender {
            // The waiter may have timed out in the meantime; that is fine
            Some(sender) => {
                let _ = sender.send(response);
            }
            None => {
                debug!(language = %self.language, id = %response.id, "response for unknown request");
            }
        }
    }

    fn log_notification(&self, method: &str, params: Option<&Value>) {
        match method {
            "window/logMessage" | "window/showMessage" => {
                let params = params.cloned().unwrap_or(Value::Null);
                let message = params.get("message").and_then(Value::as_str).unwrap_or("");
                match params.get("type").and_then(Value::as_u64) {
                    Some(1) => warn!(language = %self.language, message, "engine error message"),
                    Some(2) => info!(language = %self.language, message, "engine warning message"),
                    _ => debug!(language = %self.language, message, "engine message"),
                }
            }
            _ => trace!(language = %self.language, method, "ignored engine notification"),
        }
    }
}

/// Result we send back for a request initiated by the engine.
fn reply_for(method: &str, params: Option<&Value>) -> Value {
    match method {
        // One entry per requested configuration section; we have no settings
        "workspace/configuration" => {
            let items = params
                .and_then(|p| p.get("items"))
                .and_then(Value::as_array)
                .map_or(0, Vec::len);
            Value::Array(vec![Value::Null; items])
        }
        _ => Value::Null,
    }
}

fn drain_stderr<R: BufRead>(language: &str, mut reader: R) {
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                let text = text.trim_end();
                if !text.is_empty() {
                    debug!(language, line = %text, "engine stderr");
                }
            }
            Err(e) => {
                debug!(language, error = %e, "engine stderr read failed");
                break;
            }
        }
    }
}

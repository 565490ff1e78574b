//! Transport layer: moves raw JSON-RPC messages between this process and
//! the automation host.
//!
//! Two implementations share one capability surface: [`StdioTransport`]
//! spawns the host as a child process and speaks newline-delimited JSON
//! over its pipes; [`HttpTransport`] POSTs each request and accepts either
//! a plain JSON body or server-sent-event framing. Callers depend only on
//! the [`Transport`] trait, so either can be substituted at construction.

use async_trait::async_trait;
use browserlink_core::{ClientOptions, Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::message::JsonRpcMessage;

/// Response header carrying the host-issued session id; echoed back
/// verbatim as a request header on every subsequent call.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// How many messages the stdio correlation scan reads before giving up.
const MAX_CORRELATION_READS: usize = 50;

/// Message transport to the automation host.
///
/// Cancellation is best-effort: when a deadline fires mid-exchange the
/// call returns [`Error::Timeout`] but the host is not told to abort, so
/// the remote action may still run to completion.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one message without waiting for a reply.
    async fn send(&self, msg: &JsonRpcMessage) -> Result<()>;

    /// Receive one message. Not every transport supports a receive that is
    /// independent of a send; those return a transport error here.
    async fn receive(&self) -> Result<JsonRpcMessage>;

    /// Send a request and block until the correlated response arrives.
    async fn send_receive(&self, msg: &JsonRpcMessage) -> Result<JsonRpcMessage>;

    /// Release transport resources. Idempotent.
    async fn close(&self) -> Result<()>;
}

// ─── Stdio transport ─────────────────────────────────────────────────────────

/// Transport over a spawned child process: one JSON document per line,
/// UTF-8, newline-terminated, on the child's stdin/stdout.
#[derive(Debug)]
pub struct StdioTransport {
    stdin: Mutex<ChildStdin>,
    lines: Mutex<Lines<BufReader<ChildStdout>>>,
    child: Mutex<Child>,
    closed: std::sync::atomic::AtomicBool,
    receive_timeout: Duration,
}

impl StdioTransport {
    /// Spawn the host process and take its pipes.
    pub fn spawn(command: &str, args: &[String]) -> Result<Self> {
        Self::spawn_with_options(command, args, &ClientOptions::default())
    }

    pub fn spawn_with_options(
        command: &str,
        args: &[String],
        opts: &ClientOptions,
    ) -> Result<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Transport(format!("failed to spawn '{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("host process has no stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("host process has no stdout".to_string()))?;

        debug!(command, "spawned host process");

        Ok(Self {
            stdin: Mutex::new(stdin),
            lines: Mutex::new(BufReader::new(stdout).lines()),
            child: Mutex::new(child),
            closed: std::sync::atomic::AtomicBool::new(false),
            receive_timeout: Duration::from_secs(opts.receive_timeout_secs),
        })
    }

    /// Read one line from the child and parse it as a message.
    async fn read_message(&self) -> Result<JsonRpcMessage> {
        let mut lines = self.lines.lock().await;
        let line = tokio::time::timeout(self.receive_timeout, lines.next_line())
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "no message from host within {:?}",
                    self.receive_timeout
                ))
            })?
            .map_err(|e| Error::Transport(format!("read from host failed: {}", e)))?
            .ok_or_else(|| Error::Transport("host stdout closed".to_string()))?;

        serde_json::from_str(&line)
            .map_err(|e| Error::Decode(format!("malformed message from host: {}", e)))
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&self, msg: &JsonRpcMessage) -> Result<()> {
        let line = serde_json::to_string(msg)?;
        debug!(id = ?msg.id, method = ?msg.method, "→ host");

        let mut stdin = self.stdin.lock().await;
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Transport(format!("write to host failed: {}", e)))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| Error::Transport(format!("write to host failed: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("flush to host failed: {}", e)))?;
        Ok(())
    }

    async fn receive(&self) -> Result<JsonRpcMessage> {
        self.read_message().await
    }

    /// Send, then scan incoming messages for the response with our id.
    /// Notifications and responses to other requests are discarded.
    async fn send_receive(&self, msg: &JsonRpcMessage) -> Result<JsonRpcMessage> {
        self.send(msg).await?;

        for _ in 0..MAX_CORRELATION_READS {
            let resp = self.read_message().await?;
            if resp.is_notification() {
                continue;
            }
            if resp.id == msg.id {
                debug!(id = ?resp.id, "← host");
                return Ok(resp);
            }
            warn!(got = ?resp.id, want = ?msg.id, "discarding uncorrelated response");
        }

        Err(Error::Timeout(format!(
            "no response for request {:?} after {} messages",
            msg.id, MAX_CORRELATION_READS
        )))
    }

    async fn close(&self) -> Result<()> {
        use std::sync::atomic::Ordering;
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut failures = Vec::new();

        if let Err(e) = self.stdin.lock().await.shutdown().await {
            failures.push(format!("stdin: {}", e));
        }
        if let Err(e) = self.child.lock().await.kill().await {
            failures.push(format!("kill: {}", e));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Transport(format!(
                "close errors: {}",
                failures.join("; ")
            )))
        }
    }
}

// ─── HTTP transport ──────────────────────────────────────────────────────────

/// Transport over streamable HTTP: one POST per exchange, response either
/// a bare JSON document or `text/event-stream` framing.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    session_id: std::sync::Mutex<Option<String>>,
}

impl HttpTransport {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_options(endpoint, &ClientOptions::default())
    }

    pub fn with_options(endpoint: &str, opts: &ClientOptions) -> Result<Self> {
        if endpoint.is_empty() {
            return Err(Error::Config("host URL cannot be empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(opts.request_timeout_secs))
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.to_string(),
            session_id: std::sync::Mutex::new(None),
        })
    }

    /// Session id issued by the host, if one has been captured.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().unwrap().clone()
    }

    async fn post(&self, msg: &JsonRpcMessage) -> Result<JsonRpcMessage> {
        let session = self.session_id();

        let mut req = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream")
            .json(msg);
        if let Some(sid) = &session {
            req = req.header(SESSION_HEADER, sid);
        }

        debug!(id = ?msg.id, method = ?msg.method, endpoint = %self.endpoint, "→ host");

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("POST {} timed out", self.endpoint))
            } else {
                Error::Transport(format!("POST {} failed: {}", self.endpoint, e))
            }
        })?;

        let status = resp.status();
        let new_session = resp
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Transport(format!(
                "host returned status {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }

        if let Some(sid) = new_session {
            let mut held = self.session_id.lock().unwrap();
            if held.as_deref() != Some(sid.as_str()) {
                debug!("captured host session id");
                *held = Some(sid);
            }
        }

        let parsed = decode_body(&body)?;
        debug!(id = ?parsed.id, "← host");
        Ok(parsed)
    }
}

/// Decode an HTTP response body: a bare JSON envelope, or event-stream
/// framing where only `data:` lines matter and the first parseable one
/// wins. Anything else is a decode error, never a silent empty response.
fn decode_body(body: &str) -> Result<JsonRpcMessage> {
    let trimmed = body.trim();
    if let Ok(msg) = serde_json::from_str::<JsonRpcMessage>(trimmed) {
        return Ok(msg);
    }

    for line in trimmed.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(data) = line.strip_prefix("data:") {
            if let Ok(msg) = serde_json::from_str::<JsonRpcMessage>(data.trim()) {
                return Ok(msg);
            }
        }
    }

    Err(Error::Decode(format!(
        "response body is neither a JSON-RPC message nor an event stream: {}",
        trimmed.chars().take(120).collect::<String>()
    )))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, msg: &JsonRpcMessage) -> Result<()> {
        self.post(msg).await.map(|_| ())
    }

    async fn receive(&self) -> Result<JsonRpcMessage> {
        Err(Error::Transport(
            "HTTP transport exchanges request and response in one call; use send_receive"
                .to_string(),
        ))
    }

    async fn send_receive(&self, msg: &JsonRpcMessage) -> Result<JsonRpcMessage> {
        self.post(msg).await
    }

    async fn close(&self) -> Result<()> {
        self.session_id.lock().unwrap().take();
        Ok(())
    }
}

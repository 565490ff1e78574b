//! Protocol client: the initialize handshake and generic tool invocation
//! on top of whichever [`Transport`] was chosen at construction.

use browserlink_core::{ClientOptions, Error, HostConfig, Result};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::message::{
    CallToolRequest, InitializeRequest, JsonRpcMessage, ListToolsResponse, Tool, ToolResult,
};
use crate::transport::{HttpTransport, StdioTransport, Transport};

/// Client for the browser-automation host.
///
/// Owns one transport, one monotonic request-id counter and the
/// `initialized` gate. Tool calls fail fast until [`Client::initialize`]
/// succeeds; after [`Client::close`] the client stays invalid. Safe to
/// share across tasks: the counter and gate are the only shared mutable
/// state, and neither lock is held across I/O.
pub struct Client {
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    initialized: AtomicBool,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            initialized: AtomicBool::new(false),
        }
    }

    /// Client over a spawned host process. Does not run the handshake.
    pub fn stdio(command: &str, args: &[String]) -> Result<Self> {
        let transport = StdioTransport::spawn(command, args)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Client over a streamable-HTTP host endpoint. Does not run the
    /// handshake.
    pub fn http(url: &str) -> Result<Self> {
        let transport = HttpTransport::new(url)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Build from a [`HostConfig`] and complete the handshake.
    pub async fn connect(config: &HostConfig, opts: &ClientOptions) -> Result<Self> {
        config.validate()?;
        let client = match config {
            HostConfig::Stdio { command, args } => {
                let transport = StdioTransport::spawn_with_options(command, args, opts)?;
                Self::new(Arc::new(transport))
            }
            HostConfig::Http { url } => {
                let transport = HttpTransport::with_options(url, opts)?;
                Self::new(Arc::new(transport))
            }
        };
        client.initialize().await?;
        Ok(client)
    }

    /// Strictly increasing within this client's lifetime; concurrent
    /// callers never observe the same id.
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Perform the `initialize` handshake. Required before any tool call;
    /// re-invoking is allowed and simply repeats the handshake.
    pub async fn initialize(&self) -> Result<()> {
        let params = serde_json::to_value(InitializeRequest::default())?;
        let msg = JsonRpcMessage::request(self.next_id(), "initialize", Some(params));

        let resp = self.transport.send_receive(&msg).await?;
        if let Some(err) = resp.error {
            return Err(Error::Rpc {
                code: err.code,
                message: format!("initialize failed: {}", err.message),
            });
        }

        self.initialized.store(true, Ordering::SeqCst);
        debug!("host initialized");
        Ok(())
    }

    /// Invoke a named tool with named arguments.
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<ToolResult> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let params = serde_json::to_value(CallToolRequest {
            name: name.to_string(),
            arguments,
        })?;
        let msg = JsonRpcMessage::request(self.next_id(), "tools/call", Some(params));

        let resp = self.transport.send_receive(&msg).await?;
        if let Some(err) = resp.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = resp
            .result
            .ok_or_else(|| Error::Decode(format!("tool '{}' response carries no result", name)))?;
        serde_json::from_value(result)
            .map_err(|e| Error::Decode(format!("tool '{}' result: {}", name, e)))
    }

    /// List the tools the host exposes.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        if !self.is_initialized() {
            return Err(Error::NotInitialized);
        }

        let msg = JsonRpcMessage::request(self.next_id(), "tools/list", None);
        let resp = self.transport.send_receive(&msg).await?;
        if let Some(err) = resp.error {
            return Err(Error::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = resp
            .result
            .ok_or_else(|| Error::Decode("tools/list response carries no result".to_string()))?;
        let list: ListToolsResponse = serde_json::from_value(result)
            .map_err(|e| Error::Decode(format!("tools/list result: {}", e)))?;
        Ok(list.tools)
    }

    /// Liveness check: defined as `tools/list` succeeding. The protocol
    /// has no dedicated ping method.
    pub async fn ping(&self) -> Result<()> {
        self.list_tools().await.map(|_| ())
    }

    /// Drop the initialized gate and close the transport. Idempotent; the
    /// client is permanently invalid afterwards.
    pub async fn close(&self) -> Result<()> {
        self.initialized.store(false, Ordering::SeqCst);
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Transport that records traffic and replies from a canned queue.
    struct FakeTransport {
        io_count: AtomicUsize,
        reply: fn(&JsonRpcMessage) -> JsonRpcMessage,
    }

    impl FakeTransport {
        fn new(reply: fn(&JsonRpcMessage) -> JsonRpcMessage) -> Arc<Self> {
            Arc::new(Self {
                io_count: AtomicUsize::new(0),
                reply,
            })
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, _msg: &JsonRpcMessage) -> Result<()> {
            self.io_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn receive(&self) -> Result<JsonRpcMessage> {
            Err(Error::Transport("not supported".to_string()))
        }

        async fn send_receive(&self, msg: &JsonRpcMessage) -> Result<JsonRpcMessage> {
            self.io_count.fetch_add(1, Ordering::SeqCst);
            Ok((self.reply)(msg))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn ok_reply(msg: &JsonRpcMessage) -> JsonRpcMessage {
        JsonRpcMessage {
            jsonrpc: "2.0".to_string(),
            id: msg.id,
            method: None,
            params: None,
            result: Some(serde_json::json!({"content": [], "isError": false})),
            error: None,
        }
    }

    #[tokio::test]
    async fn call_before_initialize_fails_without_io() {
        let transport = FakeTransport::new(ok_reply);
        let client = Client::new(transport.clone());

        let err = client.call_tool("navigate", Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
        assert_eq!(transport.io_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn list_before_initialize_fails_without_io() {
        let transport = FakeTransport::new(ok_reply);
        let client = Client::new(transport.clone());

        assert!(matches!(
            client.list_tools().await.unwrap_err(),
            Error::NotInitialized
        ));
        assert_eq!(transport.io_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn initialize_opens_the_gate() {
        let client = Client::new(FakeTransport::new(ok_reply));
        assert!(!client.is_initialized());
        client.initialize().await.unwrap();
        assert!(client.is_initialized());
        client.call_tool("navigate", Map::new()).await.unwrap();
    }

    #[tokio::test]
    async fn rpc_error_preserves_remote_message() {
        fn reply(msg: &JsonRpcMessage) -> JsonRpcMessage {
            JsonRpcMessage {
                jsonrpc: "2.0".to_string(),
                id: msg.id,
                method: None,
                params: None,
                result: None,
                error: Some(crate::message::RpcError {
                    code: -32000,
                    message: "tab not found".to_string(),
                    data: None,
                }),
            }
        }
        let client = Client::new(FakeTransport::new(reply));
        // This host errors on everything, initialize included; open the
        // gate directly so the tool call itself is what fails.
        client.initialized.store(true, Ordering::SeqCst);

        match client.call_tool("navigate", Map::new()).await.unwrap_err() {
            Error::Rpc { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "tab not found");
            }
            other => panic!("expected Rpc error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn close_is_idempotent_and_final() {
        let client = Client::new(FakeTransport::new(ok_reply));
        client.initialize().await.unwrap();

        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(matches!(
            client.call_tool("navigate", Map::new()).await.unwrap_err(),
            Error::NotInitialized
        ));
    }

    #[tokio::test]
    async fn concurrent_id_allocations_are_distinct_and_increasing() {
        let client = Arc::new(Client::new(FakeTransport::new(ok_reply)));

        let mut handles = Vec::new();
        for _ in 0..64 {
            let c = client.clone();
            handles.push(tokio::spawn(async move { c.next_id() }));
        }

        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 64);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}

//! Typed wrappers over the generic `tools/call` primitive, one per
//! browser operation the host exposes.
//!
//! Tool names and argument shapes here are the Chrome automation host's
//! wire contract. Result decoding is defensive: content-item field names
//! drifted between host versions, so [`Client::get_web_content_html`]
//! probes a fixed priority order of keys rather than one rigid schema.

use browserlink_core::{Error, Result};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::client::Client;
use crate::message::ToolResult;

/// Tool names exposed by the Chrome automation host.
pub mod tool_names {
    pub const GET_WINDOWS_AND_TABS: &str = "get_windows_and_tabs";
    pub const NAVIGATE: &str = "chrome_navigate";
    pub const GET_WEB_CONTENT: &str = "chrome_get_web_content";
    pub const NETWORK_REQUEST: &str = "chrome_network_request";
    pub const NETWORK_CAPTURE_START: &str = "chrome_network_capture_start";
    pub const NETWORK_CAPTURE_STOP: &str = "chrome_network_capture_stop";
    pub const FILL_OR_SELECT: &str = "chrome_fill_or_select";
    pub const CLICK_ELEMENT: &str = "chrome_click_element";
    pub const KEYBOARD: &str = "chrome_keyboard";
}

/// Options for a network request performed *by the browser* (carrying its
/// cookies and session), as opposed to one made by this process.
#[derive(Debug, Clone, Default)]
pub struct NetworkRequestOptions {
    pub url: String,
    pub method: Option<String>,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<Value>,
}

fn args(entries: Vec<(&str, Value)>) -> Map<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Turn a `isError` result into a failure carrying the host's message.
/// Wrappers that return only success/error go through this; the
/// `*_with_result` variants surface the raw result instead.
fn fail_if_error(result: ToolResult, operation: &str, target: &str) -> Result<ToolResult> {
    if result.is_error {
        let msg = result.first_text().unwrap_or("tool reported an error");
        return Err(Error::Tool(format!("{} {}: {}", operation, target, msg)));
    }
    Ok(result)
}

impl Client {
    /// Navigate the browser to a URL.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let result = self.navigate_with_result(url).await?;
        fail_if_error(result, "navigate", url).map(|_| ())
    }

    /// Navigate and surface the raw result, for callers that need host
    /// metadata such as the tab id embedded in the content.
    pub async fn navigate_with_result(&self, url: &str) -> Result<ToolResult> {
        self.call_tool(tool_names::NAVIGATE, args(vec![("url", json!(url))]))
            .await
            .map_err(|e| wrap(e, "navigate", url))
    }

    /// Fetch a page's text content.
    pub async fn get_web_content(&self, url: &str) -> Result<String> {
        let result = self
            .call_tool(
                tool_names::GET_WEB_CONTENT,
                args(vec![("url", json!(url)), ("textContent", json!(true))]),
            )
            .await
            .map_err(|e| wrap(e, "get content", url))?;
        let result = fail_if_error(result, "get content", url)?;

        let item = first_item(&result, url)?;
        item.get("text")
            .and_then(|t| t.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                Error::Decode(format!(
                    "content for {} has no text field, got keys: {}",
                    url,
                    item_keys(item)
                ))
            })
    }

    /// Fetch a page's HTML.
    ///
    /// Probing order is a compatibility contract across host versions:
    /// `html`, then `htmlContent`, then `text` — and when the text itself
    /// is a JSON object carrying `htmlContent`, that nested value wins.
    pub async fn get_web_content_html(&self, url: &str) -> Result<String> {
        let result = self
            .call_tool(
                tool_names::GET_WEB_CONTENT,
                args(vec![("url", json!(url)), ("htmlContent", json!(true))]),
            )
            .await
            .map_err(|e| wrap(e, "get HTML", url))?;
        let result = fail_if_error(result, "get HTML", url)?;

        let item = first_item(&result, url)?;
        extract_html(item).ok_or_else(|| {
            Error::Decode(format!(
                "content for {} has no html, htmlContent or text field, got keys: {}",
                url,
                item_keys(item)
            ))
        })
    }

    /// Issue a network request from inside the browser.
    pub async fn network_request(&self, opts: &NetworkRequestOptions) -> Result<ToolResult> {
        let mut arguments = args(vec![("url", json!(opts.url))]);
        if let Some(method) = &opts.method {
            arguments.insert("method".to_string(), json!(method));
        }
        if let Some(headers) = &opts.headers {
            arguments.insert("headers".to_string(), json!(headers));
        }
        if let Some(body) = &opts.body {
            arguments.insert("body".to_string(), body.clone());
        }

        self.call_tool(tool_names::NETWORK_REQUEST, arguments)
            .await
            .map_err(|e| wrap(e, "network request", &opts.url))
    }

    /// Start capturing network traffic for a URL.
    pub async fn network_capture_start(&self, url: &str) -> Result<()> {
        let result = self
            .call_tool(
                tool_names::NETWORK_CAPTURE_START,
                args(vec![("url", json!(url))]),
            )
            .await
            .map_err(|e| wrap(e, "start capture", url))?;
        fail_if_error(result, "start capture", url).map(|_| ())
    }

    /// Stop capturing and return what was captured.
    pub async fn network_capture_stop(&self) -> Result<ToolResult> {
        self.call_tool(tool_names::NETWORK_CAPTURE_STOP, Map::new())
            .await
            .map_err(|e| wrap(e, "stop capture", ""))
    }

    /// Fill or select a form element.
    pub async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let result = self
            .call_tool(
                tool_names::FILL_OR_SELECT,
                args(vec![("selector", json!(selector)), ("value", json!(value))]),
            )
            .await
            .map_err(|e| wrap(e, "fill", selector))?;
        fail_if_error(result, "fill", selector).map(|_| ())
    }

    /// Click an element.
    pub async fn click(&self, selector: &str) -> Result<()> {
        let result = self
            .call_tool(
                tool_names::CLICK_ELEMENT,
                args(vec![("selector", json!(selector))]),
            )
            .await
            .map_err(|e| wrap(e, "click", selector))?;
        fail_if_error(result, "click", selector).map(|_| ())
    }

    /// Send keystrokes to the focused element.
    pub async fn keyboard(&self, keys: &str) -> Result<()> {
        let result = self
            .call_tool(tool_names::KEYBOARD, args(vec![("keys", json!(keys))]))
            .await
            .map_err(|e| wrap(e, "keyboard", keys))?;
        fail_if_error(result, "keyboard", keys).map(|_| ())
    }
}

/// Attach the operation and its target to an error on the way up, keeping
/// the error kind so callers can still tell a timeout from a protocol
/// failure. No retries happen at this layer.
fn wrap(err: Error, operation: &str, target: &str) -> Error {
    let ctx = if target.is_empty() {
        operation.to_string()
    } else {
        format!("{} {}", operation, target)
    };
    match err {
        Error::Rpc { code, message } => Error::Rpc {
            code,
            message: format!("{}: {}", ctx, message),
        },
        Error::Timeout(m) => Error::Timeout(format!("{}: {}", ctx, m)),
        Error::Transport(m) => Error::Transport(format!("{}: {}", ctx, m)),
        Error::Decode(m) => Error::Decode(format!("{}: {}", ctx, m)),
        Error::NotInitialized | Error::Closed => err,
        other => Error::Other(format!("{}: {}", ctx, other)),
    }
}

fn first_item<'a>(result: &'a ToolResult, url: &str) -> Result<&'a Value> {
    result
        .content
        .first()
        .ok_or_else(|| Error::Decode(format!("no content returned for {}", url)))
}

fn item_keys(item: &Value) -> String {
    match item.as_object() {
        Some(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        None => format!("(non-object item: {})", item),
    }
}

/// The field-probing contract for HTML extraction. See
/// [`Client::get_web_content_html`].
fn extract_html(item: &Value) -> Option<String> {
    if let Some(html) = item.get("html").and_then(|v| v.as_str()) {
        return Some(html.to_string());
    }
    if let Some(html) = item.get("htmlContent").and_then(|v| v.as_str()) {
        return Some(html.to_string());
    }
    if let Some(text) = item.get("text").and_then(|v| v.as_str()) {
        // Some host versions wrap the payload one level deeper: the text
        // field holds a JSON object whose htmlContent carries the HTML.
        if text.starts_with('{') {
            if let Ok(inner) = serde_json::from_str::<Value>(text) {
                if let Some(html) = inner.get("htmlContent").and_then(|v| v.as_str()) {
                    return Some(html.to_string());
                }
            }
        }
        return Some(text.to_string());
    }
    None
}

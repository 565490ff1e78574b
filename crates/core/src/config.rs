use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How to reach the browser-automation host.
///
/// Either a locally spawned child process speaking newline-delimited
/// JSON-RPC on its stdio, or an HTTP endpoint speaking streamable HTTP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "transport")]
pub enum HostConfig {
    #[serde(rename_all = "camelCase")]
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Http { url: String },
}

/// Client-side knobs shared by both transports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientOptions {
    /// Per-attempt receive deadline, seconds.
    #[serde(default = "default_receive_timeout_secs")]
    pub receive_timeout_secs: u64,
    /// Overall HTTP request timeout, seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_receive_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            receive_timeout_secs: default_receive_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HostConfig {
    /// Parse a host config from a JSON document.
    pub fn from_json(s: &str) -> Result<Self> {
        let cfg: HostConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            HostConfig::Stdio { command, .. } if command.is_empty() => {
                Err(Error::Config("host command cannot be empty".to_string()))
            }
            HostConfig::Http { url } if url.is_empty() => {
                Err(Error::Config("host URL cannot be empty".to_string()))
            }
            _ => Ok(()),
        }
    }
}

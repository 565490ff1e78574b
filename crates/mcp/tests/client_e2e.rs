//! End-to-end: client + stdio transport against scripted `sh` mock hosts
//! that reply to the handshake and tool calls over stdio.

use browserlink_core::Error;
use browserlink_mcp::Client;

/// Mock host: accepts initialize, tools/list and chrome_navigate calls.
const HAPPY_HOST: &str = r#"
while IFS= read -r line; do
  id=${line#*'"id":'}
  id=${id%%[!0-9]*}
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"mock-host"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"chrome_navigate","description":"navigate a tab","inputSchema":{"type":"object"}}]}}\n' "$id" ;;
    *'"name":"chrome_navigate"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"ok"}],"isError":false}}\n' "$id" ;;
  esac
done
"#;

/// Mock host whose tool calls all fail with a message.
const FAILING_HOST: &str = r#"
while IFS= read -r line; do
  id=${line#*'"id":'}
  id=${id%%[!0-9]*}
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"mock-host"}}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"boom"}],"isError":true}}\n' "$id" ;;
  esac
done
"#;

/// Mock host that emits an unrelated notification before each response;
/// the correlation scan has to discard it.
const CHATTY_HOST: &str = r#"
while IFS= read -r line; do
  id=${line#*'"id":'}
  id=${id%%[!0-9]*}
  printf '{"jsonrpc":"2.0","method":"notifications/progress","params":{"progress":1}}\n'
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"mock-host"}}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"ok"}],"isError":false}}\n' "$id" ;;
  esac
done
"#;

fn sh_client(script: &str) -> Client {
    Client::stdio("sh", &["-c".to_string(), script.to_string()]).unwrap()
}

#[tokio::test]
async fn navigate_against_mock_host_succeeds() {
    let client = sh_client(HAPPY_HOST);
    client.initialize().await.unwrap();

    client.navigate("https://example.test").await.unwrap();

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "chrome_navigate");

    client.ping().await.unwrap();
    client.close().await.unwrap();
}

#[tokio::test]
async fn host_tool_failure_surfaces_its_message() {
    let client = sh_client(FAILING_HOST);
    client.initialize().await.unwrap();

    let err = client.navigate("https://example.test").await.unwrap_err();
    assert!(
        err.to_string().contains("boom"),
        "error should carry the host message, got: {}",
        err
    );

    client.close().await.unwrap();
}

#[tokio::test]
async fn notifications_are_discarded_by_the_correlation_scan() {
    let client = sh_client(CHATTY_HOST);
    client.initialize().await.unwrap();

    let result = client.navigate_with_result("https://example.test").await.unwrap();
    assert!(!result.is_error);
    assert_eq!(result.first_text(), Some("ok"));

    client.close().await.unwrap();
}

#[tokio::test]
async fn tool_calls_require_the_handshake() {
    let client = sh_client(HAPPY_HOST);

    let err = client.navigate("https://example.test").await.unwrap_err();
    assert!(matches!(err, Error::NotInitialized), "got {:?}", err);

    client.close().await.unwrap();
}

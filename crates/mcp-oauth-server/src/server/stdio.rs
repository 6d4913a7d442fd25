//! Stdio transport for MCP protocol.
//!
//! Handles JSON-RPC 2.0 over stdin/stdout, one message per line. There is no
//! bearer token on this transport, so tools that need one report an error.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::oauth::CredentialStore;
use super::transport::{JsonRpcRequest, JsonRpcResponse, dispatch};
use crate::tools::{McpTool, RequestContext, ToolContext};

/// Handle MCP protocol over stdio.
pub async fn run_stdio(
    tools: Vec<Box<dyn McpTool>>,
    store: Arc<dyn CredentialStore>,
) -> anyhow::Result<()> {
    let reader = BufReader::new(tokio::io::stdin());
    let writer = tokio::io::stdout();

    tracing::info!("MCP stdio server ready, waiting for requests...");
    serve_lines(reader, writer, &tools, &store).await
}

/// Serve JSON-RPC lines from `reader` until EOF.
pub async fn serve_lines<R, W>(
    mut reader: R,
    mut writer: W,
    tools: &[Box<dyn McpTool>],
    store: &Arc<dyn CredentialStore>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;

        if bytes_read == 0 {
            tracing::info!("Stdin closed, shutting down");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
            Ok(request) => {
                tracing::debug!(method = %request.method, "Received request");
                let ctx = ToolContext::new(
                    Arc::clone(store),
                    RequestContext::new(uuid::Uuid::new_v4().to_string()),
                );
                dispatch(&request, tools, &ctx).await
            }
            Err(e) => Some(JsonRpcResponse::error(None, -32700, format!("Parse error: {e}"))),
        };

        if let Some(response) = response {
            let response_json = serde_json::to_string(&response)?;
            writer.write_all(response_json.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

//! Stdio transport
//!
//! Reads newline-delimited requests, dispatches each one in arrival order and
//! writes one response line per non-notification. Responses are flushed as
//! soon as they are written.

use std::io;

use bruno_core::Config;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec;
use crate::dispatch::Dispatcher;
use crate::framing::{FramingError, LineCodec};
use crate::protocol::Response;

/// Buffer sizing for the line reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    pub initial_buffer_bytes: usize,
    pub max_line_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for TransportConfig {
    fn from(config: &Config) -> Self {
        Self {
            initial_buffer_bytes: config.initial_buffer_bytes,
            max_line_bytes: config.max_line_bytes,
        }
    }
}

/// Errors that end the serve loop
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("input line is too long (limit {max_line_bytes} bytes)")]
    LineTooLong { max_line_bytes: usize },

    #[error("failed to read input: {0}")]
    Read(#[source] io::Error),

    #[error("failed to write response: {0}")]
    Write(#[source] io::Error),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl From<FramingError> for TransportError {
    fn from(e: FramingError) -> Self {
        match e {
            FramingError::LineTooLong(max_line_bytes) => Self::LineTooLong { max_line_bytes },
            FramingError::Io(e) => Self::Read(e),
        }
    }
}

/// Decode and dispatch one line, returning the response to send, if any
pub fn handle_line(dispatcher: &Dispatcher, ctx: &CancellationToken, line: &[u8]) -> Option<Response> {
    let request = match codec::decode(line) {
        Ok(request) => request,
        Err(e) => {
            warn!(code = e.error.code, "Rejected request: {}", e.error.message);
            return e.into_response();
        }
    };

    let result = dispatcher.dispatch(ctx, &request);

    let id = match request.id {
        Some(id) if !id.is_null() => id,
        _ => {
            if let Err(e) = result {
                debug!(method = %request.method, "Notification failed: {}", e);
            }
            return None;
        }
    };

    Some(match result {
        Ok(value) => Response::success(id, value),
        Err(error) => Response::error(id, error),
    })
}

/// Serve requests from `reader` until end of input.
///
/// Returns `Ok(())` on clean end of input. A line longer than
/// `max_line_bytes`, a read failure or a write failure ends the loop with an
/// error; nothing is written for the offending line.
pub async fn serve<R, W>(
    dispatcher: &Dispatcher,
    ctx: &CancellationToken,
    config: TransportConfig,
    reader: R,
    writer: W,
) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let codec = LineCodec::new(config.max_line_bytes);
    let mut lines = FramedRead::with_capacity(reader, codec, config.initial_buffer_bytes);
    let mut writer = BufWriter::new(writer);

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                let e = TransportError::from(e);
                error!("{}", e);
                return Err(e);
            }
        };

        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        debug!("Received: {}", String::from_utf8_lossy(&line));

        let Some(response) = handle_line(dispatcher, ctx, &line) else {
            continue;
        };

        let encoded = codec::encode(&response)?;
        debug!("Sending: {}", String::from_utf8_lossy(&encoded).trim_end());
        writer.write_all(&encoded).await.map_err(TransportError::Write)?;
        writer.flush().await.map_err(TransportError::Write)?;
    }

    info!("End of input");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::MethodRegistry;
    use crate::protocol::{RpcError, INTERNAL_ERROR, INVALID_REQUEST, METHOD_NOT_FOUND};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tokio::io::AsyncBufReadExt;

    fn dispatcher() -> Dispatcher {
        let mut methods = MethodRegistry::new();
        methods
            .register("echo", |_ctx, req| Ok(req.params.clone().unwrap_or(Value::Null)))
            .register("fail", |_ctx, _req| Err(RpcError::invalid_params("bad")))
            .register("boom", |_ctx, _req| panic!("boom"));
        Dispatcher::new(methods)
    }

    async fn run(input: &str, config: TransportConfig) -> (Result<(), TransportError>, Vec<Value>) {
        let mut out = Vec::new();
        let result = serve(
            &dispatcher(),
            &CancellationToken::new(),
            config,
            input.as_bytes(),
            &mut out,
        )
        .await;
        let responses = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (result, responses)
    }

    #[tokio::test]
    async fn test_responses_in_order() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":{"n":1}}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":"two","method":"fail"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"missing"}"#,
            "\n",
        );
        let (result, responses) = run(input, TransportConfig::default()).await;
        assert!(result.is_ok());
        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0], json!({"jsonrpc": "2.0", "id": 1, "result": {"n": 1}}));
        assert_eq!(responses[1]["id"], json!("two"));
        assert_eq!(responses[2]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_notifications_and_parse_errors_are_silent() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","method":"echo"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":null,"method":"missing"}"#,
            "\n",
            "{not json\n",
            r#"{"jsonrpc":"2.0","method":"boom"}"#,
            "\n",
        );
        let (result, responses) = run(input, TransportConfig::default()).await;
        assert!(result.is_ok());
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_version_echoes_id() {
        let (_, responses) = run(
            "{\"jsonrpc\":\"1.0\",\"id\":9,\"method\":\"echo\"}\n",
            TransportConfig::default(),
        )
        .await;
        assert_eq!(responses[0]["id"], json!(9));
        assert_eq!(responses[0]["error"]["code"], INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_panic_keeps_serving() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"boom"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"echo","params":true}"#,
            "\n",
        );
        let (result, responses) = run(input, TransportConfig::default()).await;
        assert!(result.is_ok());
        assert_eq!(responses[0]["error"]["code"], INTERNAL_ERROR);
        assert_eq!(responses[1]["result"], json!(true));
    }

    #[tokio::test]
    async fn test_final_line_without_newline() {
        let (result, responses) = run(
            r#"{"jsonrpc":"2.0","id":1,"method":"echo","params":"x"}"#,
            TransportConfig::default(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(responses[0]["result"], json!("x"));
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let config = TransportConfig {
            initial_buffer_bytes: 16,
            max_line_bytes: 32,
        };
        let long = format!(
            "{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"echo\",\"params\":\"{}\"}}\n",
            "x".repeat(64)
        );
        let (result, responses) = run(&long, config).await;
        assert!(matches!(
            result,
            Err(TransportError::LineTooLong { max_line_bytes: 32 })
        ));
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn test_large_id_round_trips() {
        let id = "123456789012345678901234567890";
        let mut out = Vec::new();
        let input = format!(r#"{{"jsonrpc":"2.0","id":{},"method":"echo"}}"#, id) + "\n";
        serve(
            &dispatcher(),
            &CancellationToken::new(),
            TransportConfig::default(),
            input.as_bytes(),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{{\"jsonrpc\":\"2.0\",\"id\":{},\"result\":null}}\n", id)
        );
    }

    #[tokio::test]
    async fn test_response_flushed_before_input_closes() {
        let (client, server_side) = tokio::io::duplex(4096);
        let (server_read, server_write) = tokio::io::split(server_side);
        let d = dispatcher();
        let ctx = CancellationToken::new();

        let client_side = async move {
            let (client_read, mut client_write) = tokio::io::split(client);
            client_write
                .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"echo\",\"params\":1}\n")
                .await
                .unwrap();

            let mut reader = tokio::io::BufReader::new(client_read);
            let mut line = String::new();
            tokio::time::timeout(Duration::from_secs(5), reader.read_line(&mut line))
                .await
                .expect("response arrives while input is still open")
                .unwrap();
            // dropping both halves closes the input
            line
        };

        let (result, line) = tokio::join!(
            serve(&d, &ctx, TransportConfig::default(), server_read, server_write),
            client_side
        );
        assert!(result.is_ok());
        assert_eq!(line, "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":1}\n");
    }

    #[test]
    fn test_handle_line_directly() {
        let d = dispatcher();
        let ctx = CancellationToken::new();
        let response = handle_line(&d, &ctx, br#"{"jsonrpc":"2.0","id":5,"method":"echo"}"#).unwrap();
        assert_eq!(response.id, json!(5));
        assert_eq!(response.result, Some(Value::Null));
        assert!(handle_line(&d, &ctx, b"[1,2]").is_none());
    }
}

//! Message transports for the MCP server.
//!
//! The engine is transport-agnostic: anything that can receive and send
//! newline-delimited JSON messages and signal closure works. The [`Transport`]
//! trait captures that contract; [`StdioTransport`] is the production
//! implementation (stdin/stdout pipe, stderr reserved for logging).
//! Integration tests drive the server through an in-memory channel
//! implementation of the same trait.
//!
//! # Wire Format
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};

/// A duplex, message-oriented channel between server and client.
///
/// Each message is one line of JSON. `recv` returning `Ok(None)` signals
/// that the peer closed the connection.
#[allow(async_fn_in_trait)] // implementations are concrete; auto traits resolve at instantiation
pub trait Transport {
    /// Receives the next message line, or `None` on close.
    ///
    /// Must be cancellation-safe: the server races `recv` against its
    /// outbound queues in a `select!` loop, so a dropped `recv` future must
    /// not lose bytes already read.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying channel fails.
    async fn recv(&mut self) -> io::Result<Option<String>>;

    /// Sends one message line. The implementation appends the delimiter.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying channel fails.
    async fn send(&mut self, message: &str) -> io::Result<()>;
}

/// A stdio-based MCP transport.
///
/// Reads JSON-RPC messages from stdin and writes messages to stdout.
pub struct StdioTransport {
    /// Buffered reader for stdin.
    reader: BufReader<tokio::io::Stdin>,
    /// Handle for stdout.
    writer: tokio::io::Stdout,
    /// Accumulates the line being read. Lives on the struct, not in the
    /// `recv` future, so a cancelled `recv` keeps any partial line.
    line_buf: Vec<u8>,
}

impl StdioTransport {
    /// Creates a new stdio transport.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
            line_buf: Vec::new(),
        }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads one newline-terminated message into `buf`, which the caller owns.
///
/// `read_until` appends incrementally, so when the returned future is
/// dropped mid-line the bytes read so far stay in `buf` and the next call
/// resumes the same line. A local buffer would lose them.
async fn recv_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let bytes_read = reader.read_until(b'\n', buf).await?;

    if bytes_read == 0 && buf.is_empty() {
        // EOF - stdin closed
        return Ok(None);
    }

    // EOF with pending bytes delivers the final unterminated line.
    let mut line = std::mem::take(buf);
    if line.ends_with(b"\n") {
        line.pop();
        if line.ends_with(b"\r") {
            line.pop();
        }
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

impl Transport for StdioTransport {
    async fn recv(&mut self) -> io::Result<Option<String>> {
        recv_line(&mut self.reader, &mut self.line_buf).await
    }

    async fn send(&mut self, message: &str) -> io::Result<()> {
        // MCP spec: messages must not contain embedded newlines
        debug_assert!(
            !message.contains('\n'),
            "JSON message must not contain embedded newlines"
        );

        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::mcp::protocol::{JsonRpcError, JsonRpcResponse, RequestId};

    #[tokio::test]
    async fn recv_line_splits_messages_and_strips_crlf() {
        let mut reader = BufReader::new(&b"{\"a\":1}\n{\"b\":2}\r\n"[..]);
        let mut buf = Vec::new();

        let first = recv_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(first.as_deref(), Some("{\"a\":1}"));
        let second = recv_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(second.as_deref(), Some("{\"b\":2}"));
        assert_eq!(recv_line(&mut reader, &mut buf).await.unwrap(), None);
    }

    #[tokio::test]
    async fn partial_line_survives_a_cancelled_recv() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);
        let mut buf = Vec::new();

        // First half of a message arrives, then another event wins the race
        // and the in-flight recv future is dropped.
        client.write_all(b"{\"jsonrpc\":\"2.0\",").await.unwrap();
        tokio::select! {
            biased;
            _ = recv_line(&mut reader, &mut buf) => panic!("message is not complete yet"),
            () = std::future::ready(()) => {}
        }

        // The rest of the line arrives; the resumed read yields the whole
        // message, not a truncated tail.
        client.write_all(b"\"id\":5}\n").await.unwrap();
        let line = recv_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(line.as_deref(), Some("{\"jsonrpc\":\"2.0\",\"id\":5}"));
    }

    #[tokio::test]
    async fn eof_delivers_a_pending_unterminated_line() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);
        let mut buf = Vec::new();

        client.write_all(b"{\"jsonrpc\":\"2.0\"}").await.unwrap();
        drop(client);

        let line = recv_line(&mut reader, &mut buf).await.unwrap();
        assert_eq!(line.as_deref(), Some("{\"jsonrpc\":\"2.0\"}"));
        assert_eq!(recv_line(&mut reader, &mut buf).await.unwrap(), None);
    }

    #[test]
    fn transport_default() {
        // Just ensure Default is implemented and doesn't panic
        let _transport = StdioTransport::default();
    }

    #[tokio::test]
    async fn serialise_response_no_newlines() {
        // Verify our JSON serialisation doesn't produce embedded newlines
        let response = JsonRpcResponse::success(
            RequestId::Number(1),
            serde_json::json!({
                "message": "hello world",
                "nested": {"key": "value"}
            }),
        );

        let json = serde_json::to_string(&response).unwrap();
        assert!(
            !json.contains('\n'),
            "Serialised JSON should not contain newlines"
        );
    }

    #[tokio::test]
    async fn serialise_error_no_newlines() {
        let error = JsonRpcError::method_not_found(RequestId::Number(1), "test/method");

        let json = serde_json::to_string(&error).unwrap();
        assert!(
            !json.contains('\n'),
            "Serialised JSON should not contain newlines"
        );
    }
}

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use ulsp_protocol::{JsonRpcClientRequest, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

/// Errors produced while framing or parsing an LSP message.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The underlying stream returned an I/O error.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A `Content-Length` header was missing or malformed.
    #[error("missing or invalid Content-Length header")]
    MissingContentLength,
    /// The message body was not valid JSON.
    #[error("malformed JSON-RPC body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Read one `Content-Length` framed message from `reader`.
///
/// Returns `Ok(None)` on a clean EOF between messages (the peer closed the
/// connection), which the Connection Host treats as the stream's done
/// signal (§4.I).
pub async fn read_message<R>(reader: &mut R) -> Result<Option<JsonRpcRequest>, FramingError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            if content_length.is_none() {
                return Ok(None);
            }
            return Err(FramingError::MissingContentLength);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(
                value.trim().parse::<usize>().map_err(|_| FramingError::MissingContentLength)?,
            );
        }
        // Other headers (e.g. Content-Type) are accepted and ignored.
    }

    let content_length = content_length.ok_or(FramingError::MissingContentLength)?;
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await?;

    let request: JsonRpcRequest = serde_json::from_slice(&body)?;
    Ok(Some(request))
}

fn frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 32);
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    out.extend_from_slice(body);
    out
}

/// Write a single framed response to `writer`.
pub async fn write_message<W>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(response)?;
    writer.write_all(&frame(&body)).await?;
    writer.flush().await?;
    Ok(())
}

/// Write a single framed notification to `writer`.
pub async fn write_notification<W>(
    writer: &mut W,
    notification: &JsonRpcNotification,
) -> Result<(), FramingError>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(notification)?;
    writer.write_all(&frame(&body)).await?;
    writer.flush().await?;
    Ok(())
}

/// A shared, lock-protected framed writer for one peer connection.
///
/// The IDE Gateway (§4.C) holds one `MessageWriter` per session and sends
/// notifications and client-bound requests to it from many concurrent
/// tasks; the internal mutex serializes the interleaved frames so two
/// concurrent sends never interleave their bytes on the wire.
pub struct MessageWriter<W> {
    inner: Arc<Mutex<W>>,
}

impl<W> Clone for MessageWriter<W> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Wrap `writer` for shared, serialized framed writes.
    pub fn new(writer: W) -> Self {
        Self { inner: Arc::new(Mutex::new(writer)) }
    }

    /// Send a response.
    pub async fn send_response(&self, response: &JsonRpcResponse) -> Result<(), FramingError> {
        let mut guard = self.inner.lock().await;
        write_message(&mut *guard, response).await
    }

    /// Send a notification.
    pub async fn send_notification(
        &self,
        notification: &JsonRpcNotification,
    ) -> Result<(), FramingError> {
        let mut guard = self.inner.lock().await;
        write_notification(&mut *guard, notification).await
    }

    /// Send a client-bound request (server-to-client).
    pub async fn send_client_request(
        &self,
        request: &JsonRpcClientRequest,
    ) -> Result<(), FramingError> {
        let body = serde_json::to_vec(request)?;
        let mut guard = self.inner.lock().await;
        guard.write_all(&frame(&body)).await?;
        guard.flush().await?;
        Ok(())
    }
}

// Copyright 2026 the rudder authors
// Licensed under the Apache License, Version 2.0

//! Framed JSON transport over the driver's stdio pipes.
//!
//! Every frame on the wire is a 4-byte little-endian length prefix followed
//! by exactly that many bytes of UTF-8 JSON. The same framing applies in
//! both directions. Frames are delivered in arrival order; nothing here
//! interprets them.

use crate::error::{Error, Result};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

/// Payloads larger than this are read in chunks so a single huge frame
/// (screenshots, downloads) does not require one giant read.
const READ_CHUNK_SIZE: usize = 32_768;

/// Writing half of the transport.
///
/// Blanket-implemented for any async writer so the connection can hold a
/// `ChildStdin` in production and a duplex pipe in tests.
pub trait FrameSink: Send {
    fn send(&mut self, frame: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

impl<W: AsyncWrite + Unpin + Send> FrameSink for W {
    fn send(&mut self, frame: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move { write_frame(self, &frame).await })
    }
}

/// Reading half of the transport, pumped by the connection's reader task.
pub trait FrameSource: Send {
    /// Read frames until EOF or failure. `Ok(())` means the peer closed the
    /// pipe cleanly on a frame boundary.
    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Encode one frame onto `writer`.
pub async fn write_frame<W>(writer: &mut W, frame: &Value) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = serde_json::to_vec(frame)
        .map_err(|e| Error::Transport(format!("Failed to serialize frame: {}", e)))?;
    let length = payload.len() as u32;

    writer
        .write_all(&length.to_le_bytes())
        .await
        .map_err(|e| Error::Transport(format!("Failed to write frame length: {}", e)))?;
    writer
        .write_all(&payload)
        .await
        .map_err(|e| Error::Transport(format!("Failed to write frame payload: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Transport(format!("Failed to flush frame: {}", e)))?;

    Ok(())
}

/// Pairs a writer and reader into a transport and hands back the channel
/// frames will arrive on.
pub struct PipeTransport<W, R> {
    writer: W,
    reader: PipeReader<R>,
}

impl<W, R> PipeTransport<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncRead + Unpin + Send,
{
    pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let transport = Self {
            writer,
            reader: PipeReader { reader, frame_tx },
        };
        (transport, frame_rx)
    }

    /// Split into the writing half and the reading half. The reader is
    /// driven on its own task; the writer is shared behind the connection.
    pub fn into_parts(self) -> (W, PipeReader<R>) {
        (self.writer, self.reader)
    }
}

/// Decodes length-prefixed frames from the driver's stdout.
pub struct PipeReader<R> {
    reader: R,
    frame_tx: mpsc::UnboundedSender<Value>,
}

impl<R> PipeReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    pub async fn run_loop(&mut self) -> Result<()> {
        loop {
            let mut length_bytes = [0u8; 4];
            let n = self
                .reader
                .read(&mut length_bytes)
                .await
                .map_err(|e| Error::Transport(format!("Failed to read frame length: {}", e)))?;

            if n == 0 {
                // EOF on a frame boundary. The peer closed the pipe.
                tracing::debug!("transport reader reached EOF");
                return Ok(());
            }
            if n < 4 {
                self.reader
                    .read_exact(&mut length_bytes[n..])
                    .await
                    .map_err(|e| {
                        Error::Transport(format!("Failed to read frame length: {}", e))
                    })?;
            }

            let length = u32::from_le_bytes(length_bytes) as usize;
            let mut payload = vec![0u8; length];

            if length <= READ_CHUNK_SIZE {
                self.reader.read_exact(&mut payload).await.map_err(|e| {
                    Error::Transport(format!("Failed to read frame payload: {}", e))
                })?;
            } else {
                let mut offset = 0;
                while offset < length {
                    let end = (offset + READ_CHUNK_SIZE).min(length);
                    self.reader
                        .read_exact(&mut payload[offset..end])
                        .await
                        .map_err(|e| {
                            Error::Transport(format!("Failed to read frame payload: {}", e))
                        })?;
                    offset = end;
                }
            }

            let frame: Value = serde_json::from_slice(&payload)
                .map_err(|e| Error::Protocol(format!("Malformed frame: {}", e)))?;

            if self.frame_tx.send(frame).is_err() {
                // Receiver dropped; the connection is shutting down.
                return Ok(());
            }
        }
    }
}

impl<R: AsyncRead + Unpin + Send> FrameSource for PipeReader<R> {
    fn run(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.run_loop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn write_raw(writer: &mut (impl AsyncWrite + Unpin), payload: &[u8]) {
        writer
            .write_all(&(payload.len() as u32).to_le_bytes())
            .await
            .unwrap();
        writer.write_all(payload).await.unwrap();
        writer.flush().await.unwrap();
    }

    #[tokio::test]
    async fn round_trips_a_frame() {
        let (client, server) = tokio::io::duplex(4096);
        let (_server_read, mut server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);

        let (transport, mut frame_rx) = PipeTransport::new(client_write, client_read);
        let (_writer, mut reader) = transport.into_parts();
        tokio::spawn(async move { reader.run_loop().await });

        let frame = json!({"id": 1, "guid": "", "method": "initialize"});
        write_raw(&mut server_write, frame.to_string().as_bytes()).await;

        assert_eq!(frame_rx.recv().await, Some(frame));
    }

    #[tokio::test]
    async fn reads_frames_larger_than_one_chunk() {
        let (client, server) = tokio::io::duplex(256 * 1024);
        let (_server_read, mut server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);

        let (transport, mut frame_rx) = PipeTransport::new(client_write, client_read);
        let (_writer, mut reader) = transport.into_parts();
        tokio::spawn(async move { reader.run_loop().await });

        let big = "x".repeat(3 * READ_CHUNK_SIZE + 17);
        let frame = json!({"guid": "page@1", "method": "blob", "params": {"data": big}});
        write_raw(&mut server_write, frame.to_string().as_bytes()).await;

        assert_eq!(frame_rx.recv().await, Some(frame));
    }

    #[tokio::test]
    async fn clean_eof_ends_the_loop() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, mut server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);

        let (transport, mut frame_rx) = PipeTransport::new(client_write, client_read);
        let (_writer, mut reader) = transport.into_parts();

        let frame = json!({"guid": "page@1", "method": "close", "params": {}});
        write_raw(&mut server_write, frame.to_string().as_bytes()).await;
        drop(server_write);

        let status = reader.run_loop().await;
        assert!(status.is_ok());
        drop(reader);
        assert_eq!(frame_rx.recv().await, Some(frame));
        assert_eq!(frame_rx.recv().await, None);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_protocol_error() {
        let (client, server) = tokio::io::duplex(4096);
        let (_server_read, mut server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);

        let (transport, _frame_rx) = PipeTransport::new(client_write, client_read);
        let (_writer, mut reader) = transport.into_parts();

        write_raw(&mut server_write, b"this is not json").await;

        match reader.run_loop().await {
            Err(Error::Protocol(_)) => {}
            other => panic!("expected protocol error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn truncated_frame_is_a_transport_error() {
        let (client, server) = tokio::io::duplex(4096);
        let (_, mut server_write) = tokio::io::split(server);
        let (client_read, client_write) = tokio::io::split(client);

        let (transport, _frame_rx) = PipeTransport::new(client_write, client_read);
        let (_writer, mut reader) = transport.into_parts();

        // Announce 100 bytes but deliver only 5, then close.
        server_write.write_all(&100u32.to_le_bytes()).await.unwrap();
        server_write.write_all(b"hello").await.unwrap();
        drop(server_write);

        match reader.run_loop().await {
            Err(Error::Transport(_)) => {}
            other => panic!("expected transport error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn writer_emits_length_prefixed_json() {
        let (client, server) = tokio::io::duplex(4096);
        let (mut server_read, _server_write) = tokio::io::split(server);
        let (_client_read, mut client_write) = tokio::io::split(client);

        let frame = json!({"id": 7, "guid": "browser@1", "method": "close"});
        write_frame(&mut client_write, &frame).await.unwrap();

        let mut length_bytes = [0u8; 4];
        server_read.read_exact(&mut length_bytes).await.unwrap();
        let length = u32::from_le_bytes(length_bytes) as usize;
        let mut payload = vec![0u8; length];
        server_read.read_exact(&mut payload).await.unwrap();

        assert_eq!(serde_json::from_slice::<Value>(&payload).unwrap(), frame);
    }
}

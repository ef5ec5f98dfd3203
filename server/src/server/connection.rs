//! Client connection handling for rqueue.
//!
//! Handles both text (inline or JSON lines) and binary (MessagePack) protocols.
//! A blocked POP is abandoned as soon as the client hangs up.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, ReadBuf,
};
use tracing::debug;

use crate::protocol::{
    create_binary_frame, is_text_protocol, serialize_msgpack, ConsumerId, Response, ResponseWithId,
};
use crate::queue::QueueManager;

use super::handler::{process_command_binary, process_command_text};

/// Maximum size of a single text line or binary frame
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One client connection; its id tags every job it pops.
#[derive(Debug)]
pub struct Session {
    pub id: ConsumerId,
    pub peer: String,
}

impl Session {
    pub fn new(peer: impl Into<String>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            peer: peer.into(),
        }
    }
}

type ConnResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// What happened while a command was being processed.
enum Outcome<T> {
    Done(T),
    Disconnected,
}

/// Client input with room to push bytes back in front of the stream.
///
/// Input that arrives while a command is still running is read ahead to spot
/// a hang-up, then handed back here so the next command sees it in order.
struct Replay<R> {
    held: Bytes,
    inner: R,
}

impl<R> Replay<R> {
    fn new(inner: R) -> Self {
        Self {
            held: Bytes::new(),
            inner,
        }
    }

    fn has_held(&self) -> bool {
        !self.held.is_empty()
    }

    /// Put `data` back so it is read before anything still held.
    fn unread(&mut self, data: Vec<u8>) {
        if self.held.is_empty() {
            self.held = Bytes::from(data);
            return;
        }
        let mut joined = BytesMut::with_capacity(data.len() + self.held.len());
        joined.extend_from_slice(&data);
        joined.extend_from_slice(&self.held);
        self.held = joined.freeze();
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Replay<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if !self.held.is_empty() {
            let n = self.held.len().min(buf.remaining());
            let chunk = self.held.split_to(n);
            buf.put_slice(&chunk);
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

type ClientReader<R> = BufReader<Replay<R>>;

/// True if more client input is ready without touching the socket.
fn has_buffered<R: AsyncRead + Unpin>(reader: &ClientReader<R>) -> bool {
    !reader.buffer().is_empty() || reader.get_ref().has_held()
}

/// Handle a new connection (auto-detects protocol)
pub async fn handle_connection<R, W>(
    reader: R,
    writer: W,
    queue_manager: Arc<QueueManager>,
    session: Session,
) -> ConnResult
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::with_capacity(128 * 1024, Replay::new(reader));
    let mut writer = BufWriter::with_capacity(128 * 1024, writer);

    // Peek first byte to detect protocol
    let first_byte = {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        buf[0]
    };

    debug!(
        session = session.id,
        peer = %session.peer,
        text = is_text_protocol(first_byte),
        "Client connected"
    );

    let result = if is_text_protocol(first_byte) {
        handle_text_protocol(&mut reader, &mut writer, &queue_manager, &session).await
    } else {
        handle_binary_protocol(&mut reader, &mut writer, &queue_manager, &session).await
    };

    debug!(session = session.id, peer = %session.peer, "Client disconnected");
    result
}

/// Run `work` while watching the socket.
///
/// If the peer closes the connection first, `work` is dropped, which cancels
/// a blocked POP. Pipelined input is set aside until `work` finishes, so EOF
/// behind it is still noticed, and is then replayed for the next command.
/// Read-ahead stops once a full frame's worth is held.
async fn watch_disconnect<R, F>(reader: &mut ClientReader<R>, work: F) -> io::Result<Outcome<F::Output>>
where
    R: AsyncRead + Unpin,
    F: Future,
{
    tokio::pin!(work);
    let mut held = Vec::new();

    let outcome = loop {
        tokio::select! {
            biased;
            output = &mut work => break Outcome::Done(output),
            read = reader.fill_buf(), if held.len() <= MAX_FRAME_SIZE => {
                let n = {
                    let buf = read?;
                    held.extend_from_slice(buf);
                    buf.len()
                };
                if n == 0 {
                    break Outcome::Disconnected;
                }
                reader.consume(n);
            }
        }
    };

    if !held.is_empty() {
        reader.get_mut().unread(held);
    }
    Ok(outcome)
}

/// Handle text protocol (newline-delimited inline commands or JSON objects)
async fn handle_text_protocol<R, W>(
    reader: &mut ClientReader<R>,
    writer: &mut BufWriter<W>,
    queue_manager: &QueueManager,
    session: &Session,
) -> ConnResult
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut raw = Vec::with_capacity(8192);

    loop {
        raw.clear();
        let bytes_read = (&mut *reader)
            .take(MAX_FRAME_SIZE as u64 + 1)
            .read_until(b'\n', &mut raw)
            .await?;

        if bytes_read == 0 {
            break;
        }

        if raw.len() > MAX_FRAME_SIZE {
            write_text(writer, &ResponseWithId::new(Response::error("Line too long"), None)).await?;
            writer.flush().await?;
            break;
        }

        let response = match std::str::from_utf8(&raw) {
            // Blank lines are keep-alives
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                let work = process_command_text(line, queue_manager, session);
                match watch_disconnect(reader, work).await? {
                    Outcome::Done(response) => response,
                    Outcome::Disconnected => break,
                }
            }
            Err(_) => ResponseWithId::new(Response::error("Invalid: command is not UTF-8"), None),
        };

        write_text(writer, &response).await?;

        // Pipelining: only flush if no more commands waiting in buffer
        if !has_buffered(reader) {
            writer.flush().await?;
        }
    }

    writer.flush().await?;
    Ok(())
}

async fn write_text<W>(writer: &mut BufWriter<W>, response: &ResponseWithId) -> ConnResult
where
    W: AsyncWrite + Unpin,
{
    let response_json = serde_json::to_string(response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

/// Handle binary protocol (MessagePack, length-prefixed frames)
/// Frame format: [4 bytes length (big-endian u32)] [N bytes MessagePack data]
async fn handle_binary_protocol<R, W>(
    reader: &mut ClientReader<R>,
    writer: &mut BufWriter<W>,
    queue_manager: &QueueManager,
    session: &Session,
) -> ConnResult
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut len_buf = [0u8; 4];
    let mut data_buf = Vec::with_capacity(8192);

    loop {
        // Read 4-byte length prefix
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;

        // The stream cannot be resynchronised after an oversized frame
        if len > MAX_FRAME_SIZE {
            let err_response = ResponseWithId::new(Response::error("Message too large"), None);
            writer.write_all(&create_binary_frame(&serialize_msgpack(&err_response)?)).await?;
            writer.flush().await?;
            break;
        }

        data_buf.clear();
        data_buf.resize(len, 0);
        reader.read_exact(&mut data_buf).await?;

        let work = process_command_binary(&data_buf, queue_manager, session);
        let response = match watch_disconnect(reader, work).await? {
            Outcome::Done(response) => response,
            Outcome::Disconnected => break,
        };

        let response_bytes = serialize_msgpack(&response)?;
        writer.write_all(&create_binary_frame(&response_bytes)).await?;

        // Pipelining: only flush if no more commands waiting in buffer
        if !has_buffered(reader) {
            writer.flush().await?;
        }
    }

    writer.flush().await?;
    Ok(())
}

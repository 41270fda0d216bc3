//! Test doubles for the network layer

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use super::Connector;
use crate::protocol::{encode, Decoder, HashHex, Message, HASH_RESPONSE_SIZE};

/// Deterministic stand-in for the server's hash: 32 lowercase hex digits
pub fn fake_hash(data: &[u8]) -> HashHex {
    let fnv = |seed: u64| {
        data.iter().fold(seed, |h, &b| (h ^ b as u64).wrapping_mul(0x0100_0000_01b3))
    };
    let text = format!("{:016x}{:016x}", fnv(0xcbf2_9ce4_8422_2325), fnv(0x8422_2325_cbf2_9ce4));
    HashHex::from_slice(text.as_bytes()).unwrap()
}

/// Encode a sequence of messages as one contiguous byte buffer
pub fn wire(messages: &[Message]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for message in messages {
        encode(message, &mut buf).unwrap();
    }
    buf.to_vec()
}

/// Shared view of what a `ChunkedStream` saw, usable after the stream is moved
#[derive(Clone, Default)]
pub struct StreamProbe {
    written: Arc<Mutex<Vec<u8>>>,
    shut_down: Arc<AtomicBool>,
}

impl StreamProbe {
    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

/// In-memory stream that serves `input` to readers and records writes.
///
/// Every read and write is capped by the next entry of a cycling chunk-size
/// pattern, so callers see short transfers. Once `input` is exhausted reads
/// return 0 bytes; once `write_limit` bytes were accepted writes return 0.
pub struct ChunkedStream {
    input: Vec<u8>,
    read_pos: usize,
    chunks: Vec<usize>,
    read_turn: usize,
    write_turn: usize,
    write_limit: Option<usize>,
    write_calls: usize,
    probe: StreamProbe,
}

impl ChunkedStream {
    pub fn new(input: Vec<u8>) -> Self {
        Self {
            input,
            read_pos: 0,
            chunks: Vec::new(),
            read_turn: 0,
            write_turn: 0,
            write_limit: None,
            write_calls: 0,
            probe: StreamProbe::default(),
        }
    }

    /// Cap successive transfers at these sizes (repeating). Zero entries are ignored.
    pub fn with_chunks(mut self, chunks: Vec<usize>) -> Self {
        self.chunks = chunks.into_iter().filter(|&c| c > 0).collect();
        self
    }

    /// Accept at most `limit` written bytes in total
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit);
        self
    }

    pub fn probe(&self) -> StreamProbe {
        self.probe.clone()
    }

    pub fn written(&self) -> Vec<u8> {
        self.probe.written()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls
    }

    fn chunk(chunks: &[usize], turn: &mut usize) -> usize {
        if chunks.is_empty() {
            return usize::MAX;
        }
        let size = chunks[*turn % chunks.len()];
        *turn += 1;
        size
    }
}

impl AsyncRead for ChunkedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let available = this.input.len() - this.read_pos;
        if available == 0 || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let cap = Self::chunk(&this.chunks, &mut this.read_turn);
        let n = cap.min(available).min(buf.remaining());
        buf.put_slice(&this.input[this.read_pos..this.read_pos + n]);
        this.read_pos += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ChunkedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        this.write_calls += 1;

        let mut written = this.probe.written.lock().unwrap();
        let room = match this.write_limit {
            Some(limit) => limit.saturating_sub(written.len()),
            None => usize::MAX,
        };
        let cap = Self::chunk(&this.chunks, &mut this.write_turn);
        let n = cap.min(room).min(buf.len());
        written.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.probe.shut_down.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// Hands out pre-built streams, one per `connect` call.
/// A `None` entry makes that attempt fail with `ConnectionRefused`.
pub struct ScriptedConnector {
    streams: Mutex<VecDeque<Option<ChunkedStream>>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(streams: Vec<Option<ChunkedStream>>) -> Self {
        Self {
            streams: Mutex::new(streams.into()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn single(stream: ChunkedStream) -> Self {
        Self::new(vec![Some(stream)])
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    type Stream = ChunkedStream;

    async fn connect(&self) -> io::Result<ChunkedStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.streams
            .lock()
            .unwrap()
            .pop_front()
            .flatten()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "scripted refusal"))
    }

    fn peer(&self) -> String {
        "scripted".to_string()
    }
}

/// A hash server on a loopback socket that answers in reverse index order.
///
/// Serves `sessions` connections one after another and yields the request
/// payloads it received, per session.
pub struct FakeServer {
    pub addr: SocketAddr,
    handle: JoinHandle<io::Result<Vec<Vec<Vec<u8>>>>>,
}

impl FakeServer {
    pub async fn spawn(sessions: usize) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            let mut seen = Vec::with_capacity(sessions);
            for _ in 0..sessions {
                let (mut stream, _) = listener.accept().await?;
                seen.push(serve_one(&mut stream).await?);
            }
            Ok::<_, io::Error>(seen)
        });

        Ok(Self { addr, handle })
    }

    /// Wait for all sessions and return the payloads received in each
    pub async fn finish(self) -> Vec<Vec<Vec<u8>>> {
        self.handle.await.unwrap().unwrap()
    }
}

async fn next_message(
    stream: &mut tokio::net::TcpStream,
    decoder: &mut Decoder,
    buf: &mut BytesMut,
) -> io::Result<Message> {
    loop {
        if let Some(message) = decoder
            .decode(buf)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?
        {
            return Ok(message);
        }
        if stream.read_buf(buf).await? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
    }
}

async fn serve_one(stream: &mut tokio::net::TcpStream) -> io::Result<Vec<Vec<u8>>> {
    let mut decoder = Decoder::new();
    let mut buf = BytesMut::new();

    let count = match next_message(stream, &mut decoder, &mut buf).await? {
        Message::Init { count } => count,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected Init, got {:?}", other),
            ))
        }
    };

    let ack = Message::Ack {
        expected_bytes: count * HASH_RESPONSE_SIZE as u32,
    };
    stream.write_all(&wire(&[ack])).await?;

    let mut payloads = Vec::with_capacity(count as usize);
    for _ in 0..count {
        match next_message(stream, &mut decoder, &mut buf).await? {
            Message::HashRequest { payload } => payloads.push(payload.to_vec()),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("expected HashRequest, got {:?}", other),
                ))
            }
        }
    }

    let responses: Vec<Message> = payloads
        .iter()
        .enumerate()
        .rev()
        .map(|(i, payload)| Message::HashResponse {
            index: i as u32,
            hex: fake_hash(payload),
        })
        .collect();
    stream.write_all(&wire(&responses)).await?;
    stream.shutdown().await?;

    Ok(payloads)
}

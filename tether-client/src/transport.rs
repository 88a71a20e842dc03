//! Concrete transports.
//!
//! * [`IntermediateTcp`]: MTProto intermediate framing over TCP, opened by
//!   [`TcpDialer`], optionally through a SOCKS5 proxy.
//! * [`MemoryTransport`]: an in-process frame pipe, mostly for tests.

use std::io;
use std::sync::Mutex;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio_socks::tcp::Socks5Stream;
use tokio_util::sync::CancellationToken;

use tether_mtproto::{Dialer, Transport};

// ─── Intermediate TCP ─────────────────────────────────────────────────────────

/// Sent once, right after the TCP connection opens.
const INTERMEDIATE_TAG: [u8; 4] = [0xee, 0xee, 0xee, 0xee];

/// Frames above this size are treated as a corrupt stream.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// [MTProto Intermediate] framing: every frame is prefixed with its
/// 4-byte little-endian length.
///
/// The stream is split so that [`recv`](Transport::recv) and
/// [`send`](Transport::send) never wait on each other.
///
/// [MTProto Intermediate]: https://core.telegram.org/mtproto/mtproto-transports#intermediate
pub struct IntermediateTcp {
    reader: AsyncMutex<OwnedReadHalf>,
    writer: AsyncMutex<OwnedWriteHalf>,
    closed: CancellationToken,
}

impl IntermediateTcp {
    /// Send the intermediate tag over `stream` and wrap it.
    pub async fn handshake(mut stream: TcpStream) -> io::Result<Self> {
        stream.write_all(&INTERMEDIATE_TAG).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: AsyncMutex::new(reader),
            writer: AsyncMutex::new(writer),
            closed: CancellationToken::new(),
        })
    }

    async fn read_frame(&self) -> io::Result<Vec<u8>> {
        let mut reader = self.reader.lock().await;
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf).await?;
        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(io::ErrorKind::InvalidData, format!("frame of {len} bytes is too large")));
        }
        let mut frame = vec![0u8; len];
        reader.read_exact(&mut frame).await?;
        Ok(frame)
    }
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "transport closed")
}

impl Transport for IntermediateTcp {
    async fn send(&self, frame: &[u8]) -> io::Result<()> {
        if self.closed.is_cancelled() {
            return Err(closed_error());
        }
        let len = u32::try_from(frame.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
        let mut packet = Vec::with_capacity(4 + frame.len());
        packet.extend_from_slice(&len.to_le_bytes());
        packet.extend_from_slice(frame);
        self.writer.lock().await.write_all(&packet).await
    }

    async fn recv(&self) -> io::Result<Vec<u8>> {
        tokio::select! {
            _ = self.closed.cancelled() => Err(closed_error()),
            frame = self.read_frame() => frame,
        }
    }

    async fn close(&self) -> io::Result<()> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();
        match self.writer.lock().await.shutdown().await {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}

// ─── SOCKS5 ───────────────────────────────────────────────────────────────────

/// SOCKS5 proxy configuration for [`TcpDialer`].
#[derive(Clone, Debug)]
pub struct Socks5Config {
    /// Host:port of the proxy.
    pub proxy_addr: String,
    /// Optional username and password.
    pub auth:       Option<(String, String)>,
}

impl Socks5Config {
    pub fn new(proxy_addr: impl Into<String>) -> Self {
        Self { proxy_addr: proxy_addr.into(), auth: None }
    }

    pub fn with_auth(
        proxy_addr: impl Into<String>,
        username:   impl Into<String>,
        password:   impl Into<String>,
    ) -> Self {
        Self { proxy_addr: proxy_addr.into(), auth: Some((username.into(), password.into())) }
    }

    /// Open a TCP stream to `target` tunnelled through the proxy.
    pub async fn connect(&self, target: &str) -> io::Result<TcpStream> {
        tracing::info!(proxy = %self.proxy_addr, target, "[tether] connecting via SOCKS5");
        let stream = match &self.auth {
            None => Socks5Stream::connect(self.proxy_addr.as_str(), target).await,
            Some((user, pass)) => {
                Socks5Stream::connect_with_password(self.proxy_addr.as_str(), target, user, pass).await
            }
        }
        .map_err(io::Error::other)?;
        Ok(stream.into_inner())
    }
}

// ─── TCP dialer ───────────────────────────────────────────────────────────────

/// Dials [`IntermediateTcp`] connections to one address.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use tether_client::transport::{Socks5Config, TcpDialer};
///
/// let dialer = TcpDialer::new("149.154.167.51:443")
///     .socks5(Socks5Config::new("127.0.0.1:1080"))
///     .keepalive(Duration::from_secs(30));
/// ```
#[derive(Clone, Debug)]
pub struct TcpDialer {
    addr:      String,
    socks5:    Option<Socks5Config>,
    keepalive: Option<Duration>,
}

impl TcpDialer {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), socks5: None, keepalive: None }
    }

    /// Route every connection through a SOCKS5 proxy.
    pub fn socks5(mut self, proxy: Socks5Config) -> Self {
        self.socks5 = Some(proxy);
        self
    }

    /// Enable TCP keepalive probes after `idle` without traffic.
    pub fn keepalive(mut self, idle: Duration) -> Self {
        self.keepalive = Some(idle);
        self
    }
}

impl Dialer for TcpDialer {
    type Transport = IntermediateTcp;

    async fn dial(&self) -> io::Result<IntermediateTcp> {
        let stream = match &self.socks5 {
            Some(proxy) => proxy.connect(&self.addr).await?,
            None => TcpStream::connect(self.addr.as_str()).await?,
        };
        stream.set_nodelay(true)?;
        if let Some(idle) = self.keepalive {
            SockRef::from(&stream).set_tcp_keepalive(&TcpKeepalive::new().with_time(idle))?;
        }
        tracing::debug!(addr = %self.addr, "[tether] TCP connected");
        IntermediateTcp::handshake(stream).await
    }
}

// ─── In-memory ────────────────────────────────────────────────────────────────

/// One end of an in-process frame pipe.
///
/// Closing either end closes both: pending and future `recv` calls on
/// each side fail.
pub struct MemoryTransport {
    tx:     mpsc::UnboundedSender<Vec<u8>>,
    rx:     AsyncMutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    closed: CancellationToken,
}

impl MemoryTransport {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        (
            Self { tx: a_tx, rx: AsyncMutex::new(a_rx), closed: closed.clone() },
            Self { tx: b_tx, rx: AsyncMutex::new(b_rx), closed },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl Transport for MemoryTransport {
    async fn send(&self, frame: &[u8]) -> io::Result<()> {
        if self.closed.is_cancelled() {
            return Err(closed_error());
        }
        self.tx
            .send(frame.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
    }

    async fn recv(&self) -> io::Result<Vec<u8>> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(closed_error()),
            frame = rx.recv() => frame.ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "peer dropped")),
        }
    }

    async fn close(&self) -> io::Result<()> {
        self.closed.cancel();
        Ok(())
    }
}

/// Hands out a single pre-built [`MemoryTransport`].
#[derive(Default)]
pub struct MemoryDialer {
    conn: Mutex<Option<MemoryTransport>>,
}

impl MemoryDialer {
    pub fn new(conn: MemoryTransport) -> Self {
        Self { conn: Mutex::new(Some(conn)) }
    }
}

impl Dialer for MemoryDialer {
    type Transport = MemoryTransport;

    async fn dial(&self) -> io::Result<MemoryTransport> {
        self.conn
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::ConnectionRefused, "memory transport already taken"))
    }
}

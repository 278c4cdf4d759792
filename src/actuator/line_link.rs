//! Line-oriented actuator link over TCP or a character device.

use super::device::DeviceStream;
use super::{ActuatorFault, ActuatorLink};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf,
};
use tokio::net::TcpStream;
use tokio::time::Instant;

/// Initial reconnection delay (doubles each failed attempt).
const INITIAL_RECONNECT_DELAY_SECS: u64 = 2;

/// Maximum reconnection delay cap (seconds).
const MAX_RECONNECT_DELAY_SECS: u64 = 60;

/// Where the actuator lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `host:port` of a networked controller
    Tcp(String),
    /// Serial port or other character device, already configured for baud
    /// rate and framing (e.g. with `stty -F /dev/ttyUSB0 115200 raw`)
    Device(PathBuf),
}

impl Endpoint {
    /// Parse `actuator.endpoint`. Returns `None` for `null` or an empty
    /// string, meaning no actuator.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
            return None;
        }
        match raw.strip_prefix("tcp://") {
            Some(addr) => Some(Endpoint::Tcp(addr.to_string())),
            None => Some(Endpoint::Device(PathBuf::from(raw))),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            Endpoint::Device(path) => write!(f, "{}", path.display()),
        }
    }
}

trait Duplex: AsyncRead + AsyncWrite + Send + Sync + Unpin {}
impl<T: AsyncRead + AsyncWrite + Send + Sync + Unpin> Duplex for T {}

type BoxedStream = Box<dyn Duplex>;

struct Connection {
    reader: BufReader<ReadHalf<BoxedStream>>,
    writer: WriteHalf<BoxedStream>,
}

/// Actuator link with settle delay and exponential-backoff reconnection.
pub struct LineLink {
    endpoint: Endpoint,
    settle: Duration,
    connect_timeout: Duration,
    conn: Option<Connection>,
    line_buffer: String,
    /// Consecutive failed connection attempts (resets on success)
    failed_attempts: u32,
    /// Earliest time the next reconnection may be tried
    next_attempt: Option<Instant>,
}

impl LineLink {
    pub fn new(endpoint: Endpoint, settle: Duration, connect_timeout: Duration) -> Self {
        Self {
            endpoint,
            settle,
            connect_timeout,
            conn: None,
            line_buffer: String::with_capacity(128),
            failed_attempts: 0,
            next_attempt: None,
        }
    }

    async fn open(endpoint: &Endpoint, connect_timeout: Duration) -> Result<BoxedStream, ActuatorFault> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
                    .await
                    .map_err(|_| ActuatorFault::ConnectionFailed(format!("connect to {addr} timed out")))?
                    .map_err(|e| ActuatorFault::ConnectionFailed(format!("{addr}: {e}")))?;

                // Detect controllers that vanish without closing the socket
                let sock_ref = socket2::SockRef::from(&stream);
                let keepalive = socket2::TcpKeepalive::new()
                    .with_time(Duration::from_secs(30))
                    .with_interval(Duration::from_secs(10));
                let _ = sock_ref.set_tcp_keepalive(&keepalive);
                let _ = stream.set_nodelay(true);

                Ok(Box::new(stream))
            }
            Endpoint::Device(path) => {
                let device = DeviceStream::open(path)
                    .map_err(|e| ActuatorFault::ConnectionFailed(format!("{}: {e}", path.display())))?;
                Ok(Box::new(device))
            }
        }
    }

    fn backoff_delay(failed_attempts: u32) -> Duration {
        let secs = INITIAL_RECONNECT_DELAY_SECS
            .saturating_mul(2u64.saturating_pow(failed_attempts.saturating_sub(1)))
            .min(MAX_RECONNECT_DELAY_SECS);
        Duration::from_secs(secs)
    }
}

#[async_trait]
impl ActuatorLink for LineLink {
    async fn connect(&mut self) -> Result<(), ActuatorFault> {
        if self.conn.is_some() {
            return Ok(());
        }

        tracing::info!(endpoint = %self.endpoint, "Connecting to actuator");

        let stream = match Self::open(&self.endpoint, self.connect_timeout).await {
            Ok(stream) => stream,
            Err(e) => {
                self.failed_attempts = self.failed_attempts.saturating_add(1);
                let delay = Self::backoff_delay(self.failed_attempts);
                self.next_attempt = Some(Instant::now() + delay);
                tracing::warn!(
                    endpoint = %self.endpoint,
                    attempt = self.failed_attempts,
                    retry_in_secs = delay.as_secs(),
                    error = %e,
                    "Actuator connection failed"
                );
                return Err(e);
            }
        };

        let (read_half, write_half) = tokio::io::split(stream);
        self.conn = Some(Connection {
            reader: BufReader::new(read_half),
            writer: write_half,
        });

        // Microcontrollers reset when the port opens
        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        tracing::info!(
            endpoint = %self.endpoint,
            failed_attempts = self.failed_attempts,
            "Actuator connection established"
        );
        self.failed_attempts = 0;
        self.next_attempt = None;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<(), ActuatorFault> {
        if let Some(at) = self.next_attempt {
            if Instant::now() < at {
                return Err(ActuatorFault::NotConnected);
            }
        }
        self.connect().await
    }

    async fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.writer.shutdown().await;
            tracing::info!(endpoint = %self.endpoint, "Actuator connection closed");
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn send_line(&mut self, line: &str) -> Result<(), ActuatorFault> {
        let conn = self.conn.as_mut().ok_or(ActuatorFault::NotConnected)?;
        let framed = format!("{line}\n");
        let result = async {
            conn.writer.write_all(framed.as_bytes()).await?;
            conn.writer.flush().await
        }
        .await;

        if let Err(e) = result {
            self.conn = None;
            return Err(ActuatorFault::Io(e));
        }
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Option<String>, ActuatorFault> {
        let conn = self.conn.as_mut().ok_or(ActuatorFault::NotConnected)?;
        self.line_buffer.clear();
        let bytes = conn.reader.read_line(&mut self.line_buffer).await?;
        if bytes == 0 {
            tracing::warn!(endpoint = %self.endpoint, "Actuator closed the connection");
            self.conn = None;
            return Ok(None);
        }
        Ok(Some(self.line_buffer.trim().to_string()))
    }

    fn link_name(&self) -> &str {
        match self.endpoint {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Device(_) => "device",
        }
    }
}

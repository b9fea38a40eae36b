use crate::error::{Cp750Error, Result};
use crate::gate::AvailabilityGate;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Line-protocol client owning the TCP connection to the processor
///
/// The CP750 protocol has no acknowledgement framing, no checksums, and no
/// distinguished error replies; an empty read is the only observable failure
/// signal. Resilience therefore lives entirely here: a hard 2 second bound on
/// every read and exactly one disconnect+reconnect+resend when the device
/// goes silent.
///
/// The transport is not internally synchronized. Callers share it behind a
/// `tokio::sync::Mutex` and hold the lock across each full request/response
/// exchange, since interleaving two exchanges on one line-oriented stream
/// would corrupt both replies.
pub struct Transport {
    host: String,
    port: u16,
    gate: AvailabilityGate,
    stream: Option<BufReader<TcpStream>>,
    /// Shared with the device handle so presentation reads never contend on
    /// the connection mutex
    available: Arc<AtomicBool>,
}

impl Transport {
    /// Create a disconnected transport for `host:port`, gated by `gate`
    pub fn new(host: impl Into<String>, port: u16, gate: AvailabilityGate) -> Self {
        Self {
            host: host.into(),
            port,
            gate,
            stream: None,
            available: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the last exchange over this connection succeeded
    ///
    /// Presentation only: gating decisions are re-evaluated per call, never
    /// read from this flag.
    pub fn available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Handle to the availability flag, readable without the connection lock
    pub(crate) fn shared_available(&self) -> Arc<AtomicBool> {
        self.available.clone()
    }

    /// Open the TCP connection
    ///
    /// Replaces any existing connection. The fresh read buffer discards
    /// anything the device sent before we were listening.
    pub async fn connect(&mut self) -> Result<()> {
        if !self.gate.is_available() {
            return Err(Cp750Error::GateClosed);
        }
        self.disconnect().await;

        tracing::debug!("connecting to {}:{}", self.host, self.port);
        let stream = match timeout(
            CONNECT_TIMEOUT,
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(err)) => return Err(Cp750Error::ConnectionFailure(err)),
            Err(_) => {
                return Err(Cp750Error::ConnectionFailure(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connect timed out",
                )))
            }
        };

        self.stream = Some(BufReader::new(stream));
        Ok(())
    }

    /// Close the connection
    ///
    /// Idempotent and best-effort: close-time errors are swallowed.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.get_mut().shutdown().await;
        }
        self.available.store(false, Ordering::Relaxed);
    }

    /// Send one command and return the trimmed reply line, unparsed
    ///
    /// Fails fast with [`Cp750Error::GateClosed`] when the availability gate
    /// denies access, without touching the socket. Connects first if needed.
    /// An empty reply triggers exactly one reconnect+resend; a second empty
    /// reply is [`Cp750Error::NoResponse`]. I/O errors and timeouts
    /// disconnect and surface as [`Cp750Error::CommandFailure`].
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        if !self.gate.is_available() {
            return Err(Cp750Error::GateClosed);
        }

        let reply = self.exchange(command).await?;
        if !reply.is_empty() {
            self.available.store(true, Ordering::Relaxed);
            return Ok(reply);
        }

        // Known failure mode of this device class: the command is accepted
        // but the reply never comes. The only recovery that works in
        // practice is a fresh connection and one resend.
        tracing::debug!("empty reply to {command:?}, reconnecting for one retry");
        self.disconnect().await;
        let reply = self.exchange(command).await?;
        if reply.is_empty() {
            self.disconnect().await;
            return Err(Cp750Error::NoResponse);
        }

        self.available.store(true, Ordering::Relaxed);
        Ok(reply)
    }

    /// One write+read leg: connect if needed, send, read one bounded line
    async fn exchange(&mut self, command: &str) -> Result<String> {
        if self.stream.is_none() {
            self.connect().await?;
        }

        let outcome = async {
            let stream = self.stream.as_mut().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, "transport not connected")
            })?;

            stream.get_mut().write_all(command.as_bytes()).await?;
            stream.get_mut().write_all(b"\r\n").await?;
            stream.get_mut().flush().await?;

            let mut line = String::new();
            timeout(REPLY_TIMEOUT, stream.read_line(&mut line))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "no reply within 2s"))??;
            Ok::<_, io::Error>(line)
        }
        .await;

        match outcome {
            Ok(line) => Ok(line.trim().to_string()),
            Err(err) => {
                self.disconnect().await;
                Err(Cp750Error::CommandFailure(err))
            }
        }
    }
}

//! Wi-Fi 主控的 TCP 传输
//!
//! 连接流程：
//! 1. TCP 连接到 `addr:5555`
//! 2. 发送解锁请求 `GET /target?sn=<serial>VMTP1.0\r\nProtocol: EV3`
//! 3. 等待包含 `Accept:EV340` 的应答
//! 4. 之后的所有数据都是 2 字节长度前缀的帧

use crate::framing::FrameCodec;
use crate::{
    FrameWriter, ReportReader, Transport, TransportDeviceError, TransportDeviceErrorKind,
    TransportError,
};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// 主控监听端口
pub const DEFAULT_PORT: u16 = 5555;

const ACCEPT_TOKEN: &str = "Accept:EV340";
const HANDSHAKE_LIMIT: usize = 512;
/// `set_read_timeout` 不接受零时长
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// TCP 传输（连接前）
pub struct TcpTransport {
    address: String,
    serial: String,
    connect_timeout: Duration,
    handshake_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// `address` 可以是 `host` 或 `host:port`，未给端口时使用 5555
    pub fn new(address: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            serial: serial.into(),
            connect_timeout: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(2),
            stream: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    fn resolve(&self) -> Result<SocketAddr, TransportError> {
        let target = if self.address.contains(':') {
            self.address.clone()
        } else {
            format!("{}:{}", self.address, DEFAULT_PORT)
        };
        target.to_socket_addrs()?.next().ok_or_else(|| {
            TransportDeviceError::new(
                TransportDeviceErrorKind::NotFound,
                format!("cannot resolve {}", target),
            )
            .into()
        })
    }

    fn handshake(&self, stream: &mut TcpStream) -> Result<(), TransportError> {
        stream.write_all(unlock_request(&self.serial).as_bytes())?;
        stream.set_read_timeout(Some(self.handshake_timeout))?;

        let mut response = Vec::with_capacity(64);
        let mut chunk = [0u8; 64];
        loop {
            let n = match stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => n,
                Err(e) if is_timeout(&e) => {
                    return Err(TransportDeviceError::new(
                        TransportDeviceErrorKind::HandshakeRejected,
                        "no unlock response",
                    )
                    .into());
                },
                Err(e) => return Err(e.into()),
            };
            response.extend_from_slice(&chunk[..n]);
            if contains_accept(&response) {
                return Ok(());
            }
            if response.len() > HANDSHAKE_LIMIT {
                return Err(TransportDeviceError::new(
                    TransportDeviceErrorKind::HandshakeRejected,
                    String::from_utf8_lossy(&response).into_owned(),
                )
                .into());
            }
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let addr = self.resolve()?;
        info!("Connecting to EV3 at {}", addr);
        let mut stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_nodelay(true)?;
        self.handshake(&mut stream)?;
        debug!("EV3 unlock accepted");
        self.stream = Some(stream);
        Ok(())
    }

    fn split(
        &mut self,
    ) -> Result<(Box<dyn ReportReader>, Box<dyn FrameWriter>), TransportError> {
        let stream = self.stream.take().ok_or(TransportError::NotConnected)?;
        let rx = stream.try_clone()?;
        Ok((
            Box::new(TcpReportReader {
                stream: rx,
                codec: FrameCodec::new(),
            }),
            Box::new(TcpFrameWriter { stream }),
        ))
    }
}

/// 接收半部
pub struct TcpReportReader {
    stream: TcpStream,
    codec: FrameCodec,
}

impl ReportReader for TcpReportReader {
    fn receive_report(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(report) = self.codec.next_report() {
                trace!("RX report: {} bytes", report.len());
                return Ok(report);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout);
            }
            self.stream.set_read_timeout(Some(remaining.max(MIN_READ_TIMEOUT)))?;
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => self.codec.extend(&chunk[..n]),
                Err(e) if is_timeout(&e) => return Err(TransportError::Timeout),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// 发送半部
pub struct TcpFrameWriter {
    stream: TcpStream,
}

impl FrameWriter for TcpFrameWriter {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let framed = FrameCodec::encode(frame)?;
        self.stream.write_all(&framed)?;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => {
                warn!("TCP shutdown failed: {}", e);
                Err(e.into())
            },
        }
    }
}

fn unlock_request(serial: &str) -> String {
    format!("GET /target?sn={}VMTP1.0\r\nProtocol: EV3", serial)
}

fn contains_accept(response: &[u8]) -> bool {
    response
        .windows(ACCEPT_TOKEN.len())
        .any(|w| w == ACCEPT_TOKEN.as_bytes())
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

//! # EV3 Transport
//!
//! EV3 主控传输层抽象
//!
//! 传输层只负责"连接、发送完整帧、接收完整报告、断开"。长度前缀等
//! 成帧细节由各介质自行处理，驱动层看到的永远是已去掉前缀的报告。
//!
//! ## 后端
//!
//! - `tcp`: Wi-Fi 主控（默认启用）
//! - `mock`: 内存模拟设备，用于测试

use std::time::Duration;
use thiserror::Error;

pub mod framing;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "mock")]
pub mod mock;

pub use framing::FrameCodec;

#[cfg(feature = "tcp")]
pub use tcp::{DEFAULT_PORT, TcpTransport};

#[cfg(feature = "mock")]
pub use mock::{MockHandle, MockTransport};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Device Error: {0}")]
    Device(#[from] TransportDeviceError),
    /// 在给定时间内没有收到完整报告（非致命）
    #[error("Read timeout")]
    Timeout,
    #[error("Transport not connected")]
    NotConnected,
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// 是否应当终止接收循环
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Timeout => false,
            TransportError::Device(e) => e.is_fatal(),
            _ => true,
        }
    }
}

/// 设备/后端错误的结构化分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportDeviceErrorKind {
    Unknown,
    NotFound,
    /// 解锁握手被拒绝
    HandshakeRejected,
    /// 报告长度前缀非法
    InvalidFrame,
    /// 帧超出介质允许的最大长度
    FrameTooLarge,
}

/// 结构化设备错误
#[derive(Error, Debug, Clone)]
#[error("{kind:?}: {message}")]
pub struct TransportDeviceError {
    pub kind: TransportDeviceErrorKind,
    pub message: String,
}

impl TransportDeviceError {
    pub fn new(kind: TransportDeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            TransportDeviceErrorKind::NotFound | TransportDeviceErrorKind::HandshakeRejected
        )
    }
}

impl From<&str> for TransportDeviceError {
    fn from(message: &str) -> Self {
        Self::new(TransportDeviceErrorKind::Unknown, message)
    }
}

/// 可连接并拆分为收/发两半的传输
///
/// 驱动层在 `connect` 成功后立即调用 `split`：接收半部交给 RX 线程，
/// 发送半部由写锁保护，供所有调用方共享。断开后可以再次 `connect`。
pub trait Transport: Send {
    fn connect(&mut self) -> Result<(), TransportError>;

    /// 取出本次连接的收/发两半；未连接时返回 `NotConnected`
    fn split(&mut self) -> Result<(Box<dyn ReportReader>, Box<dyn FrameWriter>), TransportError>;
}

/// 接收半部：每次返回一份完整报告
pub trait ReportReader: Send {
    /// 在 `timeout` 内等待一份报告；超时返回 [`TransportError::Timeout`]
    fn receive_report(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError>;
}

/// 发送半部：每次写出一帧
pub trait FrameWriter: Send {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// 关闭连接；接收半部随后应返回 `Closed`
    fn disconnect(&mut self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_not_fatal() {
        assert!(!TransportError::Timeout.is_fatal());
        assert!(TransportError::Closed.is_fatal());
        assert!(
            TransportError::Device(TransportDeviceError::new(
                TransportDeviceErrorKind::HandshakeRejected,
                "no Accept:EV340"
            ))
            .is_fatal()
        );
        assert!(!TransportError::Device("bad prefix".into()).is_fatal());
    }

    #[test]
    fn test_device_error_display() {
        let err = TransportDeviceError::new(TransportDeviceErrorKind::InvalidFrame, "len 0");
        assert_eq!(err.to_string(), "InvalidFrame: len 0");
    }
}

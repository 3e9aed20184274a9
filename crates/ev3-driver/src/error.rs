//! 驱动层错误类型定义

use ev3_protocol::{ProtocolError, SystemReplyStatus};
use ev3_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议编码/解码错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 等待回复超时（序列号已从待决表中移除）
    #[error("No reply for sequence {sequence} within the response window")]
    Timeout { sequence: u16 },

    /// 系统指令返回了非成功状态
    #[error("{operation} failed with device status {status}")]
    DeviceStatus {
        operation: &'static str,
        status: SystemReplyStatus,
    },

    /// 直接指令返回 DirectReplyError
    #[error("Device rejected the direct command")]
    DirectReplyError,

    /// 回复缺少期望的字段
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    #[error("Brick is not connected")]
    NotConnected,

    #[error("Brick is already connected or a connect/disconnect is in progress")]
    AlreadyConnected,

    /// 待决回复过多，没有可用的序列号
    #[error("No free sequence number ({0} replies outstanding)")]
    TooManyPending(usize),

    /// 设备路径必须以 apps/、prjs/ 或 tools/ 开头
    #[error("Invalid device path: {0}")]
    InvalidPath(String),

    /// 本地文件读取失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

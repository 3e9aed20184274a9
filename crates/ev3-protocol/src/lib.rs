//! # EV3 Protocol
//!
//! EV3 主控（brick）指令协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `types`: 指令/回复类型、端口、设备类型等枚举
//! - `opcodes`: 直接指令操作码表
//! - `operand`: 参数编码（LC0/LC1/LC2/LC4/LCS/GV）
//! - `program`: `Program` 编码器（帧头 + 缓冲区声明 + 指令流）
//! - `instructions`: 各条指令的构建方法
//! - `reply`: 回复信封解码
//!
//! ## 字节序
//!
//! 协议中所有多字节字段均为小端字节序。

pub mod instructions;
pub mod opcodes;
pub mod operand;
pub mod program;
pub mod reply;
pub mod types;

pub use instructions::Ramp;
pub use opcodes::{LAYER, Opcode};
pub use program::{MAX_GLOBAL_SIZE, MAX_LOCAL_SIZE, NO_REPLY_SEQUENCE, Program, ReadTarget};
pub use reply::Reply;
pub use types::*;

use thiserror::Error;

/// 协议编码 / 解码错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 回复报告长度不足
    #[error("Invalid report length: expected at least {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// 缓冲区声明超出协议位宽（全局 10 位，局部 6 位）
    #[error("Buffer size out of range: global {global} (max 1023), local {local} (max 63)")]
    BufferSize { global: u16, local: u8 },

    /// 读取目标超出声明的全局缓冲区
    #[error("Read target {offset}+{width} exceeds global buffer of {global_size} bytes")]
    ReadOutOfBounds {
        offset: u16,
        width: u16,
        global_size: u16,
    },

    /// 从回复负载读取越界
    #[error("Payload read {offset}+{width} out of bounds (payload is {len} bytes)")]
    PayloadOutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: &'static str, value: u8 },
}

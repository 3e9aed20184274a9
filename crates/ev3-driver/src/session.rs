//! 会话状态
//!
//! ```text
//! Disconnected -> Connecting -> Polling | Idle -> Disconnecting -> Disconnected
//! ```
//!
//! 状态切换使用 compare-exchange，同一时刻只允许一个 connect/disconnect 进行。

use std::sync::atomic::{AtomicU8, Ordering};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    /// 已连接，未启用后台轮询
    Idle = 2,
    /// 已连接，后台轮询运行中
    Polling = 3,
    Disconnecting = 4,
}

impl SessionState {
    /// 无效值视为 Disconnected
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Idle,
            3 => Self::Polling,
            4 => Self::Disconnecting,
            _ => Self::Disconnected,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// 可以发送程序
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Idle | Self::Polling)
    }
}

/// 会话状态（原子版本，用于线程间共享）
#[derive(Debug, Default)]
pub struct AtomicSessionState {
    inner: AtomicU8,
}

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SessionState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }

    /// `from` -> `to`；当前状态不是 `from` 时返回实际状态
    pub fn transition(&self, from: SessionState, to: SessionState) -> Result<(), SessionState> {
        self.inner
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(SessionState::from_u8)
    }
}

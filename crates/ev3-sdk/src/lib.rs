//! EV3 SDK - LEGO Mindstorms EV3 主控 Rust SDK
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 指令编码、回复解码，无 IO
//! - **传输层** (`transport`): TCP（Wi-Fi 主控）与内存模拟传输
//! - **驱动层** (`driver`): 会话、回复关联、后台轮询、文件下载
//!
//! # 快速开始
//!
//! ```no_run
//! use ev3_sdk::prelude::*;
//! use std::time::Duration;
//!
//! ev3_sdk::init_logger();
//!
//! let (tx, rx) = crossbeam_channel::unbounded::<BrickChanged>();
//! let brick = BrickBuilder::new()
//!     .address("192.168.1.20")
//!     .serial("0016535D7E2D")
//!     .change_sink(std::sync::Arc::new(tx))
//!     .connect()?;
//!
//! brick.turn_motor_at_power(OutputPort::A | OutputPort::D, 50)?;
//! if let Ok(event) = rx.recv_timeout(Duration::from_secs(1)) {
//!     println!("touch: {}", event.port(InputPort::One).si_value);
//! }
//! brick.stop_motor(OutputPorts::all(), true)?;
//! # Ok::<(), DriverError>(())
//! ```
//!
//! 需要把多条指令放进同一帧时使用 [`Program`]：
//!
//! ```no_run
//! # use ev3_sdk::prelude::*;
//! # fn demo(brick: &Brick) -> Result<(), DriverError> {
//! let mut program = Program::direct_no_reply();
//! program
//!     .draw_clean()
//!     .draw_text(Color::Foreground, 0, 20, "hello")
//!     .draw_update();
//! brick.send(program)?;
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub use ev3_driver as driver;
pub use ev3_protocol as protocol;
pub use ev3_transport as transport;

// 常用类型
pub use ev3_driver::{Brick, BrickBuilder, BrickChanged, BrickSnapshot, DriverError, PipelineConfig};
pub use ev3_protocol::{Program, ProtocolError, Reply};
pub use ev3_transport::{Transport, TransportError};

use tracing_subscriber::EnvFilter;

/// 安装全局日志订阅者
///
/// 默认级别 `info`，可以用 `RUST_LOG` 覆盖（例如 `RUST_LOG=ev3_driver=trace`）。
/// 同时把 `log` crate 的记录转发到 `tracing`。已经安装过订阅者时返回 `false`。
pub fn init_logger() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    let _ = tracing_log::LogTracer::init();
    true
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_init_logger_is_idempotent() {
        super::init_logger();
        assert!(!super::init_logger());
    }
}

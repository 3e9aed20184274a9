//! 驱动层模块
//!
//! 本模块提供 EV3 主控的会话管理功能，包括：
//! - RX 线程与回复关联（按序列号唤醒等待方）
//! - 后台轮询与状态同步（ArcSwap 无锁读取）
//! - 变化通知（channel 或回调）
//! - 直接指令目录与文件下载
//!
//! # 使用场景
//!
//! ```no_run
//! use ev3_driver::BrickBuilder;
//! use ev3_protocol::{InputPort, OutputPort};
//!
//! let brick = BrickBuilder::new()
//!     .address("192.168.1.20")
//!     .on_change(|event| println!("port 1: {:?}", event.port(InputPort::One)))
//!     .connect()?;
//! brick.turn_motor_at_power(OutputPort::A.into(), 40)?;
//! brick.play_tone(50, 440, 200)?;
//! # Ok::<(), ev3_driver::DriverError>(())
//! ```

mod brick;
mod builder;
pub mod correlator;
mod direct;
mod error;
pub mod hooks;
pub mod metrics;
pub mod pipeline;
pub mod session;
pub mod state;
pub mod system;

pub use brick::Brick;
pub use builder::BrickBuilder;
pub use correlator::{DEFAULT_RESPONSE_TIMEOUT, PendingResponse, ResponseCorrelator};
pub use direct::{LCD_HEIGHT, LCD_WIDTH, TOP_LINE_HEIGHT};
pub use error::DriverError;
pub use hooks::{ChangeSink, FnSink};
pub use metrics::{BrickMetrics, MetricsSnapshot};
pub use pipeline::{PipelineConfig, build_poll_program, decode_poll};
pub use session::{AtomicSessionState, SessionState};
pub use state::*;
pub use system::{CHUNK_SIZE, check_device_path};

//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use ev3_sdk::prelude::*;
//! ```

// 驱动层
pub use ev3_driver::{
    Brick, BrickBuilder, BrickChanged, BrickSnapshot, ButtonState, ChangeSink, FnSink,
    PipelineConfig, Port, SessionState,
};

// 协议层
pub use ev3_protocol::{
    BrickButton, Color, DeviceType, FontType, InputPort, LedPattern, OutputPort, OutputPorts,
    Polarity, Program, Ramp, Reply,
};

// 错误类型
pub use ev3_driver::DriverError;
pub use ev3_protocol::ProtocolError;
pub use ev3_transport::TransportError;

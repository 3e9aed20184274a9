//! Builder 模式实现
//!
//! 提供链式构造 `Brick` 实例的便捷方式。

use crate::brick::Brick;
use crate::error::DriverError;
use crate::hooks::{ChangeSink, FnSink};
use crate::pipeline::PipelineConfig;
use crate::state::BrickChanged;
use ev3_transport::{Transport, TransportDeviceError, TransportDeviceErrorKind, TransportError};
use std::sync::Arc;
use std::time::Duration;

/// Brick Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use ev3_driver::{BrickBuilder, PipelineConfig};
///
/// // Wi-Fi 主控，默认配置
/// let brick = BrickBuilder::new()
///     .address("192.168.1.20")
///     .serial("0016535D7E2D")
///     .connect()
///     .unwrap();
///
/// // 关闭后台轮询
/// let brick = BrickBuilder::new()
///     .address("192.168.1.20")
///     .poll_period(std::time::Duration::ZERO)
///     .connect()
///     .unwrap();
/// ```
#[derive(Default)]
pub struct BrickBuilder {
    /// 显式指定的传输（优先于地址）
    transport: Option<Box<dyn Transport>>,
    /// 主控地址（`host` 或 `host:port`）
    address: Option<String>,
    /// 主控序列号（解锁握手用）
    serial: Option<String>,
    pipeline_config: PipelineConfig,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl BrickBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 使用自定义传输（例如测试中的 `MockTransport`）
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn serial(mut self, serial: impl Into<String>) -> Self {
        self.serial = Some(serial.into());
        self
    }

    pub fn pipeline_config(mut self, config: PipelineConfig) -> Self {
        self.pipeline_config = config;
        self
    }

    /// 后台轮询周期，`Duration::ZERO` 表示不轮询
    pub fn poll_period(mut self, period: Duration) -> Self {
        self.pipeline_config.poll_period_ms = period.as_millis() as u64;
        self
    }

    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.pipeline_config.response_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// 状态未变化时也每个周期发出事件
    pub fn always_send_events(mut self, enabled: bool) -> Self {
        self.pipeline_config.always_send_events = enabled;
        self
    }

    /// 变化事件的接收方（例如 `crossbeam_channel::Sender<BrickChanged>`）
    pub fn change_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 在轮询线程上执行的回调
    pub fn on_change<F>(self, callback: F) -> Self
    where
        F: Fn(&BrickChanged) + Send + Sync + 'static,
    {
        self.change_sink(Arc::new(FnSink(callback)))
    }

    /// 构建 `Brick`（尚未连接）
    pub fn build(self) -> Result<Brick, DriverError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Self::tcp_transport(self.address, self.serial)?,
        };
        Ok(Brick::with_config(transport, self.pipeline_config, self.sink))
    }

    /// 构建并按配置的轮询周期连接
    pub fn connect(self) -> Result<Brick, DriverError> {
        let period = self.pipeline_config.poll_period();
        let brick = self.build()?;
        brick.connect(period)?;
        Ok(brick)
    }

    #[cfg(feature = "tcp")]
    fn tcp_transport(
        address: Option<String>,
        serial: Option<String>,
    ) -> Result<Box<dyn Transport>, DriverError> {
        let address = address.ok_or_else(missing_transport)?;
        Ok(Box::new(ev3_transport::TcpTransport::new(
            address,
            serial.unwrap_or_default(),
        )))
    }

    #[cfg(not(feature = "tcp"))]
    fn tcp_transport(
        _address: Option<String>,
        _serial: Option<String>,
    ) -> Result<Box<dyn Transport>, DriverError> {
        Err(missing_transport())
    }
}

fn missing_transport() -> DriverError {
    DriverError::Transport(TransportError::Device(TransportDeviceError::new(
        TransportDeviceErrorKind::NotFound,
        "no transport or brick address configured",
    )))
}

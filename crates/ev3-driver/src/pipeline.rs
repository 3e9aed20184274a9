//! Pipeline IO 循环模块
//!
//! 负责 RX 线程（报告接收与分发）和轮询线程（端口/按键状态刷新）的主循环。

use crate::brick::BrickContext;
use crate::state::{BrickChanged, BrickSnapshot, ButtonState};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use ev3_protocol::{BrickButton, DeviceType, InputPort, Program, Reply};
use ev3_transport::{ReportReader, TransportError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Pipeline 配置
///
/// 控制 RX 线程、回复等待和后台轮询的行为。
///
/// # Example
///
/// ```
/// use ev3_driver::PipelineConfig;
///
/// // 使用默认配置（20ms 接收粒度，1s 回复超时，100ms 轮询周期）
/// let config = PipelineConfig::default();
///
/// // 自定义配置
/// let config = PipelineConfig {
///     poll_period_ms: 50,
///     always_send_events: true,
///     ..PipelineConfig::default()
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PipelineConfig {
    /// 单次接收的超时（毫秒），决定 RX 线程检查退出标志的粒度
    pub receive_timeout_ms: u64,
    /// 等待回复的超时（毫秒）
    pub response_timeout_ms: u64,
    /// 后台轮询周期（毫秒），0 表示不轮询
    pub poll_period_ms: u64,
    /// 每个轮询周期都发出事件，即使状态没有变化
    pub always_send_events: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 20,
            response_timeout_ms: 1000,
            poll_period_ms: 100,
            always_send_events: false,
        }
    }
}

impl PipelineConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }
}

// ============================================================================
// 轮询程序布局
// ============================================================================

/// 每个端口在轮询缓冲区中占用的字节数
///
/// ```text
/// +0 type  +1 mode  +2..+6 SI (f32)  +6..+10 raw (i32)  +10 percent
/// ```
pub const PORT_STRIDE: usize = 11;

/// 按键状态起始位置（8 个端口之后）
pub const BUTTON_OFFSET: usize = PORT_STRIDE * 8;

/// 按键读取顺序
pub const POLL_BUTTONS: [BrickButton; 6] = [
    BrickButton::Back,
    BrickButton::Left,
    BrickButton::Up,
    BrickButton::Right,
    BrickButton::Down,
    BrickButton::Enter,
];

/// 轮询程序的全局缓冲区大小
pub const POLL_GLOBAL_SIZE: u16 = (BUTTON_OFFSET + POLL_BUTTONS.len()) as u16;

/// 构造一次轮询使用的程序
///
/// `modes` 按 `InputPort::buffer_index` 排列，SI/原始/百分比值按该模式读取。
pub fn build_poll_program(modes: &[u8; 8]) -> Program {
    let mut program = Program::direct_reply(POLL_GLOBAL_SIZE);
    for port in InputPort::ALL {
        let index = port.buffer_index();
        let base = (index * PORT_STRIDE) as u16;
        let mode = modes[index];
        program
            .input_type_mode(port, base, base + 1)
            .input_ready_si(port, mode, base + 2)
            .input_ready_raw(port, mode, base + 6)
            .input_ready_percent(port, mode, base + 10);
    }
    for (i, button) in POLL_BUTTONS.iter().enumerate() {
        program.ui_button_pressed(*button, (BUTTON_OFFSET + i) as u16);
    }
    program
}

/// 解码轮询回复
///
/// 设备报错或负载不足 [`POLL_GLOBAL_SIZE`] 时返回 `None`（本周期跳过）。
pub fn decode_poll(reply: &Reply, cycle: u64) -> Option<BrickSnapshot> {
    if reply.is_error() || reply.payload.len() < POLL_GLOBAL_SIZE as usize {
        return None;
    }

    let mut snapshot = BrickSnapshot {
        cycle,
        ..BrickSnapshot::default()
    };
    for port in snapshot.ports.iter_mut() {
        let base = port.buffer_index() * PORT_STRIDE;
        port.device_type = Some(DeviceType::from(reply.read_u8(base).ok()?));
        port.mode = reply.read_u8(base + 1).ok()?;
        port.si_value = reply.read_f32(base + 2).ok()?;
        port.raw_value = reply.read_i32(base + 6).ok()?;
        port.percent_value = reply.read_u8(base + 10).ok()?;
    }

    let pressed = |i: usize| reply.payload[BUTTON_OFFSET + i] == 1;
    snapshot.buttons = ButtonState {
        back: pressed(0),
        left: pressed(1),
        up: pressed(2),
        right: pressed(3),
        down: pressed(4),
        enter: pressed(5),
    };
    Some(snapshot)
}

// ============================================================================
// 线程主循环
// ============================================================================

/// RX 线程主循环
///
/// 接收报告并交给关联器分发。超时是正常情况；致命传输错误时清除
/// `is_running` 并退出，未完成的等待由各自的超时结束。
pub(crate) fn rx_loop(
    mut reader: Box<dyn ReportReader>,
    ctx: Arc<BrickContext>,
    is_running: Arc<AtomicBool>,
) {
    let timeout = ctx.config.receive_timeout();

    loop {
        // Acquire: 看到 false 时，disconnect 之前的写入都已可见
        if !is_running.load(Ordering::Acquire) {
            trace!("RX thread: is_running flag is false, exiting");
            break;
        }

        let report = match reader.receive_report(timeout) {
            Ok(report) => report,
            Err(TransportError::Timeout) => continue,
            Err(e) if !e.is_fatal() => {
                warn!("RX thread: transport error: {}", e);
                continue;
            },
            Err(e) => {
                if is_running.load(Ordering::Acquire) {
                    error!("RX thread: fatal transport error: {}", e);
                }
                is_running.store(false, Ordering::Release);
                break;
            },
        };

        ctx.metrics.reports_received.fetch_add(1, Ordering::Relaxed);
        ctx.correlator.deliver(&report);
    }

    trace!("RX thread: loop exited");
}

/// 轮询线程主循环
///
/// 每个周期发送一次轮询程序，更新状态缓存并在变化时通知。`stop_rx`
/// 收到消息或断开时在下一个检查点退出（包括周期之间的等待）。
pub(crate) fn poll_loop(ctx: Arc<BrickContext>, period: Duration, stop_rx: Receiver<()>) {
    // 冷启动后的第一份快照总是视为变化
    let mut primed = false;
    let mut cycle: u64 = 0;

    loop {
        if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }

        let program = build_poll_program(&ctx.port_modes());
        match ctx.send(program) {
            Ok(Some(reply)) => match decode_poll(&reply, cycle + 1) {
                Some(snapshot) => {
                    cycle += 1;
                    publish(&ctx, snapshot, &mut primed);
                },
                None => skip(&ctx, "short or error reply"),
            },
            Ok(None) => skip(&ctx, "no reply"),
            Err(e) => {
                debug!("Poll cycle failed: {}", e);
                skip(&ctx, "send failed");
            },
        }

        match stop_rx.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {},
            _ => break,
        }
    }

    trace!("Poll thread: loop exited after {} cycles", cycle);
}

fn skip(ctx: &BrickContext, reason: &str) {
    ctx.metrics.poll_skipped.fetch_add(1, Ordering::Relaxed);
    trace!("Poll cycle skipped: {}", reason);
}

fn publish(ctx: &BrickContext, snapshot: BrickSnapshot, primed: &mut bool) {
    let changed = !*primed || snapshot.differs_from(&ctx.snapshot.load());
    *primed = true;

    let snapshot = Arc::new(snapshot);
    ctx.snapshot.store(snapshot.clone());
    ctx.metrics.poll_cycles.fetch_add(1, Ordering::Relaxed);

    if !(changed || ctx.config.always_send_events) {
        return;
    }
    if let Some(sink) = &ctx.sink {
        sink.on_brick_changed(&BrickChanged { snapshot });
        ctx.metrics.change_events.fetch_add(1, Ordering::Relaxed);
    }
}

//! Brick API 模块
//!
//! 提供对外的 `Brick` 结构体，封装 RX/轮询线程、回复关联和状态缓存。

use crate::correlator::ResponseCorrelator;
use crate::error::DriverError;
use crate::hooks::ChangeSink;
use crate::metrics::{BrickMetrics, MetricsSnapshot};
use crate::pipeline::{PipelineConfig, poll_loop, rx_loop};
use crate::session::{AtomicSessionState, SessionState};
use crate::state::BrickSnapshot;
use arc_swap::ArcSwap;
use crossbeam_channel::{RecvTimeoutError, Sender};
use ev3_protocol::{InputPort, OutputPorts, Program, Reply};
use ev3_transport::{FrameWriter, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 等待后台线程退出的上限
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // 看门狗线程负责 join，本线程只等待信号
        thread::spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(RecvTimeoutError::Timeout) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "Thread join timeout",
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 会话共享上下文（调用方线程、RX 线程、轮询线程共享）
pub(crate) struct BrickContext {
    pub(crate) correlator: ResponseCorrelator,
    /// 发送半部；写锁只在写出一帧期间持有
    pub(crate) writer: Mutex<Option<Box<dyn FrameWriter>>>,
    /// 最新轮询快照，只由轮询线程替换
    pub(crate) snapshot: ArcSwap<BrickSnapshot>,
    /// 各端口读取模式，按 `InputPort::buffer_index` 排列
    pub(crate) port_modes: Mutex<[u8; 8]>,
    pub(crate) metrics: Arc<BrickMetrics>,
    pub(crate) config: PipelineConfig,
    pub(crate) state: AtomicSessionState,
    pub(crate) sink: Option<Arc<dyn ChangeSink>>,
}

impl BrickContext {
    fn new(config: PipelineConfig, sink: Option<Arc<dyn ChangeSink>>) -> Self {
        let metrics = Arc::new(BrickMetrics::new());
        Self {
            correlator: ResponseCorrelator::new(metrics.clone()),
            writer: Mutex::new(None),
            snapshot: ArcSwap::from_pointee(BrickSnapshot::default()),
            port_modes: Mutex::new([0; 8]),
            metrics,
            config,
            state: AtomicSessionState::new(SessionState::Disconnected),
            sink,
        }
    }

    pub(crate) fn port_modes(&self) -> [u8; 8] {
        *self.port_modes.lock()
    }

    /// 发送一个程序；需要回复时等待回复
    ///
    /// 无回复程序不登记槽位，写出后立即返回 `Ok(None)`。
    pub(crate) fn send(&self, program: Program) -> Result<Option<Reply>, DriverError> {
        program.validate()?;

        if !program.expects_reply() {
            self.write(&program.to_frame(None))?;
            return Ok(None);
        }

        let pending = self.correlator.allocate()?;
        let sequence = pending.sequence();
        if let Err(e) = self.write(&program.to_frame(Some(sequence))) {
            self.correlator.cancel(sequence);
            return Err(e);
        }
        debug!(
            "Sent {:?} program #{} ({} instruction bytes)",
            program.kind(),
            sequence,
            program.instructions().len()
        );
        self.correlator.wait(pending, self.config.response_timeout()).map(Some)
    }

    fn write(&self, frame: &[u8]) -> Result<(), DriverError> {
        let mut writer = self.writer.lock();
        let writer = writer.as_mut().ok_or(DriverError::NotConnected)?;
        writer.write_frame(frame)?;
        self.metrics.programs_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// 当前连接的后台线程
#[derive(Default)]
struct Workers {
    is_running: Option<Arc<AtomicBool>>,
    rx_thread: Option<JoinHandle<()>>,
    poll_thread: Option<JoinHandle<()>>,
    /// 发送或丢弃即唤醒轮询线程并令其退出
    poll_stop: Option<Sender<()>>,
}

/// EV3 主控会话（对外 API）
///
/// 连接后有两个后台线程：
/// - RX 线程：接收报告并按序列号唤醒等待方
/// - 轮询线程（可选）：周期性读取全部端口和按键，更新状态缓存
///
/// 所有方法都只需要 `&self`，可以在多个线程间共享（`Arc<Brick>`）。
pub struct Brick {
    transport: Mutex<Box<dyn Transport>>,
    ctx: Arc<BrickContext>,
    workers: Mutex<Workers>,
}

impl Brick {
    /// 使用默认配置创建（尚未连接）
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self::with_config(transport, PipelineConfig::default(), None)
    }

    pub(crate) fn with_config(
        transport: Box<dyn Transport>,
        config: PipelineConfig,
        sink: Option<Arc<dyn ChangeSink>>,
    ) -> Self {
        Self {
            transport: Mutex::new(transport),
            ctx: Arc::new(BrickContext::new(config, sink)),
            workers: Mutex::new(Workers::default()),
        }
    }

    // ============================================================
    // 会话生命周期
    // ============================================================

    /// 建立连接
    ///
    /// 打开传输、启动 RX 线程、发送一次"停止所有电机"。`poll_period` 大于 0
    /// 时启动后台轮询，否则会话处于 Idle 状态，从不发出变化事件。
    pub fn connect(&self, poll_period: Duration) -> Result<(), DriverError> {
        self.ctx
            .state
            .transition(SessionState::Disconnected, SessionState::Connecting)
            .map_err(|_| DriverError::AlreadyConnected)?;

        match self.open(poll_period) {
            Ok(state) => {
                self.ctx.state.set(state);
                info!("Brick connected ({:?}, poll period {:?})", state, poll_period);
                Ok(())
            },
            Err(e) => {
                error!("Brick connect failed: {}", e);
                self.stop_poller();
                if let Err(release_err) = self.release() {
                    warn!("Closing transport after failed connect: {}", release_err);
                }
                self.ctx.state.set(SessionState::Disconnected);
                Err(e)
            },
        }
    }

    fn open(&self, poll_period: Duration) -> Result<SessionState, DriverError> {
        let (reader, writer) = {
            let mut transport = self.transport.lock();
            transport.connect()?;
            transport.split()?
        };
        *self.ctx.writer.lock() = Some(writer);

        let is_running = Arc::new(AtomicBool::new(true));
        let rx_thread = thread::Builder::new().name("ev3-rx".into()).spawn({
            let ctx = self.ctx.clone();
            let is_running = is_running.clone();
            move || rx_loop(reader, ctx, is_running)
        })?;
        {
            let mut workers = self.workers.lock();
            workers.is_running = Some(is_running);
            workers.rx_thread = Some(rx_thread);
        }

        self.ctx.send(stop_all_motors())?;

        if poll_period.is_zero() {
            return Ok(SessionState::Idle);
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let poll_thread = thread::Builder::new().name("ev3-poll".into()).spawn({
            let ctx = self.ctx.clone();
            move || poll_loop(ctx, poll_period, stop_rx)
        })?;
        let mut workers = self.workers.lock();
        workers.poll_stop = Some(stop_tx);
        workers.poll_thread = Some(poll_thread);
        Ok(SessionState::Polling)
    }

    /// 断开连接
    ///
    /// 停止轮询、发送最后一次"停止所有电机"、释放传输。未连接时直接返回。
    /// 正在等待回复的调用方不会被唤醒，它们按各自的超时结束。
    pub fn disconnect(&self) -> Result<(), DriverError> {
        let from = self.ctx.state.get();
        if !from.is_connected()
            || self
                .ctx
                .state
                .transition(from, SessionState::Disconnecting)
                .is_err()
        {
            return Ok(());
        }

        self.stop_poller();

        if let Err(e) = self.ctx.send(stop_all_motors()) {
            warn!("Final stop-all-motors failed: {}", e);
        }

        let result = self.release();
        self.ctx.state.set(SessionState::Disconnected);
        info!("Brick disconnected");
        result
    }

    fn stop_poller(&self) {
        let (stop, handle) = {
            let mut workers = self.workers.lock();
            (workers.poll_stop.take(), workers.poll_thread.take())
        };
        if let Some(stop) = stop {
            let _ = stop.try_send(());
        }
        if let Some(handle) = handle
            && handle.join_timeout(JOIN_TIMEOUT).is_err()
        {
            error!(
                "Poll thread panicked or failed to shut down within {:?}",
                JOIN_TIMEOUT
            );
        }
    }

    /// 停止 RX 线程并关闭发送半部
    fn release(&self) -> Result<(), DriverError> {
        let (is_running, rx_thread) = {
            let mut workers = self.workers.lock();
            (workers.is_running.take(), workers.rx_thread.take())
        };
        if let Some(is_running) = is_running {
            is_running.store(false, Ordering::Release);
        }

        let result = match self.ctx.writer.lock().take() {
            Some(mut writer) => writer.disconnect().map_err(DriverError::from),
            None => Ok(()),
        };

        if let Some(handle) = rx_thread
            && handle.join_timeout(JOIN_TIMEOUT).is_err()
        {
            error!(
                "RX thread panicked or failed to shut down within {:?}",
                JOIN_TIMEOUT
            );
        }
        result
    }

    // ============================================================
    // 指令发送
    // ============================================================

    /// 发送任意程序
    ///
    /// 需要回复的程序阻塞到回复到达或超时；无回复程序写出后立即返回 `None`。
    pub fn send(&self, program: Program) -> Result<Option<Reply>, DriverError> {
        if !self.ctx.state.get().is_connected() {
            return Err(DriverError::NotConnected);
        }
        self.ctx.send(program)
    }

    /// 发送需要回复的直接指令并检查回复类型
    pub fn query(&self, program: Program) -> Result<Reply, DriverError> {
        let reply = self.send(program)?.ok_or_else(|| {
            DriverError::MalformedReply("program does not request a reply".into())
        })?;
        if reply.is_error() && !reply.kind.is_system() {
            return Err(DriverError::DirectReplyError);
        }
        Ok(reply)
    }

    // ============================================================
    // 状态
    // ============================================================

    /// 最新的轮询快照（无锁读取）
    pub fn snapshot(&self) -> Arc<BrickSnapshot> {
        self.ctx.snapshot.load_full()
    }

    /// 设置轮询时读取该端口使用的模式（下一个周期生效）
    pub fn set_port_mode(&self, port: InputPort, mode: u8) {
        self.ctx.port_modes.lock()[port.buffer_index()] = mode;
    }

    pub fn port_mode(&self, port: InputPort) -> u8 {
        self.ctx.port_modes()[port.buffer_index()]
    }

    pub fn state(&self) -> SessionState {
        self.ctx.state.get()
    }

    /// 已连接且 RX 线程仍在运行
    pub fn is_connected(&self) -> bool {
        self.ctx.state.get().is_connected()
            && self
                .workers
                .lock()
                .is_running
                .as_ref()
                .is_some_and(|running| running.load(Ordering::Acquire))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.ctx.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// 当前等待回复的程序数
    pub fn outstanding(&self) -> usize {
        self.ctx.correlator.outstanding()
    }
}

impl Drop for Brick {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            warn!("Disconnect on drop failed: {}", e);
        }
    }
}

fn stop_all_motors() -> Program {
    let mut program = Program::direct_no_reply();
    program.output_stop(OutputPorts::all(), false);
    program
}

//! 内存模拟传输
//!
//! 每写出一帧就调用一次应答函数，返回的报告被放进接收队列，就像
//! 设备回复了一样。`MockHandle` 可以在测试中检查已写出的帧、注入
//! 主动报告（例如迟到的回复）。

use crate::{FrameWriter, ReportReader, Transport, TransportError};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 应答函数：输入一帧（不含长度前缀），返回可选的回复报告
pub type ReplyHandler = Arc<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

struct MockShared {
    frames: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

/// 模拟传输
pub struct MockTransport {
    handler: ReplyHandler,
    shared: Arc<MockShared>,
    report_tx: Sender<Vec<u8>>,
    report_rx: Receiver<Vec<u8>>,
    connected: bool,
    refuse_connect: bool,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        let (report_tx, report_rx) = crossbeam_channel::unbounded();
        Self {
            handler: Arc::new(handler),
            shared: Arc::new(MockShared {
                frames: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
            report_tx,
            report_rx,
            connected: false,
            refuse_connect: false,
        }
    }

    /// 从不回复的设备
    pub fn silent() -> Self {
        Self::new(|_| None)
    }

    /// `connect` 直接失败
    pub fn refusing() -> Self {
        let mut transport = Self::silent();
        transport.refuse_connect = true;
        transport
    }

    /// 测试侧句柄（拆分后仍然有效）
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            shared: self.shared.clone(),
            report_tx: self.report_tx.clone(),
        }
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.refuse_connect {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "mock refused",
            )));
        }
        self.connected = true;
        self.shared.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn split(
        &mut self,
    ) -> Result<(Box<dyn ReportReader>, Box<dyn FrameWriter>), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.connected = false;
        Ok((
            Box::new(MockReportReader {
                shared: self.shared.clone(),
                report_rx: self.report_rx.clone(),
            }),
            Box::new(MockFrameWriter {
                handler: self.handler.clone(),
                shared: self.shared.clone(),
                report_tx: self.report_tx.clone(),
            }),
        ))
    }
}

struct MockReportReader {
    shared: Arc<MockShared>,
    report_rx: Receiver<Vec<u8>>,
}

impl ReportReader for MockReportReader {
    fn receive_report(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        match self.report_rx.recv_timeout(timeout) {
            Ok(report) => Ok(report),
            Err(RecvTimeoutError::Timeout) if self.shared.closed.load(Ordering::Acquire) => {
                Err(TransportError::Closed)
            },
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

struct MockFrameWriter {
    handler: ReplyHandler,
    shared: Arc<MockShared>,
    report_tx: Sender<Vec<u8>>,
}

impl FrameWriter for MockFrameWriter {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.shared.frames.lock().push(frame.to_vec());
        if let Some(report) = (self.handler)(frame) {
            // 接收端已经退出时丢弃即可
            let _ = self.report_tx.send(report);
        }
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.shared.closed.store(true, Ordering::Release);
        Ok(())
    }
}

/// 测试侧句柄
#[derive(Clone)]
pub struct MockHandle {
    shared: Arc<MockShared>,
    report_tx: Sender<Vec<u8>>,
}

impl MockHandle {
    /// 已写出的所有帧（按写出顺序）
    pub fn written_frames(&self) -> Vec<Vec<u8>> {
        self.shared.frames.lock().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.shared.frames.lock().len()
    }

    pub fn clear_frames(&self) {
        self.shared.frames.lock().clear();
    }

    /// 注入一份主动报告
    pub fn inject(&self, report: Vec<u8>) {
        let _ = self.report_tx.send(report);
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_handler() {
        let mut transport = MockTransport::new(|frame| Some(frame.to_vec()));
        let handle = transport.handle();
        transport.connect().unwrap();
        let (mut rx, mut tx) = transport.split().unwrap();

        tx.write_frame(&[1, 0, 2]).unwrap();
        assert_eq!(rx.receive_report(Duration::from_millis(100)).unwrap(), vec![1, 0, 2]);
        assert_eq!(handle.written_frames(), vec![vec![1, 0, 2]]);
    }

    #[test]
    fn test_silent_times_out_then_closes() {
        let mut transport = MockTransport::silent();
        let handle = transport.handle();
        transport.connect().unwrap();
        let (mut rx, mut tx) = transport.split().unwrap();

        assert!(matches!(
            rx.receive_report(Duration::from_millis(10)),
            Err(TransportError::Timeout)
        ));
        tx.disconnect().unwrap();
        assert!(handle.is_closed());
        assert!(matches!(
            rx.receive_report(Duration::from_millis(10)),
            Err(TransportError::Closed)
        ));
        assert!(matches!(tx.write_frame(&[0]), Err(TransportError::Closed)));
    }

    #[test]
    fn test_inject_and_refuse() {
        let mut transport = MockTransport::silent();
        let handle = transport.handle();
        transport.connect().unwrap();
        let (mut rx, _tx) = transport.split().unwrap();
        handle.inject(vec![9, 9, 2]);
        assert_eq!(rx.receive_report(Duration::from_millis(100)).unwrap(), vec![9, 9, 2]);

        let mut refused = MockTransport::refusing();
        assert!(refused.connect().is_err());
        assert!(matches!(
            MockTransport::silent().split(),
            Err(TransportError::NotConnected)
        ));
    }
}

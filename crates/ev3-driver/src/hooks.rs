//! 状态变化通知
//!
//! 轮询线程检测到变化后调用 [`ChangeSink::on_brick_changed`]。通知在轮询
//! 线程上触发，需要在自己线程上处理事件的调用方应传入 channel：
//!
//! ```rust
//! use ev3_driver::hooks::ChangeSink;
//! use ev3_driver::BrickChanged;
//! use crossbeam_channel::unbounded;
//! use std::sync::Arc;
//!
//! let (tx, rx) = unbounded::<BrickChanged>();
//! let sink: Arc<dyn ChangeSink> = Arc::new(tx);
//! // BrickBuilder::new(transport).change_sink(sink)...
//! // 然后在调用方线程: for event in rx.iter() { ... }
//! # drop((sink, rx));
//! ```

use crate::state::BrickChanged;
use crossbeam_channel::Sender;

/// 变化事件接收方
///
/// 实现必须非阻塞：轮询线程在回调返回之前不会开始下一个周期。
pub trait ChangeSink: Send + Sync {
    fn on_brick_changed(&self, event: &BrickChanged);
}

/// channel 投递：调用方在自己的线程上接收事件
///
/// 使用 `try_send`，有界 channel 满时丢弃本次事件。
impl ChangeSink for Sender<BrickChanged> {
    fn on_brick_changed(&self, event: &BrickChanged) {
        let _ = self.try_send(event.clone());
    }
}

/// 闭包回调（在轮询线程上执行）
pub struct FnSink<F>(pub F);

impl<F> ChangeSink for FnSink<F>
where
    F: Fn(&BrickChanged) + Send + Sync,
{
    fn on_brick_changed(&self, event: &BrickChanged) {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BrickSnapshot;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn event() -> BrickChanged {
        BrickChanged {
            snapshot: Arc::new(BrickSnapshot::default()),
        }
    }

    #[test]
    fn test_channel_sink() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let sink: Arc<dyn ChangeSink> = Arc::new(tx);
        sink.on_brick_changed(&event());
        // 第二次 channel 已满，被丢弃而不是阻塞
        sink.on_brick_changed(&event());
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.recv().unwrap().snapshot.cycle, 0);
    }

    #[test]
    fn test_fn_sink() {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = FnSink({
            let count = count.clone();
            move |_: &BrickChanged| {
                count.fetch_add(1, Ordering::SeqCst);
            }
        });
        sink.on_brick_changed(&event());
        sink.on_brick_changed(&event());
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}

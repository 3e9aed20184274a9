//! 会话指标
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// Brick 会话指标
///
/// # 使用示例
///
/// ```rust
/// use ev3_driver::BrickMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BrickMetrics::default();
/// metrics.programs_sent.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().programs_sent, 1);
/// ```
#[derive(Debug, Default)]
pub struct BrickMetrics {
    /// 写出的程序数（含无回复程序）
    pub programs_sent: AtomicU64,

    /// 收到的报告总数
    pub reports_received: AtomicU64,

    /// 成功匹配到待决槽位的回复数
    pub replies_matched: AtomicU64,

    /// 被丢弃的报告数（序列号为 0、不在待决表中或无法解码）
    pub reports_dropped: AtomicU64,

    /// 等待回复超时次数
    pub timeouts: AtomicU64,

    /// 完成的轮询周期
    pub poll_cycles: AtomicU64,

    /// 被跳过的轮询周期（超时、设备报错或回复过短）
    pub poll_skipped: AtomicU64,

    /// 发出的状态变化事件
    pub change_events: AtomicU64,
}

impl BrickMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取所有计数器的快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            programs_sent: self.programs_sent.load(Ordering::Relaxed),
            reports_received: self.reports_received.load(Ordering::Relaxed),
            replies_matched: self.replies_matched.load(Ordering::Relaxed),
            reports_dropped: self.reports_dropped.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            poll_skipped: self.poll_skipped.load(Ordering::Relaxed),
            change_events: self.change_events.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.programs_sent.store(0, Ordering::Relaxed);
        self.reports_received.store(0, Ordering::Relaxed);
        self.replies_matched.store(0, Ordering::Relaxed);
        self.reports_dropped.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.poll_cycles.store(0, Ordering::Relaxed);
        self.poll_skipped.store(0, Ordering::Relaxed);
        self.change_events.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    pub programs_sent: u64,
    pub reports_received: u64,
    pub replies_matched: u64,
    pub reports_dropped: u64,
    pub timeouts: u64,
    pub poll_cycles: u64,
    pub poll_skipped: u64,
    pub change_events: u64,
}

impl MetricsSnapshot {
    /// 匹配率（匹配的回复 / 收到的报告）
    pub fn match_rate(&self) -> f64 {
        if self.reports_received == 0 {
            return 0.0;
        }
        self.replies_matched as f64 / self.reports_received as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = BrickMetrics::new();
        metrics.reports_received.fetch_add(4, Ordering::Relaxed);
        metrics.replies_matched.fetch_add(3, Ordering::Relaxed);
        metrics.reports_dropped.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.reports_received, 4);
        assert!((snapshot.match_rate() - 75.0).abs() < 1e-9);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        assert_eq!(MetricsSnapshot::default().match_rate(), 0.0);
    }
}

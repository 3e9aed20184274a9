//! 回复关联器
//!
//! 为每个需要回复的程序分配序列号，登记一个待决槽位；RX 线程收到报告后
//! 按序列号找到槽位并唤醒等待方。
//!
//! # 槽位生命周期
//!
//! - `allocate`: 分配序列号并插入待决表
//! - `deliver`: 从表中**移除**发送端后投递回复，因此每个槽位最多完成一次
//! - `wait` 超时：移除槽位，迟到的报告之后会被静默丢弃
//!
//! 每个会话拥有自己的关联器，多个会话的序列号空间互不影响。

use crate::error::DriverError;
use crate::metrics::BrickMetrics;
use crossbeam_channel::{Receiver, Sender};
use ev3_protocol::{NO_REPLY_SEQUENCE, Reply};
use ev3_protocol::reply::peek_sequence;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{trace, warn};

/// 默认回复超时（单个指令批次的预期往返时间）
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// 一个待决回复
///
/// 由 [`ResponseCorrelator::allocate`] 创建，交给 [`ResponseCorrelator::wait`] 消费。
#[derive(Debug)]
pub struct PendingResponse {
    sequence: u16,
    completion: Receiver<Reply>,
}

impl PendingResponse {
    pub fn sequence(&self) -> u16 {
        self.sequence
    }
}

struct CorrelatorInner {
    /// 上一次分配的序列号
    last: u16,
    outstanding: HashMap<u16, Sender<Reply>>,
}

/// 回复关联器
pub struct ResponseCorrelator {
    inner: Mutex<CorrelatorInner>,
    metrics: Arc<BrickMetrics>,
}

impl ResponseCorrelator {
    pub fn new(metrics: Arc<BrickMetrics>) -> Self {
        Self {
            inner: Mutex::new(CorrelatorInner {
                last: 0,
                outstanding: HashMap::new(),
            }),
            metrics,
        }
    }

    /// 分配下一个空闲序列号并登记槽位
    ///
    /// 跳过 0 和无回复序列号 0xFFFF，到顶后回绕，跳过仍在待决表中的序列号。
    pub fn allocate(&self) -> Result<PendingResponse, DriverError> {
        let mut inner = self.inner.lock();
        let mut candidate = inner.last;
        for _ in 0..=u16::MAX {
            candidate = candidate.wrapping_add(1);
            if candidate == 0
                || candidate == NO_REPLY_SEQUENCE
                || inner.outstanding.contains_key(&candidate)
            {
                continue;
            }
            let (tx, rx) = crossbeam_channel::bounded(1);
            inner.outstanding.insert(candidate, tx);
            inner.last = candidate;
            return Ok(PendingResponse {
                sequence: candidate,
                completion: rx,
            });
        }
        Err(DriverError::TooManyPending(inner.outstanding.len()))
    }

    /// 等待回复，超时则移除槽位并返回 `Timeout`
    pub fn wait(&self, pending: PendingResponse, timeout: Duration) -> Result<Reply, DriverError> {
        match pending.completion.recv_timeout(timeout) {
            Ok(reply) => Ok(reply),
            Err(_) => {
                self.cancel(pending.sequence);
                // 回复可能恰好在移除之前送达
                if let Ok(reply) = pending.completion.try_recv() {
                    return Ok(reply);
                }
                self.metrics.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!("No reply for sequence {} within {:?}", pending.sequence, timeout);
                Err(DriverError::Timeout {
                    sequence: pending.sequence,
                })
            },
        }
    }

    /// 移除槽位（写帧失败或等待超时时调用）
    pub fn cancel(&self, sequence: u16) -> bool {
        self.inner.lock().outstanding.remove(&sequence).is_some()
    }

    /// 投递一份报告
    ///
    /// 序列号为 0、不在待决表中或无法解码的报告被静默丢弃，返回 `false`。
    /// 永不阻塞。
    pub fn deliver(&self, report: &[u8]) -> bool {
        let sequence = match peek_sequence(report) {
            Some(0) | None => {
                self.drop_report(report, "no sequence");
                return false;
            },
            Some(sequence) => sequence,
        };

        if !self.is_outstanding(sequence) {
            self.drop_report(report, "not outstanding");
            return false;
        }

        let reply = match Reply::decode(report) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Undecodable reply for sequence {}: {}", sequence, e);
                self.drop_report(report, "undecodable");
                return false;
            },
        };

        let Some(completion) = self.inner.lock().outstanding.remove(&sequence) else {
            // 解码期间被等待方超时移除
            self.drop_report(report, "evicted");
            return false;
        };

        // 容量为 1 且只有这一个发送端，不会阻塞
        let _ = completion.try_send(reply);
        self.metrics.replies_matched.fetch_add(1, Ordering::Relaxed);
        trace!("Delivered reply for sequence {}", sequence);
        true
    }

    pub fn is_outstanding(&self, sequence: u16) -> bool {
        self.inner.lock().outstanding.contains_key(&sequence)
    }

    pub fn outstanding(&self) -> usize {
        self.inner.lock().outstanding.len()
    }

    fn drop_report(&self, report: &[u8], reason: &str) {
        self.metrics.reports_dropped.fetch_add(1, Ordering::Relaxed);
        trace!("Dropped report ({}): {:02X?}", reason, report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ev3_protocol::ReplyType;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::thread;

    fn correlator() -> ResponseCorrelator {
        ResponseCorrelator::new(Arc::new(BrickMetrics::new()))
    }

    fn direct_reply(sequence: u16, payload: &[u8]) -> Vec<u8> {
        let mut report = sequence.to_le_bytes().to_vec();
        report.push(0x02);
        report.extend_from_slice(payload);
        report
    }

    #[test]
    fn test_first_sequence_is_one() {
        let c = correlator();
        assert_eq!(c.allocate().unwrap().sequence(), 1);
        assert_eq!(c.allocate().unwrap().sequence(), 2);
        assert_eq!(c.outstanding(), 2);
    }

    #[test]
    fn test_wraps_and_skips_zero() {
        let c = correlator();
        c.inner.lock().last = 0xFFFD;
        assert_eq!(c.allocate().unwrap().sequence(), 0xFFFE);
        // 0xFFFF 留给无回复程序
        assert_eq!(c.allocate().unwrap().sequence(), 1);
        assert!(!c.is_outstanding(NO_REPLY_SEQUENCE));
    }

    #[test]
    fn test_skips_outstanding_after_wrap() {
        let c = correlator();
        let one = c.allocate().unwrap();
        let two = c.allocate().unwrap();
        c.inner.lock().last = 0xFFFF;
        // 1 和 2 仍在等待
        assert_eq!(c.allocate().unwrap().sequence(), 3);
        assert_eq!(one.sequence(), 1);
        assert_eq!(two.sequence(), 2);
    }

    #[test]
    fn test_deliver_completes_wait() {
        let c = correlator();
        let pending = c.allocate().unwrap();
        assert!(c.deliver(&direct_reply(pending.sequence(), &[0x2A])));
        let reply = c.wait(pending, Duration::from_millis(10)).unwrap();
        assert_eq!(reply.kind, ReplyType::DirectReply);
        assert_eq!(&reply.payload[..], &[0x2A]);
        assert_eq!(c.outstanding(), 0);
    }

    #[test]
    fn test_deliver_unknown_sequence_is_noop() {
        let c = correlator();
        let pending = c.allocate().unwrap();
        assert!(!c.deliver(&direct_reply(pending.sequence() + 1, &[])));
        assert!(!c.deliver(&direct_reply(0, &[])));
        assert!(!c.deliver(&[0x01]));
        assert!(c.is_outstanding(pending.sequence()));
        assert_eq!(c.outstanding(), 1);
        assert_eq!(c.metrics.snapshot().reports_dropped, 3);
    }

    #[test]
    fn test_duplicate_delivery_fires_once() {
        let c = correlator();
        let pending = c.allocate().unwrap();
        let report = direct_reply(pending.sequence(), &[1]);
        assert!(c.deliver(&report));
        assert!(!c.deliver(&report));
        assert!(c.wait(pending, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_timeout_evicts_slot() {
        let c = correlator();
        let pending = c.allocate().unwrap();
        let sequence = pending.sequence();
        let err = c.wait(pending, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, DriverError::Timeout { sequence: s } if s == sequence));
        assert!(!c.is_outstanding(sequence));
        // 迟到的回复被丢弃
        assert!(!c.deliver(&direct_reply(sequence, &[])));
        assert_eq!(c.metrics.snapshot().timeouts, 1);
    }

    #[test]
    fn test_undecodable_report_keeps_slot() {
        let c = correlator();
        let pending = c.allocate().unwrap();
        // 系统回复但缺少 opcode/status
        let mut report = pending.sequence().to_le_bytes().to_vec();
        report.push(0x03);
        assert!(!c.deliver(&report));
        assert!(c.is_outstanding(pending.sequence()));
    }

    #[test]
    fn test_concurrent_deliver_from_other_thread() {
        let c = Arc::new(correlator());
        let pendings: Vec<_> = (0..16).map(|_| c.allocate().unwrap()).collect();
        let sequences: Vec<u16> = pendings.iter().map(|p| p.sequence()).collect();

        let deliverer = {
            let c = c.clone();
            thread::spawn(move || {
                for s in sequences.iter().rev() {
                    c.deliver(&direct_reply(*s, &s.to_le_bytes()));
                }
            })
        };

        for pending in pendings {
            let sequence = pending.sequence();
            let reply = c.wait(pending, Duration::from_secs(2)).unwrap();
            assert_eq!(reply.sequence, sequence);
            assert_eq!(reply.read_i16(0).unwrap() as u16, sequence);
        }
        deliverer.join().unwrap();
        assert_eq!(c.outstanding(), 0);
    }

    proptest! {
        #[test]
        fn prop_allocations_never_collide(start in any::<u16>(), count in 1usize..300) {
            let c = correlator();
            c.inner.lock().last = start;
            let mut seen = HashSet::new();
            let mut held = Vec::new();
            for _ in 0..count {
                let p = c.allocate().unwrap();
                prop_assert_ne!(p.sequence(), 0);
                prop_assert_ne!(p.sequence(), NO_REPLY_SEQUENCE);
                prop_assert!(seen.insert(p.sequence()));
                held.push(p);
            }
            prop_assert_eq!(c.outstanding(), count);
        }
    }
}

//! 长度前缀成帧
//!
//! TCP、蓝牙串口和 USB HID 在每个帧/报告前都加 2 字节小端长度。
//! `FrameCodec` 负责加前缀，以及从字节流中切出完整报告。

use crate::{TransportDeviceError, TransportDeviceErrorKind, TransportError};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const PREFIX_LEN: usize = 2;

/// 长度前缀编解码器（带接收缓冲区）
#[derive(Debug, Default)]
pub struct FrameCodec {
    buffer: BytesMut,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
        }
    }

    /// 给帧加上长度前缀
    pub fn encode(frame: &[u8]) -> Result<Bytes, TransportError> {
        let len = u16::try_from(frame.len()).map_err(|_| {
            TransportDeviceError::new(
                TransportDeviceErrorKind::FrameTooLarge,
                format!("frame of {} bytes", frame.len()),
            )
        })?;
        let mut out = BytesMut::with_capacity(PREFIX_LEN + frame.len());
        out.put_u16_le(len);
        out.put_slice(frame);
        Ok(out.freeze())
    }

    /// 追加收到的原始字节
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// 取出下一份完整报告（不含前缀），数据不足时返回 `None`
    ///
    /// 长度为 0 的报告没有内容，直接跳过。
    pub fn next_report(&mut self) -> Option<Vec<u8>> {
        loop {
            if self.buffer.len() < PREFIX_LEN {
                return None;
            }
            let len = u16::from_le_bytes([self.buffer[0], self.buffer[1]]) as usize;
            if self.buffer.len() < PREFIX_LEN + len {
                return None;
            }
            self.buffer.advance(PREFIX_LEN);
            let report = self.buffer.split_to(len);
            if !report.is_empty() {
                return Some(report.to_vec());
            }
        }
    }

    /// 缓冲区中尚未组成完整报告的字节数
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

//! 回复信封解码
//!
//! ```text
//! [seq lo][seq hi][reply type][payload ...]                      直接回复
//! [seq lo][seq hi][reply type][opcode][status][payload ...]      系统回复
//! ```
//!
//! 未知回复类型按直接回复的形状解码，由上层视为错误。

use crate::ProtocolError;
use crate::types::{ReplyType, SystemOpcode, SystemReplyStatus};
use bytes::Bytes;

const DIRECT_HEADER_LEN: usize = 3;
const SYSTEM_HEADER_LEN: usize = 5;

/// 解码后的回复
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub sequence: u16,
    pub kind: ReplyType,
    /// 仅系统回复
    pub system_opcode: Option<SystemOpcode>,
    /// 仅系统回复
    pub status: Option<SystemReplyStatus>,
    pub payload: Bytes,
}

impl Reply {
    /// 解码一份完整报告（传输层已去掉长度前缀）
    pub fn decode(report: &[u8]) -> Result<Self, ProtocolError> {
        if report.len() < DIRECT_HEADER_LEN {
            return Err(ProtocolError::InvalidLength {
                expected: DIRECT_HEADER_LEN,
                actual: report.len(),
            });
        }
        let sequence = u16::from_le_bytes([report[0], report[1]]);

        let kind = ReplyType::from(report[2]);
        if kind.is_system() {
            if report.len() < SYSTEM_HEADER_LEN {
                return Err(ProtocolError::InvalidLength {
                    expected: SYSTEM_HEADER_LEN,
                    actual: report.len(),
                });
            }
            Ok(Self {
                sequence,
                kind,
                system_opcode: Some(SystemOpcode::from(report[3])),
                status: Some(SystemReplyStatus::from(report[4])),
                payload: Bytes::copy_from_slice(&report[SYSTEM_HEADER_LEN..]),
            })
        } else {
            Ok(Self {
                sequence,
                kind,
                system_opcode: None,
                status: None,
                payload: Bytes::copy_from_slice(&report[DIRECT_HEADER_LEN..]),
            })
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind.is_error()
    }

    fn slice(&self, offset: usize, width: usize) -> Result<&[u8], ProtocolError> {
        offset
            .checked_add(width)
            .and_then(|end| self.payload.get(offset..end))
            .ok_or(ProtocolError::PayloadOutOfBounds {
                offset,
                width,
                len: self.payload.len(),
            })
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, ProtocolError> {
        Ok(self.slice(offset, 1)?[0])
    }

    pub fn read_i16(&self, offset: usize) -> Result<i16, ProtocolError> {
        let b = self.slice(offset, 2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i32(&self, offset: usize) -> Result<i32, ProtocolError> {
        let b = self.slice(offset, 4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f32(&self, offset: usize) -> Result<f32, ProtocolError> {
        let b = self.slice(offset, 4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// 读取 NUL 结尾字符串，最多 `max_len` 字节
    ///
    /// 没有 NUL 时取到 `max_len`（或负载末尾）为止；非 UTF-8 字节按有损方式替换。
    pub fn read_cstring(&self, offset: usize, max_len: usize) -> Result<String, ProtocolError> {
        if offset > self.payload.len() {
            return Err(ProtocolError::PayloadOutOfBounds {
                offset,
                width: max_len,
                len: self.payload.len(),
            });
        }
        let end = (offset + max_len).min(self.payload.len());
        let window = &self.payload[offset..end];
        let text = match window.iter().position(|&b| b == 0) {
            Some(nul) => &window[..nul],
            None => window,
        };
        Ok(String::from_utf8_lossy(text).into_owned())
    }
}

/// 读取报告的序列号（前两个字节，小端）
pub fn peek_sequence(report: &[u8]) -> Option<u16> {
    match report {
        [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_direct_reply() {
        let reply = Reply::decode(&[0x05, 0x00, 0x02, 0xAA, 0xBB]).unwrap();
        assert_eq!(reply.sequence, 5);
        assert_eq!(reply.kind, ReplyType::DirectReply);
        assert_eq!(reply.system_opcode, None);
        assert_eq!(&reply.payload[..], &[0xAA, 0xBB]);
        assert!(!reply.is_error());
    }

    #[test]
    fn test_decode_system_reply() {
        let reply = Reply::decode(&[0x01, 0x01, 0x03, 0x92, 0x00, 0x07]).unwrap();
        assert_eq!(reply.sequence, 0x0101);
        assert_eq!(reply.system_opcode, Some(SystemOpcode::BeginDownload));
        assert_eq!(reply.status, Some(SystemReplyStatus::Success));
        assert_eq!(&reply.payload[..], &[0x07]);
    }

    #[test]
    fn test_decode_system_error_unknown_status() {
        let reply = Reply::decode(&[0x09, 0x00, 0x05, 0x9C, 0x42]).unwrap();
        assert!(reply.is_error());
        assert_eq!(reply.status, Some(SystemReplyStatus::Unknown(0x42)));
        assert!(reply.payload.is_empty());
    }

    #[test]
    fn test_decode_unknown_kind_is_direct_shaped_error() {
        let reply = Reply::decode(&[0x09, 0x00, 0x77, 0x01]).unwrap();
        assert_eq!(reply.kind, ReplyType::Unknown(0x77));
        assert!(reply.is_error());
        assert_eq!(&reply.payload[..], &[0x01]);
    }

    #[test]
    fn test_decode_short_reports() {
        assert!(matches!(
            Reply::decode(&[0x01]),
            Err(ProtocolError::InvalidLength { actual: 1, .. })
        ));
        assert!(matches!(
            Reply::decode(&[0x01, 0x00]),
            Err(ProtocolError::InvalidLength { actual: 2, .. })
        ));
        assert!(matches!(
            Reply::decode(&[0x01, 0x00, 0x03, 0x92]),
            Err(ProtocolError::InvalidLength { expected: 5, .. })
        ));
    }

    #[test]
    fn test_read_cstring() {
        let mut report = vec![0x01, 0x00, 0x02];
        report.extend_from_slice(b"V1.09H\0\0\0\0");
        let reply = Reply::decode(&report).unwrap();
        assert_eq!(reply.read_cstring(0, 16).unwrap(), "V1.09H");
        assert_eq!(reply.read_cstring(0, 2).unwrap(), "V1");
        assert!(reply.read_cstring(11, 4).is_err());
    }

    #[test]
    fn test_read_out_of_bounds() {
        let reply = Reply::decode(&[0x01, 0x00, 0x02, 0x01, 0x02]).unwrap();
        assert!(matches!(
            reply.read_i32(0),
            Err(ProtocolError::PayloadOutOfBounds { len: 2, .. })
        ));
        assert_eq!(reply.read_i16(0).unwrap(), 0x0201);
    }

    #[test]
    fn test_peek_sequence() {
        assert_eq!(peek_sequence(&[0xFF, 0xFF, 0x02]), Some(0xFFFF));
        assert_eq!(peek_sequence(&[0x00]), None);
    }

    fn report_with(offset: usize, value: &[u8]) -> Vec<u8> {
        let mut report = vec![0x10, 0x00, 0x02];
        report.extend(std::iter::repeat_n(0xEE, offset));
        report.extend_from_slice(value);
        report.extend_from_slice(&[0xEE; 3]);
        report
    }

    proptest! {
        #[test]
        fn prop_read_u8_at_offset(offset in 0usize..64, value in any::<u8>()) {
            let reply = Reply::decode(&report_with(offset, &[value])).unwrap();
            prop_assert_eq!(reply.read_u8(offset).unwrap(), value);
        }

        #[test]
        fn prop_read_i16_at_offset(offset in 0usize..64, value in any::<i16>()) {
            let reply = Reply::decode(&report_with(offset, &value.to_le_bytes())).unwrap();
            prop_assert_eq!(reply.read_i16(offset).unwrap(), value);
        }

        #[test]
        fn prop_read_i32_at_offset(offset in 0usize..64, value in any::<i32>()) {
            let reply = Reply::decode(&report_with(offset, &value.to_le_bytes())).unwrap();
            prop_assert_eq!(reply.read_i32(offset).unwrap(), value);
        }

        #[test]
        fn prop_read_f32_at_offset(offset in 0usize..64, value in -1.0e6f32..1.0e6) {
            let reply = Reply::decode(&report_with(offset, &value.to_le_bytes())).unwrap();
            prop_assert_eq!(reply.read_f32(offset).unwrap(), value);
        }
    }
}

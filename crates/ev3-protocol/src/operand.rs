//! 参数（operand）编码
//!
//! 直接指令的每个参数都带有自描述的前缀字节：
//!
//! | 形式 | 前缀 | 载荷 |
//! |------|------|------|
//! | LC0 | `value & 0x3F` | 无（-31..=31） |
//! | LC1 | `0x81` | i8 |
//! | LC2 | `0x82` | i16 小端 |
//! | LC4 | `0x83` | i32 小端 |
//! | LCS | `0x84` | 字节串 + NUL |
//! | GV0 | `0x60 \| index` | 无（0..32） |
//! | GV1 | `0xE1` | u8 |
//! | GV2 | `0xE2` | u16 小端 |

use bytes::BufMut;

const LC1_PREFIX: u8 = 0x81;
const LC2_PREFIX: u8 = 0x82;
const LC4_PREFIX: u8 = 0x83;
const LCS_PREFIX: u8 = 0x84;
const GV0_BASE: u8 = 0x60;
const GV1_PREFIX: u8 = 0xE1;
const GV2_PREFIX: u8 = 0xE2;

/// 按数值大小选择最短的常量编码
pub fn put_constant<B: BufMut>(buf: &mut B, value: i32) {
    if (-31..=31).contains(&value) {
        buf.put_u8((value as u8) & 0x3F);
    } else if (i8::MIN as i32..=i8::MAX as i32).contains(&value) {
        buf.put_u8(LC1_PREFIX);
        buf.put_i8(value as i8);
    } else if (i16::MIN as i32..=i16::MAX as i32).contains(&value) {
        buf.put_u8(LC2_PREFIX);
        buf.put_i16_le(value as i16);
    } else {
        buf.put_u8(LC4_PREFIX);
        buf.put_i32_le(value);
    }
}

/// 字符串常量（LCS），以 NUL 结尾
pub fn put_string<B: BufMut>(buf: &mut B, value: &str) {
    buf.put_u8(LCS_PREFIX);
    buf.put_slice(value.as_bytes());
    buf.put_u8(0x00);
}

/// 全局变量偏移量（回复缓冲区中的位置）
pub fn put_global_index<B: BufMut>(buf: &mut B, index: u16) {
    if index < 32 {
        buf.put_u8(GV0_BASE | index as u8);
    } else if index <= u8::MAX as u16 {
        buf.put_u8(GV1_PREFIX);
        buf.put_u8(index as u8);
    } else {
        buf.put_u8(GV2_PREFIX);
        buf.put_u16_le(index);
    }
}

/// 编码后的常量长度（字节）
pub fn constant_len(value: i32) -> usize {
    if (-31..=31).contains(&value) {
        1
    } else if (i8::MIN as i32..=i8::MAX as i32).contains(&value) {
        2
    } else if (i16::MIN as i32..=i16::MAX as i32).contains(&value) {
        3
    } else {
        5
    }
}

//! `Program` 编码器
//!
//! 一个 `Program` 是设备一次执行的指令批次。帧格式（传输层长度前缀之前）：
//!
//! ```text
//! [seq lo][seq hi][kind][sizes lo][sizes hi][instr ...]   直接指令
//! [seq lo][seq hi][kind][instr ...]                       系统指令
//! ```
//!
//! 序列号在发送时才分配（见 [`Program::to_frame`]），无回复类型使用
//! [`NO_REPLY_SEQUENCE`]。指令只能追加；`Brick::send` 以值接收 `Program`，
//! 发送后无法再修改。

use crate::opcodes::{LAYER, Opcode};
use crate::types::{CommandType, SystemOpcode};
use crate::{ProtocolError, operand};
use bilge::prelude::*;
use bytes::{BufMut, Bytes, BytesMut};

/// 无回复程序使用的序列号
pub const NO_REPLY_SEQUENCE: u16 = 0xFFFF;

/// 全局缓冲区最大字节数（10 位）
pub const MAX_GLOBAL_SIZE: u16 = 0x03FF;

/// 局部缓冲区最大字节数（6 位）
pub const MAX_LOCAL_SIZE: u8 = 0x3F;

/// 缓冲区大小声明（直接指令帧头中的 16 位字）
///
/// - Bit 0-9: 全局缓冲区大小
/// - Bit 10-15: 局部缓冲区大小
#[bitsize(16)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq)]
pub struct BufferSizes {
    pub global: u10,
    pub local: u6,
}

impl BufferSizes {
    fn encode(global: u16, local: u8) -> u16 {
        let sizes = BufferSizes::new(u10::new(global & MAX_GLOBAL_SIZE), u6::new(local & MAX_LOCAL_SIZE));
        u16::from(sizes)
    }
}

/// 一条读指令在全局缓冲区中的目标位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadTarget {
    pub offset: u16,
    pub width: u16,
}

impl ReadTarget {
    pub fn end(&self) -> u32 {
        self.offset as u32 + self.width as u32
    }
}

/// 设备可执行的指令批次
#[derive(Debug, Clone)]
pub struct Program {
    kind: CommandType,
    global_size: u16,
    local_size: u8,
    body: BytesMut,
    reads: Vec<ReadTarget>,
}

impl Program {
    /// 创建不声明缓冲区的程序
    pub fn new(kind: CommandType) -> Self {
        Self::with_buffers(kind, 0, 0)
    }

    /// 创建声明了全局/局部缓冲区的程序
    ///
    /// 缓冲区只对直接指令有意义。超出 10/6 位的值属于编程错误，
    /// debug 构建下直接 panic，release 构建下由 [`Program::validate`] 报告。
    pub fn with_buffers(kind: CommandType, global_size: u16, local_size: u8) -> Self {
        debug_assert!(
            global_size <= MAX_GLOBAL_SIZE && local_size <= MAX_LOCAL_SIZE,
            "buffer sizes out of range: global {global_size}, local {local_size}"
        );
        Self {
            kind,
            global_size,
            local_size,
            body: BytesMut::with_capacity(64),
            reads: Vec::new(),
        }
    }

    /// 需要回复的直接指令，全局缓冲区 `global_size` 字节
    pub fn direct_reply(global_size: u16) -> Self {
        Self::with_buffers(CommandType::DirectReply, global_size, 0)
    }

    pub fn direct_no_reply() -> Self {
        Self::new(CommandType::DirectNoReply)
    }

    pub fn system_reply() -> Self {
        Self::new(CommandType::SystemReply)
    }

    pub fn system_no_reply() -> Self {
        Self::new(CommandType::SystemNoReply)
    }

    pub fn kind(&self) -> CommandType {
        self.kind
    }

    pub fn expects_reply(&self) -> bool {
        self.kind.expects_reply()
    }

    pub fn global_size(&self) -> u16 {
        self.global_size
    }

    pub fn local_size(&self) -> u8 {
        self.local_size
    }

    /// 已编码的指令字节（不含帧头）
    pub fn instructions(&self) -> &[u8] {
        &self.body
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// 所有读指令的目标位置，按追加顺序
    pub fn read_targets(&self) -> &[ReadTarget] {
        &self.reads
    }

    // ------------------------------------------------------------------
    // 底层追加方法
    // ------------------------------------------------------------------

    /// 追加操作码（及其子码）
    pub fn opcode(&mut self, op: Opcode) -> &mut Self {
        self.body.put_u8(op.code);
        if let Some(sub) = op.sub {
            operand::put_constant(&mut self.body, sub as i32);
        }
        self
    }

    /// 追加操作码并写入层号
    pub(crate) fn layered(&mut self, op: Opcode) -> &mut Self {
        self.opcode(op).constant(LAYER as i32)
    }

    /// 追加系统指令操作码
    pub fn system_opcode(&mut self, op: SystemOpcode) -> &mut Self {
        debug_assert!(self.kind.is_system(), "system opcode in direct program");
        self.body.put_u8(op.into());
        self
    }

    /// 追加整数常量（按大小选择 LC0/LC1/LC2/LC4）
    pub fn constant(&mut self, value: i32) -> &mut Self {
        operand::put_constant(&mut self.body, value);
        self
    }

    /// 追加字符串常量（LCS）
    pub fn string(&mut self, value: &str) -> &mut Self {
        operand::put_string(&mut self.body, value);
        self
    }

    /// 追加全局变量引用，并记录读取目标
    ///
    /// 偏移量由调用方安排；编码器不检查重叠。
    pub fn global(&mut self, offset: u16, width: u16) -> &mut Self {
        debug_assert!(
            offset as u32 + width as u32 <= self.global_size as u32,
            "read target {offset}+{width} exceeds global buffer of {} bytes",
            self.global_size
        );
        operand::put_global_index(&mut self.body, offset);
        self.reads.push(ReadTarget { offset, width });
        self
    }

    /// 追加原始字节（系统指令载荷）
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.body.put_slice(bytes);
        self
    }

    pub fn raw_u8(&mut self, value: u8) -> &mut Self {
        self.body.put_u8(value);
        self
    }

    pub fn raw_u32_le(&mut self, value: u32) -> &mut Self {
        self.body.put_u32_le(value);
        self
    }

    /// 原始 NUL 结尾字符串（系统指令中的路径，无 LCS 前缀）
    pub fn raw_cstr(&mut self, value: &str) -> &mut Self {
        self.body.put_slice(value.as_bytes());
        self.body.put_u8(0x00);
        self
    }

    // ------------------------------------------------------------------
    // 校验与成帧
    // ------------------------------------------------------------------

    /// 检查缓冲区声明能容纳所有读取目标
    ///
    /// 只做边界检查，不检查目标之间是否重叠。
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.global_size > MAX_GLOBAL_SIZE || self.local_size > MAX_LOCAL_SIZE {
            return Err(ProtocolError::BufferSize {
                global: self.global_size,
                local: self.local_size,
            });
        }
        if let Some(target) = self.reads.iter().find(|t| t.end() > self.global_size as u32) {
            return Err(ProtocolError::ReadOutOfBounds {
                offset: target.offset,
                width: target.width,
                global_size: self.global_size,
            });
        }
        Ok(())
    }

    /// 读取目标所需的最小全局缓冲区
    pub fn required_global_size(&self) -> u32 {
        self.reads.iter().map(ReadTarget::end).max().unwrap_or(0)
    }

    /// 生成完整帧
    ///
    /// `sequence` 为 `None` 时使用 [`NO_REPLY_SEQUENCE`]。
    pub fn to_frame(&self, sequence: Option<u16>) -> Bytes {
        let header = if self.kind.is_direct() { 5 } else { 3 };
        let mut frame = BytesMut::with_capacity(header + self.body.len());
        frame.put_u16_le(sequence.unwrap_or(NO_REPLY_SEQUENCE));
        frame.put_u8(self.kind.into());
        if self.kind.is_direct() {
            frame.put_u16_le(BufferSizes::encode(self.global_size, self.local_size));
        }
        frame.put_slice(&self.body);
        frame.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_no_reply_frame() {
        let mut program = Program::direct_no_reply();
        program.opcode(Opcode::UI_DRAW_UPDATE);
        let frame = program.to_frame(None);
        assert_eq!(&frame[..], &[0xFF, 0xFF, 0x80, 0x00, 0x00, 0x84, 0x00]);
    }

    #[test]
    fn test_direct_reply_frame_header() {
        let mut program = Program::direct_reply(94);
        program.global(88, 1);
        let frame = program.to_frame(Some(0x1234));
        assert_eq!(frame[0], 0x34);
        assert_eq!(frame[1], 0x12);
        assert_eq!(frame[2], 0x00);
        // 94 = 0x5E，局部大小 0
        assert_eq!(frame[3], 0x5E);
        assert_eq!(frame[4], 0x00);
    }

    #[test]
    fn test_buffer_sizes_bit_layout() {
        let mut program = Program::with_buffers(CommandType::DirectReply, 1023, 63);
        program.opcode(Opcode::UI_DRAW_UPDATE);
        let frame = program.to_frame(Some(1));
        let word = u16::from_le_bytes([frame[3], frame[4]]);
        assert_eq!(word, 0xFFFF);

        let sizes = BufferSizes::from(BufferSizes::encode(300, 5));
        assert_eq!(sizes.global().value(), 300);
        assert_eq!(sizes.local().value(), 5);
    }

    #[test]
    fn test_system_frame_has_no_sizes() {
        let mut program = Program::system_reply();
        program
            .system_opcode(SystemOpcode::CreateDirectory)
            .raw_cstr("../prjs/x");
        let frame = program.to_frame(Some(2));
        assert_eq!(&frame[..4], &[0x02, 0x00, 0x01, 0x9B]);
        assert_eq!(&frame[4..], b"../prjs/x\0");
    }

    #[test]
    fn test_validate_and_required_size() {
        let mut program = Program::direct_reply(8);
        program.global(0, 4).global(4, 4);
        assert!(program.validate().is_ok());
        assert_eq!(program.required_global_size(), 8);
        assert_eq!(program.read_targets().len(), 2);
    }

    #[test]
    fn test_validate_reports_out_of_range_buffers() {
        let program = Program {
            kind: CommandType::DirectReply,
            global_size: 2000,
            local_size: 0,
            body: BytesMut::new(),
            reads: Vec::new(),
        };
        assert!(matches!(
            program.validate(),
            Err(ProtocolError::BufferSize { global: 2000, .. })
        ));

        let program = Program {
            kind: CommandType::DirectReply,
            global_size: 4,
            local_size: 0,
            body: BytesMut::new(),
            reads: vec![ReadTarget { offset: 2, width: 4 }],
        };
        assert_eq!(
            program.validate(),
            Err(ProtocolError::ReadOutOfBounds {
                offset: 2,
                width: 4,
                global_size: 4
            })
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "exceeds global buffer")]
    fn test_read_past_buffer_panics_in_debug() {
        let mut program = Program::direct_reply(2);
        program.global(0, 4);
    }

    #[test]
    fn test_frame_is_stable_across_calls() {
        let mut program = Program::direct_reply(1);
        program.global(0, 1);
        assert_eq!(program.to_frame(Some(5)), program.to_frame(Some(5)));
        assert_ne!(program.to_frame(Some(5)), program.to_frame(Some(6)));
    }
}

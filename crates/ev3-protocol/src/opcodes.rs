//! 直接指令操作码表
//!
//! 一条指令由操作码字节和可选的子码组成。子码在帧中按 LC0 常量编码
//! （子码均小于 32，编码后字节值不变）。

/// 直接指令操作码（主码 + 可选子码）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode {
    pub code: u8,
    pub sub: Option<u8>,
}

impl Opcode {
    const fn plain(code: u8) -> Self {
        Self { code, sub: None }
    }

    const fn with_sub(code: u8, sub: u8) -> Self {
        Self { code, sub: Some(sub) }
    }

    // ------------------------------------------------------------------
    // UI
    // ------------------------------------------------------------------
    pub const UI_READ_GET_FW_VERS: Opcode = Opcode::with_sub(0x81, 0x0A);
    pub const UI_WRITE_LED: Opcode = Opcode::with_sub(0x82, 0x1B);
    pub const UI_BUTTON_PRESSED: Opcode = Opcode::with_sub(0x83, 0x09);

    pub const UI_DRAW_UPDATE: Opcode = Opcode::with_sub(0x84, 0x00);
    pub const UI_DRAW_CLEAN: Opcode = Opcode::with_sub(0x84, 0x01);
    pub const UI_DRAW_PIXEL: Opcode = Opcode::with_sub(0x84, 0x02);
    pub const UI_DRAW_LINE: Opcode = Opcode::with_sub(0x84, 0x03);
    pub const UI_DRAW_CIRCLE: Opcode = Opcode::with_sub(0x84, 0x04);
    pub const UI_DRAW_TEXT: Opcode = Opcode::with_sub(0x84, 0x05);
    pub const UI_DRAW_FILLRECT: Opcode = Opcode::with_sub(0x84, 0x09);
    pub const UI_DRAW_RECT: Opcode = Opcode::with_sub(0x84, 0x0A);
    pub const UI_DRAW_INVERSERECT: Opcode = Opcode::with_sub(0x84, 0x10);
    pub const UI_DRAW_SELECT_FONT: Opcode = Opcode::with_sub(0x84, 0x11);
    pub const UI_DRAW_TOPLINE: Opcode = Opcode::with_sub(0x84, 0x12);
    pub const UI_DRAW_FILLWINDOW: Opcode = Opcode::with_sub(0x84, 0x13);
    pub const UI_DRAW_DOTLINE: Opcode = Opcode::with_sub(0x84, 0x15);
    pub const UI_DRAW_FILLCIRCLE: Opcode = Opcode::with_sub(0x84, 0x18);
    pub const UI_DRAW_BMPFILE: Opcode = Opcode::with_sub(0x84, 0x1C);

    // ------------------------------------------------------------------
    // 声音
    // ------------------------------------------------------------------
    pub const SOUND_TONE: Opcode = Opcode::with_sub(0x94, 0x01);
    pub const SOUND_PLAY: Opcode = Opcode::with_sub(0x94, 0x02);

    // ------------------------------------------------------------------
    // 输入设备
    // ------------------------------------------------------------------
    pub const INPUT_DEVICE_GET_TYPEMODE: Opcode = Opcode::with_sub(0x99, 0x05);
    pub const INPUT_DEVICE_CLR_ALL: Opcode = Opcode::with_sub(0x99, 0x0A);
    pub const INPUT_DEVICE_GET_NAME: Opcode = Opcode::with_sub(0x99, 0x15);
    pub const INPUT_DEVICE_GET_MODENAME: Opcode = Opcode::with_sub(0x99, 0x16);
    pub const INPUT_DEVICE_CLR_CHANGES: Opcode = Opcode::with_sub(0x99, 0x1A);
    pub const INPUT_DEVICE_READY_PCT: Opcode = Opcode::with_sub(0x99, 0x1B);
    pub const INPUT_DEVICE_READY_RAW: Opcode = Opcode::with_sub(0x99, 0x1C);
    pub const INPUT_DEVICE_READY_SI: Opcode = Opcode::with_sub(0x99, 0x1D);

    // ------------------------------------------------------------------
    // 输出（电机）
    // ------------------------------------------------------------------
    pub const OUTPUT_STOP: Opcode = Opcode::plain(0xA3);
    pub const OUTPUT_POWER: Opcode = Opcode::plain(0xA4);
    pub const OUTPUT_SPEED: Opcode = Opcode::plain(0xA5);
    pub const OUTPUT_START: Opcode = Opcode::plain(0xA6);
    pub const OUTPUT_POLARITY: Opcode = Opcode::plain(0xA7);
    pub const OUTPUT_READY: Opcode = Opcode::plain(0xAA);
    pub const OUTPUT_STEP_POWER: Opcode = Opcode::plain(0xAC);
    pub const OUTPUT_TIME_POWER: Opcode = Opcode::plain(0xAD);
    pub const OUTPUT_STEP_SPEED: Opcode = Opcode::plain(0xAE);
    pub const OUTPUT_TIME_SPEED: Opcode = Opcode::plain(0xAF);
    pub const OUTPUT_STEP_SYNC: Opcode = Opcode::plain(0xB0);
    pub const OUTPUT_TIME_SYNC: Opcode = Opcode::plain(0xB1);
}

/// 所有直接指令的层号（单机，无菊花链）
pub const LAYER: u8 = 0;

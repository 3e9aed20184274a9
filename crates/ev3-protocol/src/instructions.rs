//! 指令构建方法
//!
//! 每个方法向 `Program` 追加一条指令，返回 `&mut Self` 以便链式调用。
//! 读类指令的 `offset` 是结果在全局缓冲区中的位置，由调用方安排。

use crate::opcodes::Opcode;
use crate::program::Program;
use crate::types::{
    BrickButton, Color, FontType, InputPort, LedPattern, OutputPorts, Polarity, SystemOpcode,
};

/// 读取指令的数据格式：读取一个值
const ONE_VALUE: i32 = 1;
/// 设备类型参数：0 表示不改变当前类型
const KEEP_TYPE: i32 = 0;

/// 步进/定时电机指令的三段（加速/匀速/减速）参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ramp {
    pub up: u32,
    pub constant: u32,
    pub down: u32,
}

impl Ramp {
    /// 无加减速段
    pub fn constant(value: u32) -> Self {
        Self {
            up: 0,
            constant: value,
            down: 0,
        }
    }
}

impl Program {
    // ======================================================================
    // 输出（电机）
    // ======================================================================

    fn output_header(&mut self, op: Opcode, ports: OutputPorts) -> &mut Self {
        self.layered(op).constant(ports.bits() as i32)
    }

    pub fn output_stop(&mut self, ports: OutputPorts, brake: bool) -> &mut Self {
        self.output_header(Opcode::OUTPUT_STOP, ports).constant(brake as i32)
    }

    /// 设置功率（-100..=100），需配合 `output_start`
    pub fn output_power(&mut self, ports: OutputPorts, power: i8) -> &mut Self {
        self.output_header(Opcode::OUTPUT_POWER, ports).constant(power as i32)
    }

    /// 设置速度（-100..=100），需配合 `output_start`
    pub fn output_speed(&mut self, ports: OutputPorts, speed: i8) -> &mut Self {
        self.output_header(Opcode::OUTPUT_SPEED, ports).constant(speed as i32)
    }

    pub fn output_start(&mut self, ports: OutputPorts) -> &mut Self {
        self.output_header(Opcode::OUTPUT_START, ports)
    }

    pub fn output_polarity(&mut self, ports: OutputPorts, polarity: Polarity) -> &mut Self {
        self.output_header(Opcode::OUTPUT_POLARITY, ports)
            .constant(i8::from(polarity) as i32)
    }

    /// 等待端口完成当前动作
    pub fn output_ready(&mut self, ports: OutputPorts) -> &mut Self {
        self.output_header(Opcode::OUTPUT_READY, ports)
    }

    fn output_profile(
        &mut self,
        op: Opcode,
        ports: OutputPorts,
        value: i8,
        ramp: Ramp,
        brake: bool,
    ) -> &mut Self {
        self.output_header(op, ports)
            .constant(value as i32)
            .constant(ramp.up as i32)
            .constant(ramp.constant as i32)
            .constant(ramp.down as i32)
            .constant(brake as i32)
    }

    /// 以指定功率转动指定步数（角度）
    pub fn output_step_power(
        &mut self,
        ports: OutputPorts,
        power: i8,
        steps: Ramp,
        brake: bool,
    ) -> &mut Self {
        self.output_profile(Opcode::OUTPUT_STEP_POWER, ports, power, steps, brake)
    }

    /// 以指定功率转动指定时间（毫秒）
    pub fn output_time_power(
        &mut self,
        ports: OutputPorts,
        power: i8,
        millis: Ramp,
        brake: bool,
    ) -> &mut Self {
        self.output_profile(Opcode::OUTPUT_TIME_POWER, ports, power, millis, brake)
    }

    pub fn output_step_speed(
        &mut self,
        ports: OutputPorts,
        speed: i8,
        steps: Ramp,
        brake: bool,
    ) -> &mut Self {
        self.output_profile(Opcode::OUTPUT_STEP_SPEED, ports, speed, steps, brake)
    }

    pub fn output_time_speed(
        &mut self,
        ports: OutputPorts,
        speed: i8,
        millis: Ramp,
        brake: bool,
    ) -> &mut Self {
        self.output_profile(Opcode::OUTPUT_TIME_SPEED, ports, speed, millis, brake)
    }

    /// 同步驱动两个电机，`turn_ratio` 范围 -200..=200
    pub fn output_step_sync(
        &mut self,
        ports: OutputPorts,
        speed: i8,
        turn_ratio: i16,
        steps: u32,
        brake: bool,
    ) -> &mut Self {
        self.output_header(Opcode::OUTPUT_STEP_SYNC, ports)
            .constant(speed as i32)
            .constant(turn_ratio as i32)
            .constant(steps as i32)
            .constant(brake as i32)
    }

    pub fn output_time_sync(
        &mut self,
        ports: OutputPorts,
        speed: i8,
        turn_ratio: i16,
        millis: u32,
        brake: bool,
    ) -> &mut Self {
        self.output_header(Opcode::OUTPUT_TIME_SYNC, ports)
            .constant(speed as i32)
            .constant(turn_ratio as i32)
            .constant(millis as i32)
            .constant(brake as i32)
    }

    // ======================================================================
    // 输入（传感器）
    // ======================================================================

    /// 读取类型和模式，各 1 字节
    pub fn input_type_mode(
        &mut self,
        port: InputPort,
        type_offset: u16,
        mode_offset: u16,
    ) -> &mut Self {
        self.layered(Opcode::INPUT_DEVICE_GET_TYPEMODE)
            .constant(port.code() as i32)
            .global(type_offset, 1)
            .global(mode_offset, 1)
    }

    pub fn input_clear_all(&mut self) -> &mut Self {
        self.layered(Opcode::INPUT_DEVICE_CLR_ALL)
    }

    pub fn input_clear_changes(&mut self, port: InputPort) -> &mut Self {
        self.layered(Opcode::INPUT_DEVICE_CLR_CHANGES)
            .constant(port.code() as i32)
    }

    /// 读取设备名称（NUL 结尾，最多 `len` 字节）
    pub fn input_device_name(&mut self, port: InputPort, len: u8, offset: u16) -> &mut Self {
        self.layered(Opcode::INPUT_DEVICE_GET_NAME)
            .constant(port.code() as i32)
            .constant(len as i32)
            .global(offset, len as u16)
    }

    pub fn input_mode_name(
        &mut self,
        port: InputPort,
        mode: u8,
        len: u8,
        offset: u16,
    ) -> &mut Self {
        self.layered(Opcode::INPUT_DEVICE_GET_MODENAME)
            .constant(port.code() as i32)
            .constant(mode as i32)
            .constant(len as i32)
            .global(offset, len as u16)
    }

    fn input_ready(&mut self, op: Opcode, port: InputPort, mode: u8, offset: u16, width: u16) -> &mut Self {
        self.layered(op)
            .constant(port.code() as i32)
            .constant(KEEP_TYPE)
            .constant(mode as i32)
            .constant(ONE_VALUE)
            .global(offset, width)
    }

    /// 读取百分比值（1 字节）
    pub fn input_ready_percent(&mut self, port: InputPort, mode: u8, offset: u16) -> &mut Self {
        self.input_ready(Opcode::INPUT_DEVICE_READY_PCT, port, mode, offset, 1)
    }

    /// 读取原始值（i32，4 字节）
    pub fn input_ready_raw(&mut self, port: InputPort, mode: u8, offset: u16) -> &mut Self {
        self.input_ready(Opcode::INPUT_DEVICE_READY_RAW, port, mode, offset, 4)
    }

    /// 读取 SI 值（f32，4 字节）
    pub fn input_ready_si(&mut self, port: InputPort, mode: u8, offset: u16) -> &mut Self {
        self.input_ready(Opcode::INPUT_DEVICE_READY_SI, port, mode, offset, 4)
    }

    // ======================================================================
    // 声音
    // ======================================================================

    /// 播放音调，音量 0..=100
    pub fn sound_tone(&mut self, volume: u8, frequency: u16, duration_ms: u16) -> &mut Self {
        self.opcode(Opcode::SOUND_TONE)
            .constant(volume as i32)
            .constant(frequency as i32)
            .constant(duration_ms as i32)
    }

    /// 播放设备上的声音文件（不含 .rsf 扩展名）
    pub fn sound_play(&mut self, volume: u8, file: &str) -> &mut Self {
        self.opcode(Opcode::SOUND_PLAY)
            .constant(volume as i32)
            .string(file)
    }

    // ======================================================================
    // UI
    // ======================================================================

    pub fn ui_firmware_version(&mut self, len: u8, offset: u16) -> &mut Self {
        self.opcode(Opcode::UI_READ_GET_FW_VERS)
            .constant(len as i32)
            .global(offset, len as u16)
    }

    pub fn ui_led(&mut self, pattern: LedPattern) -> &mut Self {
        self.opcode(Opcode::UI_WRITE_LED)
            .constant(u8::from(pattern) as i32)
    }

    /// 按键是否按下（1 字节，非零表示按下）
    pub fn ui_button_pressed(&mut self, button: BrickButton, offset: u16) -> &mut Self {
        self.opcode(Opcode::UI_BUTTON_PRESSED)
            .constant(u8::from(button) as i32)
            .global(offset, 1)
    }

    pub fn draw_update(&mut self) -> &mut Self {
        self.opcode(Opcode::UI_DRAW_UPDATE)
    }

    pub fn draw_clean(&mut self) -> &mut Self {
        self.opcode(Opcode::UI_DRAW_CLEAN)
    }

    fn points(&mut self, values: &[u16]) -> &mut Self {
        for v in values {
            self.constant(*v as i32);
        }
        self
    }

    fn draw_colored(&mut self, op: Opcode, color: Color) -> &mut Self {
        self.opcode(op).constant(u8::from(color) as i32)
    }

    pub fn draw_pixel(&mut self, color: Color, x: u16, y: u16) -> &mut Self {
        self.draw_colored(Opcode::UI_DRAW_PIXEL, color).points(&[x, y])
    }

    pub fn draw_line(&mut self, color: Color, x0: u16, y0: u16, x1: u16, y1: u16) -> &mut Self {
        self.draw_colored(Opcode::UI_DRAW_LINE, color)
            .points(&[x0, y0, x1, y1])
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_dotted_line(
        &mut self,
        color: Color,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
        on_pixels: u16,
        off_pixels: u16,
    ) -> &mut Self {
        self.draw_colored(Opcode::UI_DRAW_DOTLINE, color)
            .points(&[x0, y0, x1, y1, on_pixels, off_pixels])
    }

    pub fn draw_circle(
        &mut self,
        color: Color,
        x: u16,
        y: u16,
        radius: u16,
        filled: bool,
    ) -> &mut Self {
        let op = if filled {
            Opcode::UI_DRAW_FILLCIRCLE
        } else {
            Opcode::UI_DRAW_CIRCLE
        };
        self.draw_colored(op, color).points(&[x, y, radius])
    }

    pub fn draw_rect(
        &mut self,
        color: Color,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        filled: bool,
    ) -> &mut Self {
        let op = if filled {
            Opcode::UI_DRAW_FILLRECT
        } else {
            Opcode::UI_DRAW_RECT
        };
        self.draw_colored(op, color).points(&[x, y, width, height])
    }

    pub fn draw_inverse_rect(&mut self, x: u16, y: u16, width: u16, height: u16) -> &mut Self {
        self.opcode(Opcode::UI_DRAW_INVERSERECT)
            .points(&[x, y, width, height])
    }

    pub fn draw_text(&mut self, color: Color, x: u16, y: u16, text: &str) -> &mut Self {
        self.draw_colored(Opcode::UI_DRAW_TEXT, color)
            .points(&[x, y])
            .string(text)
    }

    /// 填充 y0 到 y1 之间的整行区域
    pub fn draw_fill_window(&mut self, color: Color, y0: u16, y1: u16) -> &mut Self {
        self.draw_colored(Opcode::UI_DRAW_FILLWINDOW, color)
            .points(&[y0, y1])
    }

    /// 绘制设备上的 .rgf 图片
    pub fn draw_image(&mut self, color: Color, x: u16, y: u16, device_path: &str) -> &mut Self {
        self.draw_colored(Opcode::UI_DRAW_BMPFILE, color)
            .points(&[x, y])
            .string(device_path)
    }

    pub fn draw_top_line(&mut self, enabled: bool) -> &mut Self {
        self.opcode(Opcode::UI_DRAW_TOPLINE).constant(enabled as i32)
    }

    pub fn draw_select_font(&mut self, font: FontType) -> &mut Self {
        self.opcode(Opcode::UI_DRAW_SELECT_FONT)
            .constant(u8::from(font) as i32)
    }

    // ======================================================================
    // 系统指令
    // ======================================================================

    /// 开始下载：总长度 + 目标路径
    pub fn begin_download(&mut self, length: u32, device_path: &str) -> &mut Self {
        self.system_opcode(SystemOpcode::BeginDownload)
            .raw_u32_le(length)
            .raw_cstr(device_path)
    }

    /// 下载一个数据块
    pub fn continue_download(&mut self, handle: u8, chunk: &[u8]) -> &mut Self {
        self.system_opcode(SystemOpcode::ContinueDownload)
            .raw_u8(handle)
            .raw(chunk)
    }

    pub fn create_directory(&mut self, device_path: &str) -> &mut Self {
        self.system_opcode(SystemOpcode::CreateDirectory)
            .raw_cstr(device_path)
    }

    pub fn delete_file(&mut self, device_path: &str) -> &mut Self {
        self.system_opcode(SystemOpcode::DeleteFile)
            .raw_cstr(device_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CommandType, OutputPort};

    fn body(program: &Program) -> Vec<u8> {
        program.instructions().to_vec()
    }

    #[test]
    fn test_output_stop_all() {
        let mut program = Program::direct_no_reply();
        program.output_stop(OutputPorts::all(), false);
        assert_eq!(body(&program), vec![0xA3, 0x00, 0x0F, 0x00]);
    }

    #[test]
    fn test_output_power_and_start() {
        let mut program = Program::direct_no_reply();
        program
            .output_power(OutputPort::A | OutputPort::D, 50)
            .output_start(OutputPort::A | OutputPort::D);
        assert_eq!(
            body(&program),
            vec![0xA4, 0x00, 0x09, 0x81, 0x32, 0xA6, 0x00, 0x09]
        );
    }

    #[test]
    fn test_output_time_speed_ramps() {
        let mut program = Program::direct_no_reply();
        program.output_time_speed(
            OutputPort::B.into(),
            -20,
            Ramp {
                up: 0,
                constant: 1000,
                down: 0,
            },
            true,
        );
        assert_eq!(
            body(&program),
            vec![0xAF, 0x00, 0x02, 0x2C, 0x00, 0x82, 0xE8, 0x03, 0x00, 0x01]
        );
    }

    #[test]
    fn test_step_sync_turn_ratio() {
        let mut program = Program::direct_no_reply();
        program.output_step_sync(OutputPort::B | OutputPort::C, 30, -200, 360, false);
        assert_eq!(
            body(&program),
            vec![
                0xB0, 0x00, 0x06, 0x1E, 0x82, 0x38, 0xFF, 0x82, 0x68, 0x01, 0x00
            ]
        );
    }

    #[test]
    fn test_ready_si_records_read() {
        let mut program = Program::direct_reply(4);
        program.input_ready_si(InputPort::Two, 0, 0);
        assert_eq!(
            body(&program),
            vec![0x99, 0x1D, 0x00, 0x01, 0x00, 0x00, 0x01, 0x60]
        );
        assert_eq!(program.read_targets()[0].width, 4);
    }

    #[test]
    fn test_type_mode_two_targets() {
        let mut program = Program::direct_reply(2);
        program.input_type_mode(InputPort::A, 0, 1);
        assert_eq!(body(&program), vec![0x99, 0x05, 0x00, 0x10, 0x60, 0x61]);
    }

    #[test]
    fn test_sound_and_text_strings() {
        let mut program = Program::direct_no_reply();
        program.sound_play(100, "../prjs/hello");
        let bytes = body(&program);
        assert_eq!(&bytes[..4], &[0x94, 0x02, 0x81, 0x64]);
        assert_eq!(bytes[4], 0x84);
        assert_eq!(*bytes.last().unwrap(), 0x00);

        let mut program = Program::direct_no_reply();
        program.draw_text(Color::Foreground, 0, 20, "Hi");
        assert_eq!(
            body(&program),
            vec![0x84, 0x05, 0x01, 0x00, 0x14, 0x84, b'H', b'i', 0x00]
        );
    }

    #[test]
    fn test_filled_shapes_use_fill_subcodes() {
        let mut program = Program::direct_no_reply();
        program.draw_rect(Color::Foreground, 0, 0, 10, 10, true);
        assert_eq!(&body(&program)[..2], &[0x84, 0x09]);

        let mut program = Program::direct_no_reply();
        program.draw_circle(Color::Foreground, 50, 50, 5, true);
        assert_eq!(&body(&program)[..2], &[0x84, 0x18]);
    }

    #[test]
    fn test_begin_download_layout() {
        let mut program = Program::system_reply();
        program.begin_download(961, "../prjs/a");
        assert_eq!(program.kind(), CommandType::SystemReply);
        assert_eq!(
            body(&program),
            [&[0x92, 0xC1, 0x03, 0x00, 0x00][..], &b"../prjs/a\0"[..]].concat()
        );
    }

    #[test]
    fn test_continue_download_layout() {
        let mut program = Program::system_reply();
        program.continue_download(7, &[1, 2, 3]);
        assert_eq!(body(&program), vec![0x93, 0x07, 1, 2, 3]);
    }
}

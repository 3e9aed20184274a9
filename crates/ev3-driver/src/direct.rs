//! 直接指令目录
//!
//! 每个方法构造一个单指令 `Program` 并通过 [`Brick::send`] 发出。动作类指令
//! 不请求回复；读取类指令请求回复并从全局缓冲区偏移 0 解码结果。
//!
//! 需要把多条指令放进同一帧时，直接构造 `Program` 并调用 `Brick::send`。

use crate::brick::Brick;
use crate::error::DriverError;
use ev3_protocol::{
    BrickButton, Color, DeviceType, FontType, InputPort, LedPattern, OutputPorts, Polarity,
    Program, Ramp, Reply,
};

/// LCD 宽度（像素）
pub const LCD_WIDTH: u16 = 178;

/// LCD 高度（像素）
pub const LCD_HEIGHT: u16 = 128;

/// 顶部状态栏高度（像素）
pub const TOP_LINE_HEIGHT: u16 = 10;

/// 名称类读取的缓冲区长度
const NAME_LEN: u8 = 0x7F;

/// 固件版本字符串缓冲区长度
const FIRMWARE_LEN: u8 = 0x10;

impl Brick {
    fn fire(&self, build: impl FnOnce(&mut Program)) -> Result<(), DriverError> {
        let mut program = Program::direct_no_reply();
        build(&mut program);
        self.send(program).map(|_| ())
    }

    fn read(&self, global_size: u16, build: impl FnOnce(&mut Program)) -> Result<Reply, DriverError> {
        let mut program = Program::direct_reply(global_size);
        build(&mut program);
        self.query(program)
    }

    // ============================================================
    // 电机
    // ============================================================

    /// 以指定功率（-100..=100）持续转动
    pub fn turn_motor_at_power(&self, ports: OutputPorts, power: i8) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_power(ports, power).output_start(ports);
        })
    }

    /// 以指定速度（-100..=100）持续转动
    pub fn turn_motor_at_speed(&self, ports: OutputPorts, speed: i8) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_speed(ports, speed).output_start(ports);
        })
    }

    /// 以指定功率转动 `steps`（角度），可带加减速段
    pub fn step_motor_at_power(
        &self,
        ports: OutputPorts,
        power: i8,
        steps: Ramp,
        brake: bool,
    ) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_step_power(ports, power, steps, brake);
        })
    }

    pub fn step_motor_at_speed(
        &self,
        ports: OutputPorts,
        speed: i8,
        steps: Ramp,
        brake: bool,
    ) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_step_speed(ports, speed, steps, brake);
        })
    }

    /// 以指定功率转动一段时间（毫秒）
    pub fn turn_motor_at_power_for_time(
        &self,
        ports: OutputPorts,
        power: i8,
        millis: Ramp,
        brake: bool,
    ) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_time_power(ports, power, millis, brake);
        })
    }

    pub fn turn_motor_at_speed_for_time(
        &self,
        ports: OutputPorts,
        speed: i8,
        millis: Ramp,
        brake: bool,
    ) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_time_speed(ports, speed, millis, brake);
        })
    }

    /// 同步驱动两个电机，`turn_ratio` 范围 -200..=200
    pub fn step_motor_sync(
        &self,
        ports: OutputPorts,
        speed: i8,
        turn_ratio: i16,
        steps: u32,
        brake: bool,
    ) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_step_sync(ports, speed, turn_ratio, steps, brake);
        })
    }

    pub fn time_motor_sync(
        &self,
        ports: OutputPorts,
        speed: i8,
        turn_ratio: i16,
        millis: u32,
        brake: bool,
    ) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_time_sync(ports, speed, turn_ratio, millis, brake);
        })
    }

    pub fn set_motor_polarity(&self, ports: OutputPorts, polarity: Polarity) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_polarity(ports, polarity);
        })
    }

    pub fn start_motor(&self, ports: OutputPorts) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_start(ports);
        })
    }

    pub fn stop_motor(&self, ports: OutputPorts, brake: bool) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_stop(ports, brake);
        })
    }

    /// 让设备在执行后续指令前等待端口完成当前动作
    pub fn output_ready(&self, ports: OutputPorts) -> Result<(), DriverError> {
        self.fire(|p| {
            p.output_ready(ports);
        })
    }

    // ============================================================
    // 输入
    // ============================================================

    pub fn clear_all_devices(&self) -> Result<(), DriverError> {
        self.fire(|p| {
            p.input_clear_all();
        })
    }

    pub fn clear_changes(&self, port: InputPort) -> Result<(), DriverError> {
        self.fire(|p| {
            p.input_clear_changes(port);
        })
    }

    /// 读取端口上设备的类型和当前模式
    pub fn read_type_mode(&self, port: InputPort) -> Result<(DeviceType, u8), DriverError> {
        let reply = self.read(2, |p| {
            p.input_type_mode(port, 0, 1);
        })?;
        Ok((DeviceType::from(reply.read_u8(0)?), reply.read_u8(1)?))
    }

    pub fn read_si(&self, port: InputPort, mode: u8) -> Result<f32, DriverError> {
        let reply = self.read(4, |p| {
            p.input_ready_si(port, mode, 0);
        })?;
        Ok(reply.read_f32(0)?)
    }

    pub fn read_raw(&self, port: InputPort, mode: u8) -> Result<i32, DriverError> {
        let reply = self.read(4, |p| {
            p.input_ready_raw(port, mode, 0);
        })?;
        Ok(reply.read_i32(0)?)
    }

    pub fn read_percent(&self, port: InputPort, mode: u8) -> Result<u8, DriverError> {
        let reply = self.read(1, |p| {
            p.input_ready_percent(port, mode, 0);
        })?;
        Ok(reply.read_u8(0)?)
    }

    pub fn device_name(&self, port: InputPort) -> Result<String, DriverError> {
        let reply = self.read(NAME_LEN as u16, |p| {
            p.input_device_name(port, NAME_LEN, 0);
        })?;
        Ok(reply.read_cstring(0, NAME_LEN as usize)?)
    }

    pub fn mode_name(&self, port: InputPort, mode: u8) -> Result<String, DriverError> {
        let reply = self.read(NAME_LEN as u16, |p| {
            p.input_mode_name(port, mode, NAME_LEN, 0);
        })?;
        Ok(reply.read_cstring(0, NAME_LEN as usize)?)
    }

    // ============================================================
    // 声音
    // ============================================================

    /// 播放音调，音量 0..=100
    pub fn play_tone(&self, volume: u8, frequency: u16, duration_ms: u16) -> Result<(), DriverError> {
        self.fire(|p| {
            p.sound_tone(volume, frequency, duration_ms);
        })
    }

    /// 播放设备上的声音文件（不带扩展名）
    pub fn play_sound(&self, volume: u8, file: &str) -> Result<(), DriverError> {
        self.fire(|p| {
            p.sound_play(volume, file);
        })
    }

    // ============================================================
    // 面板
    // ============================================================

    pub fn firmware_version(&self) -> Result<String, DriverError> {
        let reply = self.read(FIRMWARE_LEN as u16, |p| {
            p.ui_firmware_version(FIRMWARE_LEN, 0);
        })?;
        Ok(reply.read_cstring(0, FIRMWARE_LEN as usize)?)
    }

    pub fn is_button_pressed(&self, button: BrickButton) -> Result<bool, DriverError> {
        let reply = self.read(1, |p| {
            p.ui_button_pressed(button, 0);
        })?;
        Ok(reply.read_u8(0)? == 1)
    }

    pub fn set_led_pattern(&self, pattern: LedPattern) -> Result<(), DriverError> {
        self.fire(|p| {
            p.ui_led(pattern);
        })
    }

    // ============================================================
    // LCD（绘制结果在 update_ui 之后才显示）
    // ============================================================

    pub fn clean_ui(&self) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_clean();
        })
    }

    pub fn update_ui(&self) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_update();
        })
    }

    pub fn draw_pixel(&self, color: Color, x: u16, y: u16) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_pixel(color, x, y);
        })
    }

    pub fn draw_line(&self, color: Color, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_line(color, x0, y0, x1, y1);
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_dotted_line(
        &self,
        color: Color,
        x0: u16,
        y0: u16,
        x1: u16,
        y1: u16,
        on_pixels: u16,
        off_pixels: u16,
    ) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_dotted_line(color, x0, y0, x1, y1, on_pixels, off_pixels);
        })
    }

    pub fn draw_rectangle(
        &self,
        color: Color,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        filled: bool,
    ) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_rect(color, x, y, width, height, filled);
        })
    }

    pub fn draw_inverse_rectangle(&self, x: u16, y: u16, width: u16, height: u16) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_inverse_rect(x, y, width, height);
        })
    }

    pub fn draw_circle(&self, color: Color, x: u16, y: u16, radius: u16, filled: bool) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_circle(color, x, y, radius, filled);
        })
    }

    pub fn draw_text(&self, color: Color, x: u16, y: u16, text: &str) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_text(color, x, y, text);
        })
    }

    pub fn draw_fill_window(&self, color: Color, y0: u16, y1: u16) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_fill_window(color, y0, y1);
        })
    }

    /// 绘制设备上的 .rgf 图片
    pub fn draw_image(&self, color: Color, x: u16, y: u16, device_path: &str) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_image(color, x, y, device_path);
        })
    }

    pub fn enable_top_line(&self, enabled: bool) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_top_line(enabled);
        })
    }

    pub fn select_font(&self, font: FontType) -> Result<(), DriverError> {
        self.fire(|p| {
            p.draw_select_font(font);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use ev3_protocol::OutputPort;
    use ev3_transport::{MockHandle, MockTransport};
    use std::time::Duration;

    /// 把第一个读取目标填成 `value`
    fn device_with_payload(value: Vec<u8>) -> MockTransport {
        MockTransport::new(move |frame: &[u8]| {
            if frame[2] != 0x00 {
                return None;
            }
            let global = (u16::from_le_bytes([frame[3], frame[4]]) & 0x03FF) as usize;
            let mut reply = vec![frame[0], frame[1], 0x02];
            let mut payload = value.clone();
            payload.resize(global, 0);
            reply.extend_from_slice(&payload);
            Some(reply)
        })
    }

    fn connected(transport: MockTransport) -> (Brick, MockHandle) {
        let handle = transport.handle();
        let config = PipelineConfig {
            receive_timeout_ms: 5,
            response_timeout_ms: 200,
            poll_period_ms: 0,
            always_send_events: false,
        };
        let brick = Brick::with_config(Box::new(transport), config, None);
        brick.connect(Duration::ZERO).unwrap();
        handle.clear_frames();
        (brick, handle)
    }

    #[test]
    fn test_turn_motor_at_power_batches_start() {
        let (brick, handle) = connected(MockTransport::silent());
        let ports = OutputPort::B | OutputPort::C;
        brick.turn_motor_at_power(ports, 50).unwrap();

        let frames = handle.written_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            &frames[0][5..],
            &[0xA4, 0x00, 0x06, 0x81, 50, 0xA6, 0x00, 0x06]
        );
    }

    #[test]
    fn test_read_si() {
        let (brick, _handle) = connected(device_with_payload(12.5f32.to_le_bytes().to_vec()));
        assert_eq!(brick.read_si(InputPort::One, 0).unwrap(), 12.5);
    }

    #[test]
    fn test_read_type_mode() {
        let (brick, _handle) = connected(device_with_payload(vec![29, 2]));
        assert_eq!(
            brick.read_type_mode(InputPort::Three).unwrap(),
            (DeviceType::Color, 2)
        );
    }

    #[test]
    fn test_firmware_version_and_names() {
        let (brick, handle) = connected(device_with_payload(b"V1.09H\0".to_vec()));
        assert_eq!(brick.firmware_version().unwrap(), "V1.09H");
        assert_eq!(brick.device_name(InputPort::One).unwrap(), "V1.09H");

        let frames = handle.written_frames();
        // 固件版本请求 16 字节全局缓冲区，名称请求 127 字节
        assert_eq!(u16::from_le_bytes([frames[0][3], frames[0][4]]) & 0x03FF, 0x10);
        assert_eq!(u16::from_le_bytes([frames[1][3], frames[1][4]]) & 0x03FF, 0x7F);
    }

    #[test]
    fn test_button_pressed() {
        let (brick, _handle) = connected(device_with_payload(vec![1]));
        assert!(brick.is_button_pressed(BrickButton::Enter).unwrap());
    }

    #[test]
    fn test_draw_commands_do_not_wait() {
        let (brick, handle) = connected(MockTransport::silent());
        brick.clean_ui().unwrap();
        brick.draw_text(Color::Foreground, 0, TOP_LINE_HEIGHT, "hi").unwrap();
        brick
            .draw_rectangle(Color::Foreground, 0, 0, LCD_WIDTH, LCD_HEIGHT, false)
            .unwrap();
        brick.update_ui().unwrap();
        assert_eq!(handle.frame_count(), 4);
        assert_eq!(brick.outstanding(), 0);
    }
}

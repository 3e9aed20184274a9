//! 协议枚举与位域类型
//!
//! 所有从设备读回的编码（设备类型、回复类型、系统状态码等）都使用
//! `num_enum::FromPrimitive` + `catch_all`，未识别的值落入 `Unknown(u8)`，
//! 解码永远不会失败。

use bilge::prelude::*;
use std::ops::BitOr;

// ============================================================================
// 指令类型 / 回复类型
// ============================================================================

/// 程序类型（帧第 3 字节）
///
/// 决定设备是否回复，以及回复信封的形状（Direct / System）。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::IntoPrimitive, num_enum::TryFromPrimitive,
)]
#[repr(u8)]
pub enum CommandType {
    /// 直接指令，需要回复
    DirectReply = 0x00,
    /// 系统指令，需要回复
    SystemReply = 0x01,
    /// 直接指令，无回复
    DirectNoReply = 0x80,
    /// 系统指令，无回复
    SystemNoReply = 0x81,
}

impl CommandType {
    /// 是否需要等待回复
    pub fn expects_reply(self) -> bool {
        matches!(self, Self::DirectReply | Self::SystemReply)
    }

    /// 是否为直接指令（带缓冲区大小声明）
    pub fn is_direct(self) -> bool {
        matches!(self, Self::DirectReply | Self::DirectNoReply)
    }

    /// 是否为系统指令
    pub fn is_system(self) -> bool {
        !self.is_direct()
    }
}

/// 回复类型（报告第 3 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ReplyType {
    DirectReply = 0x02,
    SystemReply = 0x03,
    DirectReplyError = 0x04,
    SystemReplyError = 0x05,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl ReplyType {
    /// 系统回复信封（带 opcode + status 两个字节）
    pub fn is_system(self) -> bool {
        matches!(self, Self::SystemReply | Self::SystemReplyError)
    }

    /// 设备是否报告了错误（未知类型也视为错误）
    pub fn is_error(self) -> bool {
        !matches!(self, Self::DirectReply | Self::SystemReply)
    }
}

/// 系统指令操作码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SystemOpcode {
    BeginDownload = 0x92,
    ContinueDownload = 0x93,
    BeginUpload = 0x94,
    ContinueUpload = 0x95,
    BeginGetFile = 0x96,
    ContinueGetFile = 0x97,
    CloseFileHandle = 0x98,
    ListFiles = 0x99,
    ContinueListFiles = 0x9A,
    CreateDirectory = 0x9B,
    DeleteFile = 0x9C,
    ListOpenHandles = 0x9D,
    WriteMailbox = 0x9E,
    BluetoothPin = 0x9F,
    EnterFirmwareUpdate = 0xA0,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// 系统回复状态码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SystemReplyStatus {
    Success = 0x00,
    UnknownHandle = 0x01,
    HandleNotReady = 0x02,
    CorruptFile = 0x03,
    NoHandlesAvailable = 0x04,
    NoPermission = 0x05,
    IllegalPath = 0x06,
    FileExists = 0x07,
    /// 设备收到最后一个字节时的正常信号
    EndOfFile = 0x08,
    SizeError = 0x09,
    UnknownError = 0x0A,
    IllegalFilename = 0x0B,
    IllegalConnection = 0x0C,
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl std::fmt::Display for SystemReplyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(code) => write!(f, "Unknown(0x{:02X})", code),
            other => write!(f, "{:?}", other),
        }
    }
}

// ============================================================================
// 端口与设备
// ============================================================================

/// 设备类型（GetTypeMode 返回的第一个字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::FromPrimitive, num_enum::IntoPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DeviceType {
    NxtTouch = 1,
    NxtLight = 2,
    NxtSound = 3,
    NxtColor = 4,
    NxtUltrasonic = 5,
    NxtTemperature = 6,
    LargeMotor = 7,
    MediumMotor = 8,
    Touch = 16,
    Color = 29,
    Ultrasonic = 30,
    Gyroscope = 32,
    Infrared = 33,
    Initializing = 0x7D,
    Empty = 0x7E,
    WrongPort = 0x7F,
    #[num_enum(catch_all)]
    Unknown(u8),
}

/// 输入端口（传感器端口 1-4，电机端口 A-D 也可作为输入读取）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    num_enum::IntoPrimitive,
    num_enum::TryFromPrimitive,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum InputPort {
    One = 0x00,
    Two = 0x01,
    Three = 0x02,
    Four = 0x03,
    A = 0x10,
    B = 0x11,
    C = 0x12,
    D = 0x13,
}

impl InputPort {
    /// 所有输入端口，按轮询缓冲区顺序排列
    pub const ALL: [InputPort; 8] = [
        InputPort::One,
        InputPort::Two,
        InputPort::Three,
        InputPort::Four,
        InputPort::A,
        InputPort::B,
        InputPort::C,
        InputPort::D,
    ];

    /// 端口在组合轮询缓冲区中的固定位置
    pub fn buffer_index(self) -> usize {
        match self {
            InputPort::One => 0,
            InputPort::Two => 1,
            InputPort::Three => 2,
            InputPort::Four => 3,
            InputPort::A => 4,
            InputPort::B => 5,
            InputPort::C => 6,
            InputPort::D => 7,
        }
    }

    /// 设备上的端口号
    pub fn code(self) -> u8 {
        self.into()
    }
}

impl std::fmt::Display for InputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InputPort::One => "1",
            InputPort::Two => "2",
            InputPort::Three => "3",
            InputPort::Four => "4",
            InputPort::A => "A",
            InputPort::B => "B",
            InputPort::C => "C",
            InputPort::D => "D",
        };
        f.write_str(name)
    }
}

/// 单个输出端口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputPort {
    A,
    B,
    C,
    D,
}

/// 输出端口掩码（位域）
///
/// 协议定义：
/// - Bit 0: 端口 A
/// - Bit 1: 端口 B
/// - Bit 2: 端口 C
/// - Bit 3: 端口 D
/// - Bit 4-7: 保留
#[bitsize(8)]
#[derive(FromBits, DebugBits, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputPorts {
    pub a: bool,
    pub b: bool,
    pub c: bool,
    pub d: bool,
    pub reserved: u4,
}

impl OutputPorts {
    /// 四个端口全部选中（0x0F）
    pub fn all() -> Self {
        Self::from(0x0F_u8)
    }

    /// 空掩码
    pub fn none() -> Self {
        Self::from(0x00_u8)
    }

    /// 掩码的字节值（保留位清零）
    pub fn bits(self) -> u8 {
        u8::from(self) & 0x0F
    }

    /// 是否包含指定端口
    pub fn contains(self, port: OutputPort) -> bool {
        self.bits() & OutputPorts::from(port).bits() != 0
    }
}

impl From<OutputPort> for OutputPorts {
    fn from(port: OutputPort) -> Self {
        let bit: u8 = match port {
            OutputPort::A => 0x01,
            OutputPort::B => 0x02,
            OutputPort::C => 0x04,
            OutputPort::D => 0x08,
        };
        OutputPorts::from(bit)
    }
}

impl BitOr for OutputPorts {
    type Output = OutputPorts;

    fn bitor(self, rhs: Self) -> Self::Output {
        OutputPorts::from(self.bits() | rhs.bits())
    }
}

impl BitOr for OutputPort {
    type Output = OutputPorts;

    fn bitor(self, rhs: Self) -> Self::Output {
        OutputPorts::from(self) | OutputPorts::from(rhs)
    }
}

impl BitOr<OutputPort> for OutputPorts {
    type Output = OutputPorts;

    fn bitor(self, rhs: OutputPort) -> Self::Output {
        self | OutputPorts::from(rhs)
    }
}

// ============================================================================
// UI / 声音
// ============================================================================

/// 面板按键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum BrickButton {
    None = 0,
    Up = 1,
    Enter = 2,
    Down = 3,
    Right = 4,
    Left = 5,
    Back = 6,
    Any = 7,
}

/// 电机极性
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(i8)]
pub enum Polarity {
    Backward = -1,
    Opposite = 0,
    Forward = 1,
}

/// 面板 LED 灯效
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum LedPattern {
    Black = 0,
    Green = 1,
    Red = 2,
    Orange = 3,
    GreenFlash = 4,
    RedFlash = 5,
    OrangeFlash = 6,
    GreenPulse = 7,
    RedPulse = 8,
    OrangePulse = 9,
}

/// LCD 绘制颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum Color {
    Background = 0,
    Foreground = 1,
}

/// LCD 字体
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::IntoPrimitive)]
#[repr(u8)]
pub enum FontType {
    Small = 0,
    Medium = 1,
    Large = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_type_unknown_code() {
        assert_eq!(DeviceType::from(7), DeviceType::LargeMotor);
        assert_eq!(DeviceType::from(0x7E), DeviceType::Empty);
        assert_eq!(DeviceType::from(200), DeviceType::Unknown(200));
        assert_eq!(u8::from(DeviceType::Unknown(200)), 200);
        assert_eq!(DeviceType::from(0xFF), DeviceType::Unknown(0xFF));
        assert_eq!(DeviceType::from(0x00), DeviceType::Unknown(0x00));
    }

    #[test]
    fn test_reply_type_decode() {
        assert_eq!(ReplyType::from(0x02), ReplyType::DirectReply);
        assert_eq!(ReplyType::from(0x05), ReplyType::SystemReplyError);
        assert!(ReplyType::from(0x05).is_system());
        assert!(ReplyType::from(0x05).is_error());
        assert!(ReplyType::from(0x42).is_error());
        assert!(!ReplyType::DirectReply.is_error());
    }

    #[test]
    fn test_system_status_display() {
        assert_eq!(SystemReplyStatus::from(0x08), SystemReplyStatus::EndOfFile);
        assert_eq!(SystemReplyStatus::from(0x06).to_string(), "IllegalPath");
        assert_eq!(SystemReplyStatus::from(0x33).to_string(), "Unknown(0x33)");
    }

    #[test]
    fn test_command_type_flags() {
        assert!(CommandType::DirectReply.expects_reply());
        assert!(CommandType::SystemReply.expects_reply());
        assert!(!CommandType::DirectNoReply.expects_reply());
        assert!(!CommandType::SystemNoReply.expects_reply());
        assert!(CommandType::DirectNoReply.is_direct());
        assert!(CommandType::SystemNoReply.is_system());
        assert_eq!(CommandType::try_from(0x81).ok(), Some(CommandType::SystemNoReply));
        assert!(CommandType::try_from(0x02).is_err());
    }

    #[test]
    fn test_input_port_buffer_index() {
        for (i, port) in InputPort::ALL.iter().enumerate() {
            assert_eq!(port.buffer_index(), i);
        }
        assert_eq!(InputPort::A.code(), 0x10);
        assert_eq!(InputPort::Four.to_string(), "4");
    }

    #[test]
    fn test_output_ports_mask() {
        // 验证 bilge 位序（LSB first）
        let ab = OutputPort::A | OutputPort::B;
        assert_eq!(ab.bits(), 0x03);
        assert!(ab.a());
        assert!(ab.b());
        assert!(!ab.c());

        let abd = ab | OutputPort::D;
        assert_eq!(abd.bits(), 0x0B);
        assert!(abd.contains(OutputPort::D));
        assert!(!abd.contains(OutputPort::C));

        assert_eq!(OutputPorts::all().bits(), 0x0F);
        assert_eq!(OutputPorts::none().bits(), 0x00);
        // 保留位不会出现在掩码中
        assert_eq!(OutputPorts::from(0xF1_u8).bits(), 0x01);
    }

    #[test]
    fn test_polarity_value() {
        assert_eq!(i8::from(Polarity::Backward), -1);
        assert_eq!(i8::from(Polarity::Forward), 1);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_port_names() {
        assert_eq!(serde_json::to_string(&InputPort::Three).unwrap(), "\"Three\"");
        let device: DeviceType = serde_json::from_str("\"Gyroscope\"").unwrap();
        assert_eq!(device, DeviceType::Gyroscope);
    }
}

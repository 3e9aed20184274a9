//! 端口与按键状态缓存
//!
//! 缓存只由轮询线程写入（`ArcSwap` 整体替换），调用方无锁读取。

use ev3_protocol::{DeviceType, InputPort};
use std::sync::Arc;

/// SI 值变化阈值（绝对值），低于该值视为浮点噪声
pub const SI_TOLERANCE: f32 = 0.01;

/// 单个输入端口的最新状态
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Port {
    pub id: InputPort,
    /// `None` 表示尚未轮询到该端口
    pub device_type: Option<DeviceType>,
    /// 读取 SI/原始/百分比值时使用的模式
    pub mode: u8,
    /// 物理单位值
    pub si_value: f32,
    pub raw_value: i32,
    /// 0..=100
    pub percent_value: u8,
}

impl Port {
    pub fn new(id: InputPort) -> Self {
        Self {
            id,
            device_type: None,
            mode: 0,
            si_value: 0.0,
            raw_value: 0,
            percent_value: 0,
        }
    }

    /// 端口在组合轮询缓冲区中的位置
    pub fn buffer_index(&self) -> usize {
        self.id.buffer_index()
    }

    /// 与另一份读数相比是否发生了变化
    ///
    /// 类型、原始值、百分比精确比较；SI 值允许 [`SI_TOLERANCE`] 的误差。
    pub fn differs_from(&self, other: &Port) -> bool {
        self.device_type != other.device_type
            || self.raw_value != other.raw_value
            || self.percent_value != other.percent_value
            || si_changed(self.si_value, other.si_value)
    }
}

fn si_changed(a: f32, b: f32) -> bool {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => false,
        (false, false) => (a - b).abs() > SI_TOLERANCE,
        _ => true,
    }
}

/// 面板按键状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ButtonState {
    pub back: bool,
    pub left: bool,
    pub up: bool,
    pub right: bool,
    pub down: bool,
    pub enter: bool,
}

impl ButtonState {
    pub fn any(&self) -> bool {
        self.back || self.left || self.up || self.right || self.down || self.enter
    }
}

/// 一次轮询得到的完整状态
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BrickSnapshot {
    /// 按 `InputPort::buffer_index` 排列
    pub ports: [Port; 8],
    pub buttons: ButtonState,
    /// 产生该快照的轮询周期序号（0 表示尚未轮询）
    pub cycle: u64,
}

impl Default for BrickSnapshot {
    fn default() -> Self {
        Self {
            ports: InputPort::ALL.map(Port::new),
            buttons: ButtonState::default(),
            cycle: 0,
        }
    }
}

impl BrickSnapshot {
    pub fn port(&self, id: InputPort) -> &Port {
        &self.ports[id.buffer_index()]
    }

    /// 端口或按键是否有任何变化
    pub fn differs_from(&self, other: &BrickSnapshot) -> bool {
        self.buttons != other.buttons
            || self
                .ports
                .iter()
                .zip(other.ports.iter())
                .any(|(a, b)| a.differs_from(b))
    }
}

/// 状态变化事件，携带完整的当前快照
#[derive(Debug, Clone)]
pub struct BrickChanged {
    pub snapshot: Arc<BrickSnapshot>,
}

impl BrickChanged {
    pub fn port(&self, id: InputPort) -> &Port {
        self.snapshot.port(id)
    }

    pub fn buttons(&self) -> ButtonState {
        self.snapshot.buttons
    }
}

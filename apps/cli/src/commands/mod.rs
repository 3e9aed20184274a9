//! 命令定义和实现

pub mod config;
pub mod connection;
pub mod files;
pub mod info;
pub mod monitor;
pub mod motor;
pub mod stop;
pub mod tone;

pub use config::{CliConfig, ConfigCommand};
pub use files::{PathCommand, UploadCommand};
pub use info::InfoCommand;
pub use monitor::MonitorCommand;
pub use motor::MotorCommand;
pub use stop::StopCommand;
pub use tone::ToneCommand;

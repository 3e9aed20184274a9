//! 主控信息查询
//!
//! 打印固件版本以及每个输入端口的设备类型与模式。

use super::config::CliConfig;
use super::connection::ConnectArgs;
use anyhow::Result;
use clap::Args;
use ev3_sdk::prelude::*;

#[derive(Args, Debug)]
pub struct InfoCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 同时读取端口的设备名
    #[arg(long)]
    pub names: bool,
}

impl InfoCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let brick = self.connect.connect(config, false)?;
        print_info(&brick, self.names)?;
        brick.disconnect()?;
        Ok(())
    }
}

/// 逐个端口查询，`names` 为真时额外读取设备名
pub fn print_info(brick: &Brick, names: bool) -> Result<()> {
    println!("固件版本: {}", brick.firmware_version()?);
    println!("{:<6}{:<16}{:<6}{}", "端口", "类型", "模式", if names { "名称" } else { "" });
    for port in InputPort::ALL {
        let (device_type, mode) = brick.read_type_mode(port)?;
        let name = if names && device_type != DeviceType::Empty {
            brick.device_name(port)?
        } else {
            String::new()
        };
        println!("{:<6}{:<16}{:<6}{}", port.to_string(), format!("{device_type:?}"), mode, name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_requires_address() {
        let cmd = InfoCommand {
            connect: ConnectArgs::default(),
            names: false,
        };
        assert!(cmd.execute(&CliConfig::default()).is_err());
    }
}

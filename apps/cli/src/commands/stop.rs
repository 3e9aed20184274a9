//! 停止命令
//!
//! 停止所有电机，用于紧急情况下的快速停止

use super::config::CliConfig;
use super::connection::{ConnectArgs, parse_output_ports};
use anyhow::Result;
use clap::Args;

/// 停止命令参数
#[derive(Args, Debug)]
pub struct StopCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 输出端口（默认全部）
    #[arg(short, long, default_value = "all")]
    pub ports: String,

    /// 滑行停止（默认刹车）
    #[arg(long)]
    pub coast: bool,
}

impl StopCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        let ports = parse_output_ports(&self.ports)?;
        let brick = self.connect.connect(config, false)?;

        println!("🛑 停止电机 {}...", self.ports);
        brick.stop_motor(ports, !self.coast)?;
        brick.disconnect()?;

        println!("✅ 已停止");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_command_defaults() {
        let cmd = StopCommand {
            connect: ConnectArgs::default(),
            ports: "all".to_string(),
            coast: false,
        };
        assert!(cmd.connect.address.is_none());
        assert_eq!(parse_output_ports(&cmd.ports).unwrap().bits(), 0x0F);
    }

    #[test]
    fn test_stop_without_address_fails_before_connecting() {
        let cmd = StopCommand {
            connect: ConnectArgs::default(),
            ports: "A".to_string(),
            coast: true,
        };
        assert!(cmd.execute(&CliConfig::default()).is_err());
    }
}

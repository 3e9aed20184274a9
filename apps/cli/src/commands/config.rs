//! 配置管理命令
//!
//! 保存默认主控地址、序列号和会话参数，位置为 `<config dir>/ev3/config.toml`。

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 配置文件路径
pub fn config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("ev3");
    path.push("config.toml");
    Ok(path)
}

/// CLI 配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// 主控地址（`host` 或 `host:port`）
    pub address: Option<String>,

    /// 主控序列号（解锁握手用）
    pub serial: Option<String>,

    /// 后台轮询周期（毫秒，0 表示不轮询）
    pub poll_period_ms: Option<u64>,

    /// 单条指令等待回复的超时（毫秒）
    pub response_timeout_ms: Option<u64>,
}

impl CliConfig {
    /// 从默认位置加载，文件不存在时返回默认配置
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("读取配置文件失败")?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("创建配置目录失败")?;
        }
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, format!("# EV3 CLI Configuration\n\n{content}")).context("写入配置文件失败")?;
        Ok(())
    }

    /// 按名称取出配置项的显示值
    fn value_of(&self, key: &str) -> Option<String> {
        match key {
            "address" => self.address.clone(),
            "serial" => self.serial.clone(),
            "poll_period_ms" => self.poll_period_ms.map(|v| v.to_string()),
            "response_timeout_ms" => self.response_timeout_ms.map(|v| v.to_string()),
            _ => None,
        }
    }
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 主控地址（如 192.168.1.20）
        #[arg(short, long)]
        address: Option<String>,

        /// 主控序列号
        #[arg(short, long)]
        serial: Option<String>,

        /// 后台轮询周期（毫秒）
        #[arg(long)]
        poll_period_ms: Option<u64>,

        /// 回复超时（毫秒）
        #[arg(long)]
        response_timeout_ms: Option<u64>,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Set {
                address,
                serial,
                poll_period_ms,
                response_timeout_ms,
            } => {
                let mut config = CliConfig::load()?;
                apply_set(&mut config, address, serial, poll_period_ms, response_timeout_ms);
                config.save()?;
                println!("✅ 配置已保存");
                Ok(())
            },

            ConfigCommand::Get { key } => {
                let config = CliConfig::load()?;
                if key == "all" {
                    print_config(&config);
                } else {
                    match config.value_of(&key) {
                        Some(value) => println!("{value}"),
                        None => println!("(未设置)"),
                    }
                }
                Ok(())
            },

            ConfigCommand::Check => {
                let path = config_file()?;
                let config = CliConfig::load_from(&path)?;
                println!("配置文件: {}", path.display());
                print_config(&config);
                if config.address.is_none() {
                    println!("⚠️  未设置主控地址，请使用 `ev3-cli config set --address <HOST>`");
                }
                Ok(())
            },
        }
    }
}

fn apply_set(
    config: &mut CliConfig,
    address: Option<String>,
    serial: Option<String>,
    poll_period_ms: Option<u64>,
    response_timeout_ms: Option<u64>,
) {
    if address.is_some() {
        config.address = address;
    }
    if serial.is_some() {
        config.serial = serial;
    }
    if poll_period_ms.is_some() {
        config.poll_period_ms = poll_period_ms;
    }
    if response_timeout_ms.is_some() {
        config.response_timeout_ms = response_timeout_ms;
    }
}

fn print_config(config: &CliConfig) {
    println!("EV3 CLI 配置:");
    println!("  地址: {:?}", config.address);
    println!("  序列号: {:?}", config.serial);
    println!("  轮询周期: {:?} ms", config.poll_period_ms);
    println!("  回复超时: {:?} ms", config.response_timeout_ms);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load_from(&dir.path().join("none.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ev3").join("config.toml");
        let config = CliConfig {
            address: Some("192.168.1.20".into()),
            serial: Some("0016535D7E2D".into()),
            poll_period_ms: Some(50),
            response_timeout_ms: None,
        };
        config.save_to(&path).unwrap();
        assert_eq!(CliConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "address = \"10.0.0.5\"\n").unwrap();
        let config = CliConfig::load_from(&path).unwrap();
        assert_eq!(config.address.as_deref(), Some("10.0.0.5"));
        assert!(config.serial.is_none());
    }

    #[test]
    fn test_set_only_overwrites_given_fields() {
        let mut config = CliConfig {
            address: Some("a".into()),
            serial: Some("s".into()),
            ..CliConfig::default()
        };
        apply_set(&mut config, None, Some("t".into()), Some(0), None);
        assert_eq!(config.address.as_deref(), Some("a"));
        assert_eq!(config.value_of("serial").as_deref(), Some("t"));
        assert_eq!(config.value_of("poll_period_ms").as_deref(), Some("0"));
        assert!(config.value_of("bogus").is_none());
    }
}

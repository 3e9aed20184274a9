//! 主控文件管理：上传、建目录、删除

use super::config::CliConfig;
use super::connection::ConnectArgs;
use anyhow::{Context, Result};
use clap::Args;
use ev3_sdk::driver::{CHUNK_SIZE, check_device_path};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct UploadCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 本地文件
    pub local: PathBuf,

    /// 设备路径（如 apps/demo/demo.rbf）
    pub device_path: String,
}

impl UploadCommand {
    pub fn execute(&self, config: &CliConfig) -> Result<()> {
        check_device_path(&self.device_path)?;
        let data = std::fs::read(&self.local)
            .with_context(|| format!("读取 {} 失败", self.local.display()))?;

        let brick = self.connect.connect(config, false)?;
        println!(
            "📤 {} -> {} ({} 字节, {} 块)",
            self.local.display(),
            self.device_path,
            data.len(),
            chunk_count(data.len())
        );
        brick.write_file(&data, &self.device_path)?;
        brick.disconnect()?;
        println!("✅ 上传完成");
        Ok(())
    }
}

/// 传输所需的 ContinueDownload 次数
fn chunk_count(len: usize) -> usize {
    len.div_ceil(CHUNK_SIZE)
}

#[derive(Args, Debug)]
pub struct PathCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 设备路径
    pub device_path: String,
}

impl PathCommand {
    pub fn mkdir(&self, config: &CliConfig) -> Result<()> {
        check_device_path(&self.device_path)?;
        let brick = self.connect.connect(config, false)?;
        brick.create_directory(&self.device_path)?;
        brick.disconnect()?;
        println!("✅ 已创建 {}", self.device_path);
        Ok(())
    }

    pub fn remove(&self, config: &CliConfig) -> Result<()> {
        check_device_path(&self.device_path)?;
        let brick = self.connect.connect(config, false)?;
        brick.delete_file(&self.device_path)?;
        brick.disconnect()?;
        println!("🗑️  已删除 {}", self.device_path);
        Ok(())
    }
}

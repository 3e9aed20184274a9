//! 系统指令：文件下载、目录与文件管理
//!
//! 设备路径相对于主控上的 `lms2012/sys`，必须以 `apps/`、`prjs/` 或
//! `tools/` 开头。写入文件时目标目录会被自动创建。

use crate::brick::Brick;
use crate::error::DriverError;
use ev3_protocol::{Program, Reply, SystemReplyStatus};
use std::path::Path;
use tracing::{debug, info, warn};

/// 单个 ContinueDownload 携带的最大字节数
pub const CHUNK_SIZE: usize = 960;

/// 允许写入的顶层目录
pub const DEVICE_ROOTS: [&str; 3] = ["apps/", "prjs/", "tools/"];

/// 检查设备路径是否位于允许的顶层目录下
pub fn check_device_path(device_path: &str) -> Result<(), DriverError> {
    let valid = DEVICE_ROOTS
        .iter()
        .any(|root| device_path.len() > root.len() && device_path.starts_with(root));
    if valid && !device_path.contains('\0') {
        Ok(())
    } else {
        Err(DriverError::InvalidPath(device_path.to_string()))
    }
}

fn reply_status(reply: &Reply) -> Result<SystemReplyStatus, DriverError> {
    reply
        .status
        .ok_or_else(|| DriverError::MalformedReply("system reply without status".into()))
}

impl Brick {
    fn system(&self, build: impl FnOnce(&mut Program)) -> Result<Reply, DriverError> {
        let mut program = Program::system_reply();
        build(&mut program);
        self.send(program)?
            .ok_or_else(|| DriverError::MalformedReply("system command produced no reply".into()))
    }

    /// 把 `data` 写入设备文件
    ///
    /// BeginDownload 返回句柄后按 [`CHUNK_SIZE`] 分块发送。最后一块允许返回
    /// `EndOfFile`；其他任何非 `Success` 状态都会中止传输。
    pub fn write_file(&self, data: &[u8], device_path: &str) -> Result<(), DriverError> {
        check_device_path(device_path)?;
        let total = u32::try_from(data.len())
            .map_err(|_| DriverError::InvalidPath(format!("{device_path}: file too large")))?;

        let begin = self.system(|p| {
            p.begin_download(total, device_path);
        })?;
        let status = reply_status(&begin)?;
        if status != SystemReplyStatus::Success {
            warn!("BeginDownload of {} rejected: {}", device_path, status);
            return Err(DriverError::DeviceStatus {
                operation: "BeginDownload",
                status,
            });
        }
        let handle = *begin
            .payload
            .first()
            .ok_or_else(|| DriverError::MalformedReply("BeginDownload reply without handle".into()))?;
        debug!("Downloading {} bytes to {} (handle {})", data.len(), device_path, handle);

        let chunks = data.chunks(CHUNK_SIZE);
        let last = chunks.len().saturating_sub(1);
        for (i, chunk) in chunks.enumerate() {
            let reply = self.system(|p| {
                p.continue_download(handle, chunk);
            })?;
            match reply_status(&reply)? {
                SystemReplyStatus::Success => {},
                SystemReplyStatus::EndOfFile if i == last => {},
                status => {
                    warn!("ContinueDownload chunk {} of {} failed: {}", i, device_path, status);
                    return Err(DriverError::DeviceStatus {
                        operation: "ContinueDownload",
                        status,
                    });
                },
            }
        }

        info!("Wrote {} bytes to {}", data.len(), device_path);
        Ok(())
    }

    /// 把本地文件复制到设备
    pub fn copy_file(&self, local_path: impl AsRef<Path>, device_path: &str) -> Result<(), DriverError> {
        check_device_path(device_path)?;
        let data = std::fs::read(local_path)?;
        self.write_file(&data, device_path)
    }

    pub fn create_directory(&self, device_path: &str) -> Result<(), DriverError> {
        check_device_path(device_path)?;
        let reply = self.system(|p| {
            p.create_directory(device_path);
        })?;
        expect_success("CreateDirectory", &reply)
    }

    pub fn delete_file(&self, device_path: &str) -> Result<(), DriverError> {
        check_device_path(device_path)?;
        let reply = self.system(|p| {
            p.delete_file(device_path);
        })?;
        expect_success("DeleteFile", &reply)
    }
}

fn expect_success(operation: &'static str, reply: &Reply) -> Result<(), DriverError> {
    match reply_status(reply)? {
        SystemReplyStatus::Success => Ok(()),
        status => Err(DriverError::DeviceStatus { operation, status }),
    }
}
